use crate::{Caller, PING_REPLY, SYSCALL_FAILED, SyscallArgs, SyscallError, Sysno};
use kernel_ext::{CodeAllocator, Extensions, HookSite};
use log::{trace, warn};

/// Kernel syscall table bound to one extension table.
///
/// `alloc` supplies code pages for `ExtLoad`; the table's hook is fired on
/// every `Ping`.
pub struct Syscalls<'k, A, H, const N: usize>
where
    A: CodeAllocator,
{
    pub(crate) extensions: &'k Extensions<A::Page, H, N>,
    pub(crate) alloc: A,
}

impl<'k, A, H, const N: usize> Syscalls<'k, A, H, N>
where
    A: CodeAllocator,
    H: HookSite,
{
    #[must_use]
    pub const fn new(extensions: &'k Extensions<A::Page, H, N>, alloc: A) -> Self {
        Self { extensions, alloc }
    }

    #[must_use]
    pub const fn extensions(&self) -> &'k Extensions<A::Page, H, N> {
        self.extensions
    }

    /// Runs syscall `sysno` for `caller` and returns the value for `rax`.
    pub fn dispatch<C>(&self, caller: &C, sysno: u64, args: SyscallArgs) -> u64
    where
        C: Caller + ?Sized,
    {
        let result = match Sysno::try_from(sysno) {
            Ok(Sysno::DebugWriteByte) => sys_debug_write(caller, &args),
            Ok(Sysno::Ping) => Ok(self.sys_ping()),
            Ok(Sysno::ExtLoad) => self.sys_extload(caller, &args),
            Ok(Sysno::ExtAttach) => self.sys_extattach(&args),
            Err(unknown) => Err(SyscallError::UnknownSyscall(unknown)),
        };

        result.unwrap_or_else(|e| {
            warn!("syscall {sysno} from {} failed: {e}", caller.name());
            SYSCALL_FAILED
        })
    }

    /// The hooked call.
    fn sys_ping(&self) -> u64 {
        self.extensions.hook().fire();
        trace!("ping");
        PING_REPLY
    }
}

fn sys_debug_write<C>(caller: &C, args: &SyscallArgs) -> Result<u64, SyscallError>
where
    C: Caller + ?Sized,
{
    let [byte, ..] = args.word(0)?.to_le_bytes();
    caller.debug_write(byte);
    Ok(0)
}
