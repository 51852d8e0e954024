//! `ExtLoad` and `ExtAttach`.

use crate::{Caller, SyscallArgs, SyscallError, Syscalls};
use kernel_ext::{CodeAllocator, ExtHandle, HookSite, UserMemory};
use log::warn;

impl<A, H, const N: usize> Syscalls<'_, A, H, N>
where
    A: CodeAllocator,
    H: HookSite,
{
    /// `ExtLoad(code, len, out)`.
    ///
    /// `out` is checked before anything else happens and receives null
    /// straight away, so a failed load leaves null behind. If the handle
    /// cannot be stored afterwards, the load is undone.
    pub(crate) fn sys_extload<C>(&self, caller: &C, args: &SyscallArgs) -> Result<u64, SyscallError>
    where
        C: Caller + ?Sized,
    {
        let mem = caller.memory();
        let code = args.fn_ptr(0)?;
        let len = args.int(1)?;
        let out = args.user_ptr(2, size_of::<usize>(), mem)?;
        mem.copy_to_user(out, &ExtHandle::NULL.as_raw().to_ne_bytes())?;

        if !caller.may_load_extensions() {
            return Err(SyscallError::PermissionDenied);
        }
        let handle = self
            .extensions
            .load(&self.alloc, mem, code, len, caller.name())?;

        if let Err(e) = mem.copy_to_user(out, &handle.as_raw().to_ne_bytes()) {
            warn!("syscall: handle for {} not delivered, rolling back", caller.name());
            self.extensions.abandon(handle)?;
            return Err(e.into());
        }
        Ok(0)
    }

    /// `ExtAttach(handle)`.
    pub(crate) fn sys_extattach(&self, args: &SyscallArgs) -> Result<u64, SyscallError> {
        let raw = args.kernel_ptr(0, &self.extensions.handle_region())?;
        self.extensions.attach(ExtHandle::from_raw(raw))?;
        Ok(0)
    }
}
