#![allow(dead_code)]

use kernel_ext::UserMemory;
use kernel_ext::emulated::EmulatedUserSpace;
use kernel_syscall::{Caller, SyscallArgs, Syscalls, Sysno};
use kernel_ext::{CodeAllocator, HookSite};
use std::sync::Mutex;

pub const USER_BASE: usize = 0x40_0000;
pub const CODE_ADDR: usize = USER_BASE;
pub const HANDLE_ADDR: usize = USER_BASE + 0x800;

/// A user process with a small flat address space.
pub struct Process {
    pub name: &'static str,
    pub privileged: bool,
    pub memory: EmulatedUserSpace,
    pub console: Mutex<Vec<u8>>,
}

impl Process {
    pub fn new(name: &'static str, privileged: bool) -> Self {
        Self {
            name,
            privileged,
            memory: EmulatedUserSpace::new(USER_BASE, 0x1000),
            console: Mutex::default(),
        }
    }

    /// Places `code` at [`CODE_ADDR`] and poisons the handle word.
    pub fn with_code(self, code: &[u8]) -> Self {
        self.memory.copy_to_user(CODE_ADDR, code).unwrap();
        self.memory
            .copy_to_user(HANDLE_ADDR, &usize::MAX.to_ne_bytes())
            .unwrap();
        self
    }

    pub fn handle_word(&self) -> usize {
        self.memory.read_word(HANDLE_ADDR).unwrap()
    }

    /// `ExtLoad(CODE_ADDR, len, HANDLE_ADDR)`.
    pub fn ext_load<A, H, const N: usize>(&self, sys: &Syscalls<'_, A, H, N>, len: i64) -> u64
    where
        A: CodeAllocator,
        H: HookSite,
    {
        let args = SyscallArgs::new([
            CODE_ADDR as u64,
            len.cast_unsigned(),
            HANDLE_ADDR as u64,
            0,
            0,
            0,
        ]);
        sys.dispatch(self, Sysno::ExtLoad as u64, args)
    }

    pub fn ext_attach<A, H, const N: usize>(&self, sys: &Syscalls<'_, A, H, N>, handle: usize) -> u64
    where
        A: CodeAllocator,
        H: HookSite,
    {
        let args = SyscallArgs::new([handle as u64, 0, 0, 0, 0, 0]);
        sys.dispatch(self, Sysno::ExtAttach as u64, args)
    }

    pub fn ping<A, H, const N: usize>(&self, sys: &Syscalls<'_, A, H, N>) -> u64
    where
        A: CodeAllocator,
        H: HookSite,
    {
        sys.dispatch(self, Sysno::Ping as u64, SyscallArgs::default())
    }
}

impl Caller for Process {
    type Memory = EmulatedUserSpace;

    fn memory(&self) -> &EmulatedUserSpace {
        &self.memory
    }

    fn may_load_extensions(&self) -> bool {
        self.privileged
    }

    fn debug_write(&self, byte: u8) {
        self.console.lock().unwrap().push(byte);
    }

    fn name(&self) -> &str {
        self.name
    }
}
