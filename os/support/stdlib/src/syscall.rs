use crate::syscall_abi::{SYSCALL_FAILED, Sysno};

#[inline(always)]
#[allow(clippy::inline_always)]
pub fn debug_byte(b: u8) {
    unsafe {
        core::arch::asm!(
            "syscall",
            inlateout("rax") Sysno::DebugWriteByte as u64 => _,
            in("rdi") u64::from(b),
            lateout("rcx") _, // clobbered by SYSCALL
            lateout("r11") _, // clobbered by SYSCALL
            options(nostack)
        );
    }
}

/// Enters the hooked syscall. Every attached extension runs before it
/// returns [`PING_REPLY`](crate::syscall_abi::PING_REPLY).
#[inline(always)]
#[allow(clippy::inline_always)]
#[must_use]
pub fn ping() -> u64 {
    let mut ret: u64;
    unsafe {
        core::arch::asm!(
            "syscall",
            inlateout("rax") Sysno::Ping as u64 => ret,
            lateout("rcx") _, // syscall clobbers
            lateout("r11") _,
            options(nostack)
        );
    }
    ret
}

/// Hands `code` to the kernel as a new extension.
///
/// The code is entered at its first byte with no arguments and must return
/// a word in `rax`. Returns the opaque handle, or `None` if the kernel
/// refused the code.
#[inline]
#[must_use]
pub fn ext_load(code: &[u8]) -> Option<usize> {
    let mut handle: usize = 0;
    let mut ret: u64;
    unsafe {
        core::arch::asm!(
            "syscall",
            inlateout("rax") Sysno::ExtLoad as u64 => ret,
            in("rdi") code.as_ptr(),
            in("rsi") code.len(),
            in("rdx") &raw mut handle,
            lateout("rcx") _,
            lateout("r11") _,
            options(nostack)
        );
    }
    (ret != SYSCALL_FAILED && handle != 0).then_some(handle)
}

/// Asks the kernel to run the extension behind `handle` from the hook.
/// Returns `false` if the handle was rejected.
#[inline]
#[must_use]
pub fn ext_attach(handle: usize) -> bool {
    let mut ret: u64;
    unsafe {
        core::arch::asm!(
            "syscall",
            inlateout("rax") Sysno::ExtAttach as u64 => ret,
            in("rdi") handle,
            lateout("rcx") _,
            lateout("r11") _,
            options(nostack)
        );
    }
    ret != SYSCALL_FAILED
}
