//! The kernel's one extension table and the trampoline behind its hook.

use crate::Syscalls;
use kernel_ext::{Extensions, IndirectHook, MAX_EXTENSIONS, PagePool, PoolPage};
use log::debug;

/// One code page per record.
pub const CODE_POOL_PAGES: usize = MAX_EXTENSIONS;

/// Code pages for loaded extensions. On the bare-metal target the pool is
/// linked into a section the linker script maps executable.
#[cfg_attr(target_os = "none", unsafe(link_section = ".text.ext_pages"))]
pub static CODE_PAGES: PagePool<CODE_POOL_PAGES> = PagePool::new();

pub static EXTENSIONS: Extensions<PoolPage, IndirectHook, MAX_EXTENSIONS> =
    Extensions::new(IndirectHook::new(trampoline));

/// Target of the hook in `Ping`.
fn trampoline() {
    let invoked = EXTENSIONS.dispatch(|_, _| {});
    debug!("ext: trampoline ran {invoked} extension(s)");
}

pub type KernelSyscalls =
    Syscalls<'static, &'static PagePool<CODE_POOL_PAGES>, IndirectHook, MAX_EXTENSIONS>;

/// Syscall table backed by the kernel statics.
#[must_use]
pub fn syscalls() -> KernelSyscalls {
    Syscalls::new(&EXTENSIONS, &CODE_PAGES)
}
