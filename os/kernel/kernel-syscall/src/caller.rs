use kernel_ext::UserMemory;

/// The process on whose behalf a syscall runs.
pub trait Caller {
    type Memory: UserMemory + ?Sized;

    /// The caller's address space.
    fn memory(&self) -> &Self::Memory;

    /// Whether the caller is trusted to inject code into the kernel.
    fn may_load_extensions(&self) -> bool;

    /// Writes one byte to wherever this caller's debug output goes.
    fn debug_write(&self, byte: u8);

    /// Process name; loaded extensions are labelled with it.
    fn name(&self) -> &str;
}
