use crate::{EntryPoint, ExtError, PAGE_SIZE};

/// One page of memory that holds the code of a single extension.
///
/// The page is owned by the extension record once loaded and is never
/// written after the load completes.
pub trait CodePage: Send {
    fn as_bytes(&self) -> &[u8; PAGE_SIZE];

    fn as_mut_bytes(&mut self) -> &mut [u8; PAGE_SIZE];

    /// Address the dispatcher calls to run this page.
    fn entry(&self) -> EntryPoint;

    /// Runs the code found at `entry` and returns its result word.
    ///
    /// # Safety
    /// `entry` must have been produced by [`CodePage::entry`] of a page of
    /// this type that is still alive and no longer written to.
    unsafe fn invoke(entry: EntryPoint) -> usize;
}

/// Supplier of zero-initialized code pages.
pub trait CodeAllocator {
    type Page: CodePage;

    /// Returns a zeroed page, or `None` if memory is exhausted.
    fn alloc_zeroed_page(&self) -> Option<Self::Page>;
}

/// Access to the address space of the process issuing a call.
pub trait UserMemory {
    /// Whether `addr..addr + len` lies entirely in the caller's space.
    fn is_user_range(&self, addr: usize, len: usize) -> bool;

    /// Copies `dst.len()` bytes starting at user address `src` into `dst`.
    ///
    /// # Errors
    /// [`ExtError::CopyFault`] if any byte of the source is not readable.
    fn copy_from_user(&self, dst: &mut [u8], src: usize) -> Result<(), ExtError>;

    /// Copies `src` to user address `dst`.
    ///
    /// # Errors
    /// [`ExtError::CopyFault`] if any byte of the destination is not writable.
    fn copy_to_user(&self, dst: usize, src: &[u8]) -> Result<(), ExtError>;
}
