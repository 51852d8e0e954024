//! Statically reserved pool of executable code pages.

use crate::{CodeAllocator, CodePage, EntryPoint, PAGE_SIZE};
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU64, Ordering};
use log::{debug, warn};

#[repr(C, align(4096))]
struct PageFrame(UnsafeCell<[u8; PAGE_SIZE]>);

// Safety: a frame is only touched by the single PoolPage that claimed its bit.
unsafe impl Sync for PageFrame {}

/// `N` page-aligned code pages tracked by a bitmap.
///
/// The frames must be executable: the kernel places its pool static in
/// `.text.ext_pages`, which the linker script maps writable and executable.
/// Pages go back to the pool when their [`PoolPage`] is dropped.
#[repr(C)]
pub struct PagePool<const N: usize> {
    frames: [PageFrame; N],
    /// Bit `i` set means frame `i` is handed out.
    used: AtomicU64,
}

impl<const N: usize> PagePool<N> {
    #[must_use]
    pub const fn new() -> Self {
        const { assert!(N <= 64, "the pool bitmap holds at most 64 pages") };
        Self {
            frames: [const { PageFrame(UnsafeCell::new([0; PAGE_SIZE])) }; N],
            used: AtomicU64::new(0),
        }
    }

    /// Number of pages not currently handed out.
    pub fn available(&self) -> usize {
        N - self.used.load(Ordering::Relaxed).count_ones() as usize
    }

    /// Claims a free frame and zeroes it.
    pub fn alloc(&'static self) -> Option<PoolPage> {
        let mut used = self.used.load(Ordering::Relaxed);
        loop {
            let index = (!used).trailing_zeros() as usize;
            if index >= N {
                warn!("ext: code page pool exhausted ({N} pages)");
                return None;
            }
            match self.used.compare_exchange_weak(
                used,
                used | (1 << index),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break Some(self.claimed(index)),
                Err(current) => used = current,
            }
        }
    }

    fn claimed(&'static self, index: usize) -> PoolPage {
        let mut page = PoolPage {
            frame: &self.frames[index],
            used: &self.used,
            index,
        };
        page.as_mut_bytes().fill(0);
        debug!("ext: code page {index} at {:#x}", page.entry());
        page
    }
}

impl<const N: usize> Default for PagePool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CodeAllocator for &'static PagePool<N> {
    type Page = PoolPage;

    fn alloc_zeroed_page(&self) -> Option<PoolPage> {
        self.alloc()
    }
}

/// Exclusive claim on one frame of a [`PagePool`].
pub struct PoolPage {
    frame: &'static PageFrame,
    used: &'static AtomicU64,
    index: usize,
}

impl CodePage for PoolPage {
    fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        unsafe { &*self.frame.0.get() }
    }

    fn as_mut_bytes(&mut self) -> &mut [u8; PAGE_SIZE] {
        unsafe { &mut *self.frame.0.get() }
    }

    fn entry(&self) -> EntryPoint {
        EntryPoint::from_addr(self.frame.0.get() as usize)
    }

    unsafe fn invoke(entry: EntryPoint) -> usize {
        unsafe { (entry.as_fn())() }
    }
}

impl Drop for PoolPage {
    fn drop(&mut self) {
        self.used.fetch_and(!(1 << self.index), Ordering::Release);
    }
}
