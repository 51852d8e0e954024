use crate::table::{Extensions, Slot};
use crate::{
    CodeAllocator, CodePage, ExtError, ExtHandle, ExtName, ExtState, HookSite, PAGE_SIZE,
    UserMemory,
};
use log::{info, warn};

/// A code length already checked against the one-page limit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CodeLength(usize);

impl CodeLength {
    /// # Errors
    /// [`ExtError::InvalidLength`] unless `0 <= len <= PAGE_SIZE`.
    pub fn new(len: i64) -> Result<Self, ExtError> {
        match usize::try_from(len) {
            Ok(n) if n <= PAGE_SIZE => Ok(Self(n)),
            _ => Err(ExtError::InvalidLength(len)),
        }
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl<P: CodePage, H: HookSite, const N: usize> Extensions<P, H, N> {
    /// Loads `len` bytes of code from user address `src` into a fresh page
    /// and binds it to a free record.
    ///
    /// The length is checked before the table is touched. The slot is
    /// claimed under the lock, but the page is allocated and filled with the
    /// lock released; if that fails, the claim is rolled back.
    ///
    /// # Errors
    /// * [`ExtError::InvalidLength`] if `len` is negative or above a page.
    /// * [`ExtError::TableFull`] if every record is in use.
    /// * [`ExtError::OutOfPages`] if `alloc` has no page left.
    /// * [`ExtError::CopyFault`] if the source range cannot be read.
    pub fn load<A, M>(
        &self,
        alloc: &A,
        mem: &M,
        src: usize,
        len: i64,
        name: &str,
    ) -> Result<ExtHandle, ExtError>
    where
        A: CodeAllocator<Page = P> + ?Sized,
        M: UserMemory + ?Sized,
    {
        let len = CodeLength::new(len).inspect_err(|e| warn!("ext: load rejected: {e}"))?;
        let index = self.claim_slot()?;

        let page = match fill_page(alloc, mem, src, len) {
            Ok(page) => page,
            Err(e) => {
                self.slots.lock()[index].state = ExtState::Unused;
                warn!("ext: load into slot {index} failed: {e}");
                return Err(e);
            }
        };

        let entry = page.entry();
        let name = ExtName::new(name);
        {
            let mut slots = self.slots.lock();
            let slot = &mut slots[index];
            slot.entry = entry;
            slot.name = name;
            slot.code = Some(page);
            slot.state = ExtState::Loaded;
        }

        info!(
            "ext: loaded {name:?} into slot {index}: {} bytes at {entry:#x}",
            len.get()
        );
        Ok(self.handle_of(index))
    }

    /// Rolls back a load whose handle never reached its requester.
    ///
    /// Only a `Loaded` record qualifies; attached extensions stay for good.
    /// The record goes back to `Unused` and its page is released once the
    /// lock is gone.
    ///
    /// # Errors
    /// * [`ExtError::BadHandle`] if `handle` names no record of this table.
    /// * [`ExtError::NotLoaded`] unless the record is `Loaded`.
    pub fn abandon(&self, handle: ExtHandle) -> Result<(), ExtError> {
        let index = self.resolve(handle)?;
        let (name, page) = {
            let mut slots = self.slots.lock();
            let slot = &mut slots[index];
            if slot.state != ExtState::Loaded {
                return Err(ExtError::NotLoaded(slot.state));
            }
            let name = slot.name;
            let page = core::mem::replace(slot, Slot::EMPTY).code;
            (name, page)
        };
        drop(page);
        warn!("ext: abandoned {name:?} in slot {index}");
        Ok(())
    }

    /// Claims the first unused record by marking it reserved.
    fn claim_slot(&self) -> Result<usize, ExtError> {
        let mut slots = self.slots.lock();
        let Some(index) = Self::find_free_slot(&slots) else {
            drop(slots);
            warn!("ext: load rejected: all {N} slots in use");
            return Err(ExtError::TableFull);
        };
        slots[index].state = ExtState::Reserved;
        Ok(index)
    }
}

fn fill_page<A, M>(alloc: &A, mem: &M, src: usize, len: CodeLength) -> Result<A::Page, ExtError>
where
    A: CodeAllocator + ?Sized,
    M: UserMemory + ?Sized,
{
    let mut page = alloc.alloc_zeroed_page().ok_or(ExtError::OutOfPages)?;
    mem.copy_from_user(&mut page.as_mut_bytes()[..len.get()], src)?;
    Ok(page)
}
