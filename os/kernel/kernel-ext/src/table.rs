use crate::{CodePage, EntryPoint, ExtError, ExtHandle, ExtInfo, ExtName, ExtState, HookSite};
use core::mem::size_of;
use core::ops::Range;
use kernel_sync::SpinLock;

pub(crate) struct Slot<P> {
    pub(crate) state: ExtState,
    pub(crate) code: Option<P>,
    pub(crate) entry: EntryPoint,
    pub(crate) name: ExtName,
}

impl<P> Slot<P> {
    pub(crate) const EMPTY: Self = Self {
        state: ExtState::Unused,
        code: None,
        entry: EntryPoint::NULL,
        name: ExtName::EMPTY,
    };

    fn info(&self, slot: usize) -> ExtInfo {
        ExtInfo {
            slot,
            state: self.state,
            entry: (!self.entry.is_null()).then_some(self.entry),
            name: self.name,
        }
    }
}

/// Fixed-capacity table of extension records sharing one hook.
///
/// All record state sits behind a single spin lock. Construct it as a
/// `static` so the trampoline installed by the hook can reach it:
///
/// ```
/// use kernel_ext::{Extensions, IndirectHook, PoolPage};
///
/// static EXTENSIONS: Extensions<PoolPage, IndirectHook, 8> =
///     Extensions::new(IndirectHook::new(trampoline));
///
/// fn trampoline() {
///     EXTENSIONS.dispatch(|_, _| {});
/// }
///
/// assert_eq!(EXTENSIONS.free_slots(), 8);
/// ```
pub struct Extensions<P, H, const N: usize> {
    pub(crate) slots: SpinLock<[Slot<P>; N]>,
    pub(crate) hook: H,
}

impl<P: CodePage, H: HookSite, const N: usize> Extensions<P, H, N> {
    #[must_use]
    pub const fn new(hook: H) -> Self {
        Self {
            slots: SpinLock::new([const { Slot::EMPTY }; N]),
            hook,
        }
    }

    /// Total number of records.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// The hook shared by all extensions of this table.
    pub const fn hook(&self) -> &H {
        &self.hook
    }

    /// Index of the first unused record, if any.
    ///
    /// Must be called with the table lock held; the caller claims the slot
    /// before letting go of the lock.
    pub(crate) fn find_free_slot(slots: &[Slot<P>; N]) -> Option<usize> {
        slots.iter().position(|s| s.state == ExtState::Unused)
    }

    /// Number of records still `Unused`.
    pub fn free_slots(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .filter(|s| s.state == ExtState::Unused)
            .count()
    }

    /// Copies out the public view of every record.
    pub fn snapshot(&self) -> [ExtInfo; N] {
        let slots = self.slots.lock();
        core::array::from_fn(|i| slots[i].info(i))
    }

    /// Address range covering the records; every handle lies inside it.
    pub fn handle_region(&self) -> Range<usize> {
        let base = self.slots.as_ptr() as usize;
        base..base + N * size_of::<Slot<P>>()
    }

    pub(crate) fn handle_of(&self, index: usize) -> ExtHandle {
        ExtHandle::from_raw(self.handle_region().start + index * size_of::<Slot<P>>())
    }

    /// Maps a handle back to its record index.
    ///
    /// # Errors
    /// [`ExtError::BadHandle`] unless `handle` is the address of one of this
    /// table's records.
    pub fn resolve(&self, handle: ExtHandle) -> Result<usize, ExtError> {
        let raw = handle.as_raw();
        let region = self.handle_region();
        if !region.contains(&raw) {
            return Err(ExtError::BadHandle(raw));
        }
        let offset = raw - region.start;
        if offset % size_of::<Slot<P>>() != 0 {
            return Err(ExtError::BadHandle(raw));
        }
        Ok(offset / size_of::<Slot<P>>())
    }

    /// Public view of one record.
    ///
    /// # Errors
    /// [`ExtError::BadHandle`] for handles of other tables.
    pub fn info(&self, handle: ExtHandle) -> Result<ExtInfo, ExtError> {
        let index = self.resolve(handle)?;
        Ok(self.slots.lock()[index].info(index))
    }

    /// Runs `f` on the code page of a loaded extension, under the table lock.
    ///
    /// # Errors
    /// * [`ExtError::BadHandle`] for handles of other tables.
    /// * [`ExtError::NotLoaded`] if the record holds no code yet.
    pub fn with_code<R>(&self, handle: ExtHandle, f: impl FnOnce(&[u8]) -> R) -> Result<R, ExtError> {
        let index = self.resolve(handle)?;
        let slots = self.slots.lock();
        let slot = &slots[index];
        match (&slot.code, slot.state) {
            (Some(page), ExtState::Loaded | ExtState::Attached) => Ok(f(page.as_bytes())),
            (_, state) => Err(ExtError::NotLoaded(state)),
        }
    }
}
