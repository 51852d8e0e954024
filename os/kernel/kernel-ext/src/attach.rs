use crate::table::Extensions;
use crate::{CodePage, ExtError, ExtHandle, ExtState, HookSite};
use log::{info, warn};

impl<P: CodePage, H: HookSite, const N: usize> Extensions<P, H, N> {
    /// Makes a loaded extension reachable from the hook.
    ///
    /// The hook is installed and the record flagged `Attached` in one
    /// critical section, so the dispatcher can never see an attached record
    /// before the hook is live. Attaching an already attached extension is
    /// accepted and changes nothing.
    ///
    /// # Errors
    /// * [`ExtError::BadHandle`] if `handle` names no record of this table.
    /// * [`ExtError::NotLoaded`] if the record holds no code.
    /// * [`ExtError::Patch`] if the hook site could not be rewritten.
    pub fn attach(&self, handle: ExtHandle) -> Result<(), ExtError> {
        let index = self
            .resolve(handle)
            .inspect_err(|e| warn!("ext: attach rejected: {e}"))?;

        let mut slots = self.slots.lock();
        let slot = &mut slots[index];
        match slot.state {
            ExtState::Loaded => {}
            ExtState::Attached => return Ok(()),
            state @ (ExtState::Unused | ExtState::Reserved) => {
                drop(slots);
                warn!("ext: attach rejected: slot {index} is {state:?}");
                return Err(ExtError::NotLoaded(state));
            }
        }

        self.hook.install()?;
        slot.state = ExtState::Attached;
        let name = slot.name;
        drop(slots);

        info!("ext: attached {name:?} (slot {index})");
        Ok(())
    }
}
