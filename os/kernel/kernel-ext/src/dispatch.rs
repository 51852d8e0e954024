use crate::table::Extensions;
use crate::{CodePage, ExtState, HookSite};
use kernel_sync::SpinLockGuard;
use log::trace;

impl<P: CodePage, H: HookSite, const N: usize> Extensions<P, H, N> {
    /// Invokes every attached extension, in slot order.
    ///
    /// This is the body of the trampoline. The table lock is held while
    /// scanning but released for the duration of each extension call, so a
    /// long-running extension does not stall loads and attaches elsewhere.
    /// `observe` receives the slot index and the word returned by each call;
    /// it also runs without the lock.
    ///
    /// Returns the number of extensions invoked.
    pub fn dispatch(&self, mut observe: impl FnMut(usize, usize)) -> usize {
        let mut invoked = 0;
        let mut slots = self.slots.lock();
        for index in 0..N {
            let slot = &slots[index];
            if slot.state != ExtState::Attached {
                continue;
            }
            let entry = slot.entry;

            // Attached records keep their page for the table's lifetime.
            SpinLockGuard::unlocked(&mut slots, || {
                let ret = unsafe { P::invoke(entry) };
                trace!("ext: slot {index} returned {ret:#x}");
                observe(index, ret);
            });
            invoked += 1;
        }
        invoked
    }
}
