//! Hook sites: where the hooked syscall hands control to the dispatcher.
//!
//! There is exactly one hook per extension table. Attaching any extension
//! installs it; installing again is a no-op that leaves the site unchanged.
//!
//! [`IndirectHook`] can be built in a `const` context and is what a `static`
//! table uses. [`PatchedHook`] cannot: its [`HookRegion`] comes from
//! link-time symbol addresses and its [`RelBranch`] from the trampoline's
//! address, both only known at run time. A table using it has to be created
//! during boot, once the hook site's addresses are known, and handed to
//! the syscall layer by reference.

use crate::ExtError;
use crate::patch::{self, BRANCH_LEN, RelBranch};
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use kernel_sync::SpinLock;
use log::debug;

/// The function a hook transfers control to. Normally a thin wrapper that
/// calls [`Extensions::dispatch`](crate::Extensions::dispatch) on a static
/// table.
pub type Trampoline = fn();

/// A location in the hooked syscall that can be redirected to a trampoline.
pub trait HookSite: Sync {
    /// Makes the site call its trampoline from now on.
    ///
    /// Must be idempotent: a second install leaves the site as the first
    /// one left it.
    ///
    /// # Errors
    /// [`ExtError::Patch`] if the site cannot be rewritten.
    fn install(&self) -> Result<(), ExtError>;

    fn is_installed(&self) -> bool;

    /// Executes the hook as part of the hooked syscall.
    fn fire(&self);
}

/// An indirect-call slot read by the hooked syscall on every entry.
///
/// Installing is a single release store of the trampoline pointer; the
/// syscall body calls through the slot if it is set.
pub struct IndirectHook {
    target: Trampoline,
    slot: AtomicPtr<()>,
}

impl IndirectHook {
    #[must_use]
    pub const fn new(target: Trampoline) -> Self {
        Self {
            target,
            slot: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl HookSite for IndirectHook {
    fn install(&self) -> Result<(), ExtError> {
        let target = self.target as *mut ();
        let previous = self.slot.swap(target, Ordering::Release);
        if previous.is_null() {
            debug!("ext: indirect hook now calls {target:p}");
        }
        Ok(())
    }

    fn is_installed(&self) -> bool {
        !self.slot.load(Ordering::Acquire).is_null()
    }

    fn fire(&self) {
        let p = self.slot.load(Ordering::Acquire);
        if p.is_null() {
            return;
        }
        // Only ever holds `self.target`.
        let f = unsafe { core::mem::transmute::<*mut (), Trampoline>(p) };
        f();
    }
}

/// A reserved run of padding bytes inside compiled code.
#[derive(Debug)]
pub struct HookRegion {
    start: *mut u8,
    len: usize,
}

// Safety: the region is only written through PatchedHook's lock.
unsafe impl Send for HookRegion {}

impl HookRegion {
    /// Describes the bytes between two link-time symbols.
    ///
    /// # Safety
    /// `start..end` must be a valid, writable (and, to be useful,
    /// executable) byte range that nothing else writes to.
    #[must_use]
    pub unsafe fn from_symbols(start: *mut u8, end: *mut u8) -> Self {
        Self {
            start,
            len: end as usize - start as usize,
        }
    }

    #[must_use]
    pub fn addr(&self) -> u64 {
        self.start as u64
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn bytes(&self) -> &[u8] {
        unsafe { core::slice::from_raw_parts(self.start, self.len) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        unsafe { core::slice::from_raw_parts_mut(self.start, self.len) }
    }
}

/// A hook site rewritten in place with a relative `call`.
///
/// The branch is prepared ahead of time against some other address (for
/// example assembled next to the trampoline) and relocated to the site when
/// installed. Since the site sits inline in the syscall body, [`fire`] has
/// nothing to do: the patched instruction runs by itself.
///
/// [`fire`]: HookSite::fire
pub struct PatchedHook {
    template: RelBranch,
    region: SpinLock<HookRegion>,
    installed: AtomicBool,
}

impl PatchedHook {
    #[must_use]
    pub const fn new(region: HookRegion, template: RelBranch) -> Self {
        Self {
            template,
            region: SpinLock::new(region),
            installed: AtomicBool::new(false),
        }
    }

    /// Current contents of the site.
    pub fn site_bytes(&self) -> [u8; BRANCH_LEN] {
        let mut out = [0; BRANCH_LEN];
        let region = self.region.lock();
        let n = region.len().min(BRANCH_LEN);
        out[..n].copy_from_slice(&region.bytes()[..n]);
        out
    }
}

impl HookSite for PatchedHook {
    fn install(&self) -> Result<(), ExtError> {
        let mut region = self.region.lock();
        let addr = region.addr();
        if patch::write_site(region.bytes_mut(), addr, self.template)? {
            debug!(
                "ext: patched hook site at {addr:#x} to call {:#x}",
                self.template.target()
            );
        }
        self.installed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_installed(&self) -> bool {
        self.installed.load(Ordering::Acquire)
    }

    fn fire(&self) {}
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::patch::{CALL_REL32, NOP5};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn indirect_hook_calls_nothing_until_installed() {
        static HITS: AtomicUsize = AtomicUsize::new(0);
        fn bump() {
            HITS.fetch_add(1, Ordering::SeqCst);
        }
        static HOOK: IndirectHook = IndirectHook::new(bump);

        HOOK.fire();
        assert_eq!(HITS.load(Ordering::SeqCst), 0);
        assert!(!HOOK.is_installed());

        HOOK.install().unwrap();
        HOOK.install().unwrap();
        HOOK.fire();
        HOOK.fire();
        assert_eq!(HITS.load(Ordering::SeqCst), 2);
        assert!(HOOK.is_installed());
    }

    #[test]
    fn patched_hook_relocates_the_template() {
        let site: &'static mut [u8; BRANCH_LEN] = Box::leak(Box::new(NOP5));
        let start = site.as_mut_ptr();
        let region = unsafe { HookRegion::from_symbols(start, start.add(BRANCH_LEN)) };
        let site_end = region.addr() + BRANCH_LEN as u64;

        // Prepared 64 KiB away from where it ends up.
        let trampoline = site_end + 0x4000;
        let template = RelBranch::call(trampoline, site_end + 0x1_0000).unwrap();
        let hook = PatchedHook::new(region, template);

        hook.install().unwrap();
        let bytes = hook.site_bytes();
        assert_eq!(bytes[0], CALL_REL32);
        assert_eq!(RelBranch::decode(bytes, site_end).unwrap().target(), trampoline);

        hook.install().unwrap();
        assert_eq!(hook.site_bytes(), bytes);
        assert!(hook.is_installed());
    }

    #[test]
    fn patched_hook_refuses_foreign_bytes() {
        let site: &'static mut [u8; BRANCH_LEN] = Box::leak(Box::new([0xC3; BRANCH_LEN]));
        let start = site.as_mut_ptr();
        let region = unsafe { HookRegion::from_symbols(start, start.add(BRANCH_LEN)) };
        let end = region.addr() + BRANCH_LEN as u64;
        let hook = PatchedHook::new(region, RelBranch::call(end + 16, end).unwrap());

        assert!(matches!(hook.install(), Err(ExtError::Patch(_))));
        assert!(!hook.is_installed());
        assert_eq!(hook.site_bytes(), [0xC3; BRANCH_LEN]);
    }
}
