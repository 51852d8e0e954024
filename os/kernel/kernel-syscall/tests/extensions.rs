mod common;

use common::{HANDLE_ADDR, Process};
use kernel_ext::emulated::{EmulatedAllocator, EmulatedPage};
use kernel_ext::emulated::EmulatedUserSpace;
use kernel_ext::{
    ExtError, ExtHandle, ExtState, Extensions, HookSite, IndirectHook, PAGE_SIZE, UserMemory,
};
use kernel_syscall::example_extension::{ADD_FOUR_AND_SIX, ADD_FOUR_AND_SIX_RESULT};
use kernel_syscall::{Caller, PING_REPLY, SYSCALL_FAILED, SyscallArgs, Syscalls, Sysno};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

type Table = Extensions<EmulatedPage, IndirectHook, 4>;

fn noop() {}

fn table() -> Table {
    Extensions::new(IndirectHook::new(noop))
}

fn len_of(code: &[u8]) -> i64 {
    i64::try_from(code.len()).unwrap()
}

#[test]
fn loaded_extension_runs_on_every_ping() {
    static RESULTS: Mutex<Vec<usize>> = Mutex::new(Vec::new());
    static EXT: Table = Extensions::new(IndirectHook::new(trampoline));
    fn trampoline() {
        EXT.dispatch(|_, ret| RESULTS.lock().unwrap().push(ret));
    }

    let sys = Syscalls::new(&EXT, EmulatedAllocator::unlimited());
    let process = Process::new("x_hello", true).with_code(ADD_FOUR_AND_SIX);

    assert_eq!(process.ext_load(&sys, len_of(ADD_FOUR_AND_SIX)), 0);
    let handle = process.handle_word();
    assert_ne!(handle, 0);
    assert_eq!(process.ping(&sys), PING_REPLY);
    assert!(RESULTS.lock().unwrap().is_empty());

    assert_eq!(process.ext_attach(&sys, handle), 0);
    let info = EXT.info(ExtHandle::from_raw(handle)).unwrap();
    assert_eq!(info.state, ExtState::Attached);
    assert_eq!(info.name.as_str(), "x_hello");

    assert_eq!(process.ping(&sys), PING_REPLY);
    assert_eq!(process.ping(&sys), PING_REPLY);
    assert_eq!(
        *RESULTS.lock().unwrap(),
        [ADD_FOUR_AND_SIX_RESULT, ADD_FOUR_AND_SIX_RESULT]
    );
}

#[test]
fn bad_lengths_fail_and_write_a_null_handle() {
    let ext = table();
    let sys = Syscalls::new(&ext, EmulatedAllocator::unlimited());
    let process = Process::new("bad", true).with_code(ADD_FOUR_AND_SIX);

    for len in [-1, PAGE_SIZE as i64 + 1] {
        assert_eq!(process.ext_load(&sys, len), SYSCALL_FAILED);
        assert_eq!(process.handle_word(), 0);
        assert_eq!(ext.free_slots(), 4);
    }
}

#[test]
fn unwritable_handle_pointer_is_rejected_before_loading() {
    let ext = table();
    let sys = Syscalls::new(&ext, EmulatedAllocator::unlimited());
    let process = Process::new("p", true).with_code(ADD_FOUR_AND_SIX);

    let args = SyscallArgs::new([
        common::CODE_ADDR as u64,
        9,
        0x10, // not in the process
        0,
        0,
        0,
    ]);
    assert_eq!(
        sys.dispatch(&process, Sysno::ExtLoad as u64, args),
        SYSCALL_FAILED
    );
    assert_eq!(ext.free_slots(), 4);
}

#[test]
fn code_outside_the_caller_is_not_copied() {
    let ext = table();
    let sys = Syscalls::new(&ext, EmulatedAllocator::unlimited());
    let process = Process::new("p", true).with_code(ADD_FOUR_AND_SIX);

    let kernel_text = noop as usize as u64;
    let args = SyscallArgs::new([kernel_text, 9, HANDLE_ADDR as u64, 0, 0, 0]);
    assert_eq!(
        sys.dispatch(&process, Sysno::ExtLoad as u64, args),
        SYSCALL_FAILED
    );
    assert_eq!(process.handle_word(), 0);
    assert_eq!(ext.free_slots(), 4);
}

#[test]
fn unprivileged_callers_cannot_load() {
    let ext = table();
    let sys = Syscalls::new(&ext, EmulatedAllocator::unlimited());
    let process = Process::new("user", false).with_code(ADD_FOUR_AND_SIX);

    assert_eq!(process.ext_load(&sys, len_of(ADD_FOUR_AND_SIX)), SYSCALL_FAILED);
    assert_eq!(process.handle_word(), 0);
    assert_eq!(ext.free_slots(), 4);
}

#[test]
fn full_table_fails_the_next_load() {
    let ext = table();
    let sys = Syscalls::new(&ext, EmulatedAllocator::unlimited());
    let process = Process::new("p", true).with_code(ADD_FOUR_AND_SIX);

    let mut handles = Vec::new();
    for _ in 0..4 {
        assert_eq!(process.ext_load(&sys, len_of(ADD_FOUR_AND_SIX)), 0);
        handles.push(process.handle_word());
    }
    handles.sort_unstable();
    handles.dedup();
    assert_eq!(handles.len(), 4);

    assert_eq!(process.ext_load(&sys, len_of(ADD_FOUR_AND_SIX)), SYSCALL_FAILED);
    assert_eq!(process.handle_word(), 0);
}

#[test]
fn attach_rejects_foreign_and_misaligned_handles() {
    let ext = table();
    let sys = Syscalls::new(&ext, EmulatedAllocator::unlimited());
    let process = Process::new("p", true).with_code(ADD_FOUR_AND_SIX);

    assert_eq!(process.ext_load(&sys, len_of(ADD_FOUR_AND_SIX)), 0);
    let handle = process.handle_word();

    assert_eq!(process.ext_attach(&sys, 0), SYSCALL_FAILED);
    assert_eq!(process.ext_attach(&sys, handle + 1), SYSCALL_FAILED);
    assert_eq!(process.ext_attach(&sys, handle + 8), SYSCALL_FAILED);
    assert_eq!(process.ext_attach(&sys, ext.handle_region().end), SYSCALL_FAILED);
    assert!(!ext.hook().is_installed());

    assert_eq!(process.ext_attach(&sys, handle), 0);
    assert_eq!(process.ext_attach(&sys, handle), 0);
    assert!(ext.hook().is_installed());
}

#[test]
fn unused_slots_cannot_be_attached() {
    let ext = table();
    let sys = Syscalls::new(&ext, EmulatedAllocator::unlimited());
    let process = Process::new("p", true);

    let first_record = ext.handle_region().start;
    assert_eq!(process.ext_attach(&sys, first_record), SYSCALL_FAILED);
    assert!(!ext.hook().is_installed());
}

/// A process whose handle word is mapped read-only after a number of writes.
struct ReadOnlyHandle {
    memory: GuardedWord,
}

struct GuardedWord {
    inner: EmulatedUserSpace,
    writes_left: AtomicUsize,
}

impl ReadOnlyHandle {
    fn new(writes_allowed: usize) -> Self {
        let process = Process::new("ro", true).with_code(ADD_FOUR_AND_SIX);
        Self {
            memory: GuardedWord {
                inner: process.memory,
                writes_left: AtomicUsize::new(writes_allowed),
            },
        }
    }

    fn ext_load<H: HookSite>(&self, sys: &Syscalls<'_, EmulatedAllocator, H, 4>) -> u64 {
        let len = len_of(ADD_FOUR_AND_SIX).cast_unsigned();
        let args = SyscallArgs::new([common::CODE_ADDR as u64, len, HANDLE_ADDR as u64, 0, 0, 0]);
        sys.dispatch(self, Sysno::ExtLoad as u64, args)
    }
}

impl UserMemory for GuardedWord {
    fn is_user_range(&self, addr: usize, len: usize) -> bool {
        self.inner.is_user_range(addr, len)
    }

    fn copy_from_user(&self, dst: &mut [u8], src: usize) -> Result<(), ExtError> {
        self.inner.copy_from_user(dst, src)
    }

    fn copy_to_user(&self, dst: usize, src: &[u8]) -> Result<(), ExtError> {
        let writable = dst != HANDLE_ADDR
            || self
                .writes_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if !writable {
            return Err(ExtError::CopyFault {
                addr: dst,
                len: src.len(),
            });
        }
        self.inner.copy_to_user(dst, src)
    }
}

impl Caller for ReadOnlyHandle {
    type Memory = GuardedWord;

    fn memory(&self) -> &GuardedWord {
        &self.memory
    }

    fn may_load_extensions(&self) -> bool {
        true
    }

    fn debug_write(&self, _byte: u8) {}

    fn name(&self) -> &str {
        "ro"
    }
}

#[test]
fn read_only_handle_word_fails_before_loading() {
    let ext = table();
    let sys = Syscalls::new(&ext, EmulatedAllocator::unlimited());
    let process = ReadOnlyHandle::new(0);

    assert_eq!(process.ext_load(&sys), SYSCALL_FAILED);
    assert_eq!(ext.free_slots(), 4);
    assert_eq!(ext.snapshot()[0].state, ExtState::Unused);
}

#[test]
fn undeliverable_handle_undoes_the_load() {
    let ext = table();
    let sys = Syscalls::new(&ext, EmulatedAllocator::unlimited());
    let process = ReadOnlyHandle::new(1);

    assert_eq!(process.ext_load(&sys), SYSCALL_FAILED);
    assert_eq!(process.memory.inner.read_word(HANDLE_ADDR).unwrap(), 0);
    assert_eq!(ext.free_slots(), 4);
    assert_eq!(ext.snapshot()[0].state, ExtState::Unused);
}
