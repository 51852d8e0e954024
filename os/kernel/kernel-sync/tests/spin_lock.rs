use kernel_sync::{SpinLock, SpinLockGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::{panic, thread};

#[test]
fn basic_lock_and_raii() {
    let l = SpinLock::new(0_u32);

    {
        let mut g = l.lock();
        *g = 41;
        assert!(l.is_locked());
    }
    assert!(!l.is_locked());

    let mut g = l.lock();
    *g += 1;
    assert_eq!(*g, 42);
}

#[test]
fn try_lock_semantics() {
    let l = SpinLock::new(1u8);

    let g1 = l.try_lock();
    assert_eq!(g1.as_deref(), Some(&1));
    assert!(l.try_lock().is_none());

    drop(g1);
    assert!(l.try_lock().is_some());
}

#[test]
fn with_lock_works_and_unlocks() {
    let l = SpinLock::new(String::from("a"));
    let len = l.with_lock(|s| {
        s.push('b');
        s.len()
    });
    assert_eq!(len, 2);
    assert_eq!(l.with_lock(|s| s.clone()), "ab");
}

#[test]
fn get_mut_allows_direct_mutation() {
    let mut l = SpinLock::new(vec![1, 2, 3]);
    l.get_mut().push(4);
    assert_eq!(l.lock().as_slice(), &[1, 2, 3, 4]);
}

#[test]
fn as_ptr_is_the_address_of_the_value() {
    let l = SpinLock::new([7u64; 4]);
    let p = l.as_ptr();
    let g = l.lock();
    assert_eq!(p.cast_const(), &raw const *g);
    assert_eq!(p as usize % align_of::<u64>(), 0);
}

#[test]
fn unlocked_releases_and_reacquires() {
    let l = SpinLock::new(vec![1]);
    let mut g = l.lock();
    g.push(2);

    let seen = SpinLockGuard::unlocked(&mut g, || {
        assert!(!l.is_locked());
        // Someone else may take the lock in between.
        l.with_lock(|v| {
            v.push(3);
            v.len()
        })
    });

    assert_eq!(seen, 3);
    assert!(l.is_locked());
    g.push(4);
    drop(g);
    assert_eq!(l.lock().as_slice(), &[1, 2, 3, 4]);
}

#[test]
fn unlocked_reacquires_on_panic() {
    let l = SpinLock::new(0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        let mut g = l.lock();
        *g = 5;
        SpinLockGuard::unlocked(&mut g, || panic!("boom"));
    }));
    assert!(res.is_err(), "expected panic");

    // Re-acquired during unwind, then released by the guard's drop.
    assert!(!l.is_locked());
    assert_eq!(l.with_lock(|v| *v), 5);
}

#[test]
fn contended_increments_are_exact_and_exclusive() {
    let threads = 8;
    let iters = 5_000;

    let lock = Arc::new(SpinLock::new(0usize));
    let in_cs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let (lock, in_cs, start) = (Arc::clone(&lock), Arc::clone(&in_cs), Arc::clone(&start));
            thread::spawn(move || {
                start.wait();
                for _ in 0..iters {
                    lock.with_lock(|v| {
                        let prev = in_cs.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(prev, 0, "mutual exclusion violated");
                        *v += 1;
                        in_cs.fetch_sub(1, Ordering::SeqCst);
                    });
                    thread::yield_now();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(lock.with_lock(|v| *v), threads * iters);
}

#[test]
fn critical_sections_stay_exclusive_across_unlocked_gaps() {
    let threads = 4;
    let iters = 2_000;

    let lock = Arc::new(SpinLock::new(0usize));
    let in_cs = Arc::new(AtomicUsize::new(0));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let (lock, in_cs, start) = (Arc::clone(&lock), Arc::clone(&in_cs), Arc::clone(&start));
            thread::spawn(move || {
                start.wait();
                for _ in 0..iters {
                    let mut g = lock.lock();
                    assert_eq!(in_cs.fetch_add(1, Ordering::SeqCst), 0);
                    *g += 1;
                    in_cs.fetch_sub(1, Ordering::SeqCst);

                    SpinLockGuard::unlocked(&mut g, thread::yield_now);

                    assert_eq!(in_cs.fetch_add(1, Ordering::SeqCst), 0);
                    *g += 1;
                    in_cs.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(lock.with_lock(|v| *v), 2 * threads * iters);
}

#[test]
fn lock_is_released_on_panic() {
    let l = SpinLock::new(0u32);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        l.with_lock(|v| {
            *v = 123;
            panic!("boom");
        });
    }));
    assert!(res.is_err(), "expected panic");
    assert_eq!(l.with_lock(|v| *v), 123);
}
