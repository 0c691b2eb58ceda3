//! Shared handles under concurrent copy, reassignment and release.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use femtologging_core::Handle;
use rstest::rstest;

struct Tracked {
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[rstest]
#[case(2, 1_000)]
#[case(8, 500)]
fn copies_across_threads_release_once(#[case] threads: usize, #[case] rounds: usize) {
    let drops = Arc::new(AtomicUsize::new(0));
    let shared = Arc::new(Handle::new(Tracked {
        drops: Arc::clone(&drops),
    }));

    let workers: Vec<_> = (0..threads)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                for _ in 0..rounds {
                    let copy = (*shared).clone();
                    let target = copy.get().expect("target present");
                    assert!(copy.ref_count() >= 2);
                    drop(target);
                    drop(copy);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker completes");
    }

    assert_eq!(shared.ref_count(), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);
    drop(shared);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[rstest]
fn concurrent_reassignment_drops_every_target_once() {
    const TARGETS: usize = 16;
    let drops = Arc::new(AtomicUsize::new(0));
    let slot = Arc::new(Handle::<Tracked>::null());

    let workers: Vec<_> = (0..TARGETS)
        .map(|_| {
            let slot = Arc::clone(&slot);
            let drops = Arc::clone(&drops);
            thread::spawn(move || {
                let mine = Handle::new(Tracked { drops });
                for _ in 0..100 {
                    slot.assign(&mine);
                    let _reader = slot.get();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker completes");
    }

    assert_eq!(slot.ref_count(), 1);
    assert_eq!(drops.load(Ordering::SeqCst), TARGETS - 1);
    slot.reset();
    assert_eq!(drops.load(Ordering::SeqCst), TARGETS);
}
