// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Lifetime tests for reference-counted handles.
//!
//! These exercise the ownership contract: shared owners, release, and
//! use-after-free detection, with a resource that counts its own drops.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use ferry::{Arena, Error, MemoryModel};

/// Resource that records how many times it was dropped.
struct Tracked {
    drops: Arc<AtomicUsize>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

fn tracked_arena() -> (Arena<Tracked>, Arc<AtomicUsize>) {
    (
        Arena::new(MemoryModel::MirroredHeap),
        Arc::new(AtomicUsize::new(0)),
    )
}

#[test]
fn every_operation_fails_after_close() {
    let (arena, drops) = tracked_arena();
    let mut handle = arena.acquire(Tracked {
        drops: drops.clone(),
    });
    let id = handle.id();
    handle.close().unwrap();

    assert!(!handle.is_open());
    assert_eq!(handle.ref_count().unwrap_err(), Error::UseAfterFree(id));
    assert_eq!(handle.copy_reference().unwrap_err(), Error::UseAfterFree(id));
    assert_eq!(handle.with(|_| ()).unwrap_err(), Error::UseAfterFree(id));
    assert_eq!(handle.release().unwrap_err(), Error::UseAfterFree(id));
    assert_eq!(handle.close().unwrap_err(), Error::UseAfterFree(id));
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn closing_a_copy_keeps_the_original_alive() {
    let (arena, drops) = tracked_arena();
    let mut original = arena.acquire(Tracked {
        drops: drops.clone(),
    });
    let mut copy = original.copy_reference().unwrap();
    assert_eq!(original.ref_count().unwrap(), 2);

    copy.close().unwrap();
    assert!(original.is_open());
    assert!(!copy.is_open());
    assert_eq!(original.ref_count().unwrap(), 1);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    original.close().unwrap();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
    assert_eq!(arena.live_count(), 0);
}

#[test]
fn resource_is_freed_exactly_once_with_many_owners() {
    let (arena, drops) = tracked_arena();
    let first = arena.acquire(Tracked {
        drops: drops.clone(),
    });
    let mut owners: Vec<_> = (0..8).map(|_| first.copy_reference().unwrap()).collect();
    owners.push(first);

    while let Some(mut owner) = owners.pop() {
        owner.release().unwrap();
        let expected = usize::from(owners.is_empty());
        assert_eq!(drops.load(Ordering::SeqCst), expected);
    }
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_ids_do_not_reach_reused_slots() {
    let (arena, drops) = tracked_arena();
    let mut old = arena.acquire(Tracked {
        drops: drops.clone(),
    });
    let old_copy = old.copy_reference().unwrap();
    old.release().unwrap();
    drop(old_copy);

    let fresh = arena.acquire(Tracked {
        drops: drops.clone(),
    });
    assert_eq!(fresh.id().index(), old.id().index());
    assert!(!old.is_open());
    assert!(fresh.is_open());
    assert_eq!(arena.live_count(), 1);
}

#[test]
fn process_wide_model_applies_to_new_arenas_only() {
    let before: Arena<u8> = Arena::default();
    let original = ferry::memory_model();

    let switched = match original {
        MemoryModel::MirroredHeap => MemoryModel::NativeOnly,
        MemoryModel::NativeOnly => MemoryModel::MirroredHeap,
    };
    ferry::set_memory_model(switched);
    let after: Arena<u8> = Arena::default();
    ferry::set_memory_model(original);

    assert_eq!(before.memory_model(), original);
    assert_eq!(after.memory_model(), switched);
}
