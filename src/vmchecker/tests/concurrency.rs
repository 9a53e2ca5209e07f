//! Properties of the query observed from the outside: repeated and concurrent
//! calls agree and leave the process as they found it.

// Integration tests see every dependency of the library.
#![allow(unused_crate_dependencies)]

use std::{collections::BTreeMap, env, thread};

use vmchecker::HypervisorDetector;

#[test]
fn concurrent_calls_agree() {
    let expected = vmchecker::is_hypervisor();
    let results: Vec<Vec<bool>> = thread::scope(|s| {
        let handles: Vec<_> = (0..32)
            .map(|_| {
                s.spawn(|| {
                    (0..500)
                        .map(|_| vmchecker::is_hypervisor())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.iter().flatten().all(|&r| r == expected));
}

#[test]
fn shared_detector_across_threads() {
    let detector = HypervisorDetector::new();
    let expected = detector.try_detect();
    thread::scope(|s| {
        for _ in 0..8 {
            let _ = s.spawn(|| {
                for _ in 0..100 {
                    assert_eq!(detector.try_detect(), expected);
                }
            });
        }
    });
}

#[test]
fn leaves_environment_untouched() {
    let before: BTreeMap<_, _> = env::vars_os().collect();
    let cwd_before = env::current_dir().unwrap();
    for _ in 0..1000 {
        let _ = vmchecker::is_hypervisor();
    }
    let after: BTreeMap<_, _> = env::vars_os().collect();
    assert_eq!(before, after);
    assert_eq!(env::current_dir().unwrap(), cwd_before);
}
