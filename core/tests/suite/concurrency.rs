//! Racing writers. Each thread opens its own service handle on the shared
//! directory, the way separate prover processes would.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tribunal_core::{ConflictError, ProofService, Seq, ServiceError};

use crate::common::{fixture, initialized, step};

#[test]
fn racing_claims_have_exactly_one_winner() {
    for _round in 0..5 {
        let fx = initialized();
        let provers = 4;
        let barrier = Arc::new(Barrier::new(provers));

        let handles: Vec<_> = (0..provers)
            .map(|i| {
                let dir = fx.path().to_path_buf();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let service = ProofService::open(dir).unwrap();
                    let owner = format!("prover-{i}");
                    barrier.wait();
                    (owner.clone(), service.claim("1", &owner, Duration::from_secs(300)))
                })
            })
            .collect();

        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners: Vec<&String> = outcomes
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(owner, _)| owner)
            .collect();
        assert_eq!(winners.len(), 1, "{outcomes:?}");
        let winner = winners[0];

        for (owner, result) in &outcomes {
            if owner == winner {
                continue;
            }
            match result {
                Err(ServiceError::Conflict(ConflictError::NodeClaimed { owner, .. })) => {
                    assert_eq!(owner, winner);
                }
                other => panic!("loser saw {other:?}"),
            }
        }

        let root = fx.reopen().node("1").unwrap();
        assert_eq!(root.owner(), Some(winner.as_str()));
        // One init plus one successful claim.
        assert_eq!(fx.service.state().unwrap().last_seq(), Some(Seq::new(2)));
    }
}

#[test]
fn concurrent_writers_keep_the_ledger_gapless() {
    let fx = initialized();
    let writers = 4;
    let per_writer = 10;
    let barrier = Arc::new(Barrier::new(writers));

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let dir = fx.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let service = ProofService::open(dir).unwrap();
                barrier.wait();
                (0..per_writer)
                    .map(|i| {
                        service
                            .add_definition(&format!("term-{w}-{i}"), "content")
                            .unwrap()
                            .seq
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut seqs: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .map(Seq::value)
        .collect();
    seqs.sort_unstable();
    let expected: Vec<u64> = (2..=(1 + writers * per_writer) as u64).collect();
    assert_eq!(seqs, expected);

    let state = fx.service.state().unwrap();
    assert_eq!(state.definitions().len(), writers * per_writer);
    assert_eq!(state.stats().skipped(), 0);
}

#[test]
fn racing_child_creation_lands_once() {
    let fx = initialized();
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = ["alice", "bob"]
        .into_iter()
        .map(|author| {
            let dir = fx.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let service = ProofService::open(dir).unwrap();
                barrier.wait();
                service.create_node(step("1.1", author))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(
        r,
        Err(ServiceError::Conflict(ConflictError::NodeExists { .. }))
    )));
    assert_eq!(fx.service.list_nodes().unwrap().len(), 2);
}

#[test]
fn contention_is_reported_when_attempts_run_out() {
    let fx = fixture();
    std::fs::write(
        fx.path().join("tribunal.toml"),
        "[ledger]\nsync = \"skip_sync\"\nmax_append_attempts = 1\n",
    )
    .unwrap();
    let service = ProofService::open(fx.path()).unwrap();
    service.init("P", "alice").unwrap();

    // Hammer the ledger from other handles while a single-attempt writer
    // tries to land. It either wins on its only attempt or reports contention.
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let noise: Vec<_> = (0..3)
        .map(|w| {
            let dir = fx.path().to_path_buf();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let service = ProofService::open(dir).unwrap();
                let mut i = 0;
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let _ = service.add_definition(&format!("noise-{w}-{i}"), "x");
                    i += 1;
                }
            })
        })
        .collect();

    for i in 0..20 {
        match service.add_definition(&format!("mine-{i}"), "y") {
            Ok(_) | Err(ServiceError::Contention { attempts: 1 }) => {}
            Err(other) => panic!("unexpected {other:?}"),
        }
    }
    stop.store(true, std::sync::atomic::Ordering::Relaxed);
    for handle in noise {
        handle.join().unwrap();
    }
    assert_eq!(service.state().unwrap().stats().skipped(), 0);
}
