//! Shared test utilities and fixtures
//!
//! Every fixture gets its own temporary proof directory. Separate
//! `ProofService` handles opened on the same directory stand in for separate
//! processes.

#![allow(dead_code)]

use std::path::Path;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tribunal_core::{ManualClock, NewNode, NodeType, ProofService};

/// Config that skips fsync; durability is not under test here.
pub const FAST_CONFIG: &str = "[ledger]\nsync = \"skip_sync\"\nmax_append_attempts = 256\n";

pub fn start_instant() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-05-04T09:00:00Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

pub struct Fixture {
    pub dir: TempDir,
    pub clock: ManualClock,
    pub service: ProofService<ManualClock>,
}

impl Fixture {
    /// Another handle on the same proof directory, sharing the clock.
    pub fn reopen(&self) -> ProofService<ManualClock> {
        ProofService::open(self.dir.path())
            .expect("reopen proof")
            .with_clock(self.clock.clone())
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub fn write_fast_config(dir: &Path) {
    std::fs::write(dir.join("tribunal.toml"), FAST_CONFIG).expect("write config");
}

/// An empty proof directory with a manual clock.
pub fn fixture() -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    write_fast_config(dir.path());
    let clock = ManualClock::new(start_instant());
    let service = ProofService::create(dir.path())
        .expect("create proof")
        .with_clock(clock.clone());
    Fixture {
        dir,
        clock,
        service,
    }
}

/// A proof whose root `1` was initialized by alice.
pub fn initialized() -> Fixture {
    let fixture = fixture();
    fixture
        .service
        .init("For every n, n + 0 = n", "alice")
        .expect("init proof");
    fixture
}

pub fn step<'a>(id: &'a str, author: &'a str) -> NewNode<'a> {
    NewNode {
        id,
        node_type: NodeType::Claim,
        content: "by induction on n",
        inference: "induction",
        author,
    }
}
