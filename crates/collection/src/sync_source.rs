//! The sync-source contract a collection consumes to populate its synced
//! baseline (spec.md §4.1 "Sync-source contract", §6 "Sync source").
//!
//! The core ships no concrete adapters — poll-based query adapters and CDC
//! feeds are explicitly out of scope (spec.md §1) — only the trait and the
//! `begin`/`write`/`commit`/`mark_ready`/`truncate` frame primitives a
//! `Collection` exposes to drive it.

use rivet_core::{Key, Row};

/// A single baseline write inside a sync frame.
#[derive(Clone, Debug)]
pub enum SyncWrite {
    Insert(Row),
    Update(Row),
    Delete(Key),
}

/// An external driver that writes a collection's synced baseline in atomic
/// frames. Implementations call back into the `Collection` they were
/// started with via `begin_frame`/`write`/`commit_frame`/`mark_ready`/
/// `truncate`.
///
/// The core's execution model is single-threaded and cooperative
/// (spec.md §5): `start` runs to completion or registers whatever
/// out-of-band notification mechanism the adapter needs, but never spawns
/// a thread of its own.
pub trait SyncSource {
    fn start(&mut self, sink: &mut dyn SyncSink);
}

/// The frame primitives a `SyncSource` implementation is handed.
///
/// Kept as a trait (rather than handing out `&mut Collection` directly) so
/// a sync source can be tested against a fake sink with no collection at
/// all.
pub trait SyncSink {
    fn begin(&mut self);
    fn write(&mut self, op: SyncWrite);
    fn commit(&mut self);
    fn mark_ready(&mut self);
    fn truncate(&mut self);
    fn fail(&mut self, message: String);
}
