//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Per-order subscriber fan-out (spec.md §4.4) plus the replay producer that
// backfills a newly-registered subscriber with history (spec.md §4.5). Split
// across two files specifically so neither needs a mutable reference to the
// other: `Broadcaster` holds an `Arc<dyn RegistrationListener>`, and
// `ReplayProducer` holds an `Arc<Broadcaster>` — a one-way dependency graph
// wired up after both are constructed (spec.md §9 redesign flag).
//--------------------------------------------------------------------------------------------------

mod broadcaster;
mod replay;

pub use broadcaster::{Broadcaster, RegistrationListener};
pub use replay::ReplayProducer;
