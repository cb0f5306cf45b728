//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// The lifecycle-prefix reconciliation algorithm (spec.md §4.2) and its
// companion: the delayed-finalization timer for the conditionally-terminal
// `chinazes` status.
//--------------------------------------------------------------------------------------------------

mod finalization;
mod reconciler;

pub use finalization::FinalizationTimers;
pub use reconciler::{reconcile, ReconcileError};
