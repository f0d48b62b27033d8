//! Provenance reconciliation.

mod reconciler;

pub use reconciler::{reconcile, strip_soundtrack_suffix, Reconciled};
