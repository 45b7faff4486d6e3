//! `rekap-recon`: reconciliation of extracted batches into the record store.
//!
//! `merge` is pure: it receives a loaded table and a batch, mutates the table
//! and reports counts. `Reconciler` wraps it with one load and one save.

pub mod engine;
pub mod error;
pub mod model;

pub use engine::{merge, Reconciler};
pub use error::MergeError;
pub use model::MergeOutcome;
