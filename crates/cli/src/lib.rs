//! Library half of the `rekap` binary: the submission boundary and the
//! exit-code contract, kept out of `main.rs` so they can be tested directly.

pub mod exit_codes;
pub mod submit;

pub use submit::{Submission, SubmitFailure, SubmitStatus, Submitter};
