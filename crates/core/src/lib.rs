//! `rekap-core`: shared record types and the store contract.
//!
//! No IO here: the CSV accessor lives in `rekap-io`, the merge in `rekap-recon`.

pub mod field;
pub mod policy;
pub mod record;
pub mod store;
pub mod table;

pub use field::Field;
pub use policy::{MergePolicy, ValidationMode};
pub use record::{canonical_id, format_score, parse_score, Record};
pub use store::{MemoryStore, RecordStore, StoreError};
pub use table::{Column, StoreTable};
