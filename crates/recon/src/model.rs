use serde::Serialize;

/// Counts from one merge.
///
/// `added` and `updated` come from key-set difference/intersection taken
/// before mutation. A matched key counts as updated even if nothing changed;
/// `unchanged` says how many of those rows came out identical.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub added: usize,
    pub updated: usize,
    /// Batch records without a usable id (lenient-mode name-only candidates).
    pub skipped: usize,
    pub unchanged: usize,
}

impl MergeOutcome {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.updated == 0
    }
}
