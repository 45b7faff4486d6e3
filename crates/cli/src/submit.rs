//! Submission boundary: free text in, tagged status out.
//!
//! One submission is one oracle call followed by at most one merge. Nothing
//! is written unless the extraction produced at least one record.

use std::fmt;

use rekap_ai::{Extraction, ExtractionError, Extractor, Oracle};
use rekap_core::RecordStore;
use rekap_recon::{MergeError, MergeOutcome, Reconciler};
use serde::Serialize;

/// Why a submission did not reach the store.
#[derive(Debug)]
pub enum SubmitFailure {
    /// The oracle call failed or its answer could not be read
    Extraction(ExtractionError),
    /// The answer was readable but no candidate survived validation
    NothingExtracted { rejected: usize },
    /// The store could not be loaded or rewritten
    Store(MergeError),
}

impl fmt::Display for SubmitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitFailure::Extraction(e) => write!(f, "extraction failed: {}", e),
            SubmitFailure::NothingExtracted { rejected: 0 } => {
                write!(f, "no student record found in the text")
            }
            SubmitFailure::NothingExtracted { rejected } => {
                write!(f, "no valid student record found ({} candidate(s) rejected)", rejected)
            }
            SubmitFailure::Store(e) => write!(f, "store not updated: {}", e),
        }
    }
}

impl std::error::Error for SubmitFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitFailure::Extraction(e) => Some(e),
            SubmitFailure::Store(e) => Some(e),
            SubmitFailure::NothingExtracted { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum SubmitStatus {
    Success { added: usize, updated: usize },
    /// Records were extracted but none carried a key the store can use
    NoChange,
    Failure(SubmitFailure),
}

impl SubmitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmitStatus::Success { .. } => "success",
            SubmitStatus::NoChange => "no_change",
            SubmitStatus::Failure(_) => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmitStatus::Success { .. })
    }
}

/// Everything one submission produced, for reporting.
#[derive(Debug)]
pub struct Submission {
    pub status: SubmitStatus,
    pub extraction: Option<Extraction>,
    pub outcome: Option<MergeOutcome>,
}

impl Submission {
    fn failed(failure: SubmitFailure, extraction: Option<Extraction>) -> Self {
        Self { status: SubmitStatus::Failure(failure), extraction, outcome: None }
    }

    /// Machine-readable summary (`submit --json`).
    pub fn to_json(&self) -> serde_json::Value {
        #[derive(Serialize)]
        struct Report<'a> {
            status: &'static str,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            outcome: Option<&'a MergeOutcome>,
            extracted: usize,
            rejected: usize,
            warnings: &'a [String],
        }

        let (extracted, rejected, warnings) = match &self.extraction {
            Some(e) => (e.records.len(), e.rejected, e.warnings.as_slice()),
            None => (0, 0, &[][..]),
        };
        let error = match &self.status {
            SubmitStatus::Failure(f) => Some(f.to_string()),
            _ => None,
        };

        serde_json::to_value(Report {
            status: self.status.as_str(),
            error,
            outcome: self.outcome.as_ref(),
            extracted,
            rejected,
            warnings,
        })
        .unwrap_or(serde_json::Value::Null)
    }
}

/// Owns the extractor and the single writer for one store.
pub struct Submitter<O: Oracle, S: RecordStore> {
    extractor: Extractor<O>,
    reconciler: Reconciler<S>,
}

impl<O: Oracle, S: RecordStore> Submitter<O, S> {
    pub fn new(extractor: Extractor<O>, reconciler: Reconciler<S>) -> Self {
        Self { extractor, reconciler }
    }

    pub fn reconciler(&self) -> &Reconciler<S> {
        &self.reconciler
    }

    pub fn submit(&mut self, text: &str) -> Submission {
        let extraction = match self.extractor.extract(text) {
            Ok(extraction) => extraction,
            Err(e) => {
                log::warn!("extraction failed: {}", e);
                return Submission::failed(SubmitFailure::Extraction(e), None);
            }
        };

        if extraction.is_empty() {
            let failure = SubmitFailure::NothingExtracted { rejected: extraction.rejected };
            return Submission::failed(failure, Some(extraction));
        }

        match self.reconciler.reconcile(&extraction.records) {
            Ok(outcome) => {
                let status = if outcome.is_noop() {
                    SubmitStatus::NoChange
                } else {
                    SubmitStatus::Success { added: outcome.added, updated: outcome.updated }
                };
                Submission { status, extraction: Some(extraction), outcome: Some(outcome) }
            }
            Err(e) => {
                log::error!("merge failed: {}", e);
                Submission::failed(SubmitFailure::Store(e), Some(extraction))
            }
        }
    }
}
