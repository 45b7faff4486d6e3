//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                |
//! |---------|------------|--------------------------------------------|
//! | 0       | Universal  | Success (including "nothing to change")    |
//! | 1       | Universal  | General error (unspecified)                |
//! | 2       | Universal  | CLI usage error (bad args, missing input)  |
//! | 3-9     | submit     | Extraction and store failures              |
//! | 10-19   | ai         | AI provider/keychain codes                 |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use rekap_ai::{ExtractionError, OracleError};
use rekap_recon::MergeError;

use crate::submit::SubmitFailure;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, empty input text.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Submit (3-9)
// =============================================================================

/// The model answered but no usable record survived validation.
pub const EXIT_NOTHING_EXTRACTED: u8 = 3;

/// The model answer was not JSON or had an unsupported shape.
pub const EXIT_EXTRACT_PARSE: u8 = 4;

/// The store file exists but is not a readable table with an id column.
pub const EXIT_STORE_CORRUPT: u8 = 5;

/// The store could not be read or written (permissions, disk full).
pub const EXIT_STORE_IO: u8 = 6;

// =============================================================================
// AI (10-19)
// =============================================================================

/// AI disabled (provider=none).
pub const EXIT_AI_DISABLED: u8 = 10;

/// AI provider configured but API key missing.
pub const EXIT_AI_MISSING_KEY: u8 = 11;

/// Keychain error (cannot read/write credentials).
pub const EXIT_AI_KEYCHAIN_ERR: u8 = 12;

/// Provider unreachable or timed out.
pub const EXIT_AI_UNREACHABLE: u8 = 13;

/// Provider answered with an error status or an unreadable envelope.
pub const EXIT_AI_API_ERROR: u8 = 14;

// =============================================================================
// Error mapping
// =============================================================================

pub fn oracle_exit_code(err: &OracleError) -> u8 {
    match err {
        OracleError::NotConfigured(_) => EXIT_AI_DISABLED,
        OracleError::MissingKey => EXIT_AI_MISSING_KEY,
        OracleError::Timeout(_) | OracleError::NetworkError(_) => EXIT_AI_UNREACHABLE,
        OracleError::ApiError { .. } | OracleError::InvalidResponse(_) => EXIT_AI_API_ERROR,
    }
}

pub fn extraction_exit_code(err: &ExtractionError) -> u8 {
    match err {
        ExtractionError::EmptyInput => EXIT_USAGE,
        ExtractionError::Oracle(e) => oracle_exit_code(e),
        ExtractionError::Parse(_) | ExtractionError::UnrecognizedShape(_) => EXIT_EXTRACT_PARSE,
    }
}

pub fn merge_exit_code(err: &MergeError) -> u8 {
    if err.is_corrupt() {
        EXIT_STORE_CORRUPT
    } else {
        EXIT_STORE_IO
    }
}

pub fn submit_exit_code(failure: &SubmitFailure) -> u8 {
    match failure {
        SubmitFailure::Extraction(e) => extraction_exit_code(e),
        SubmitFailure::NothingExtracted { .. } => EXIT_NOTHING_EXTRACTED,
        SubmitFailure::Store(e) => merge_exit_code(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekap_core::StoreError;
    use std::time::Duration;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_NOTHING_EXTRACTED,
            EXIT_EXTRACT_PARSE,
            EXIT_STORE_CORRUPT,
            EXIT_STORE_IO,
            EXIT_AI_DISABLED,
            EXIT_AI_MISSING_KEY,
            EXIT_AI_KEYCHAIN_ERR,
            EXIT_AI_UNREACHABLE,
            EXIT_AI_API_ERROR,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn test_failure_mapping() {
        let corrupt = SubmitFailure::Store(MergeError::Load(StoreError::Corrupt {
            location: "data_akademik.csv".to_string(),
            reason: "no id column".to_string(),
        }));
        assert_eq!(submit_exit_code(&corrupt), EXIT_STORE_CORRUPT);

        let io = SubmitFailure::Store(MergeError::Save(StoreError::Io("disk full".to_string())));
        assert_eq!(submit_exit_code(&io), EXIT_STORE_IO);

        let timeout = SubmitFailure::Extraction(ExtractionError::Oracle(OracleError::Timeout(Duration::from_secs(120))));
        assert_eq!(submit_exit_code(&timeout), EXIT_AI_UNREACHABLE);

        let nothing = SubmitFailure::NothingExtracted { rejected: 2 };
        assert_eq!(submit_exit_code(&nothing), EXIT_NOTHING_EXTRACTED);
    }
}
