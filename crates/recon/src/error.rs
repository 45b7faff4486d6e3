use std::fmt;

use rekap_core::StoreError;

#[derive(Debug)]
pub enum MergeError {
    /// Existing store could not be read. Nothing was written.
    Load(StoreError),
    /// Merged table could not be written. The previous file is intact.
    Save(StoreError),
}

impl MergeError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            Self::Load(e) | Self::Save(e) => e,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Load(StoreError::Corrupt { .. }))
    }
}

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(e) => write!(f, "cannot load store: {e}"),
            Self::Save(e) => write!(f, "cannot save store: {e}"),
        }
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.store_error())
    }
}
