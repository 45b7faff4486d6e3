// AI integration
//
// The model only reads text and proposes records. Validation, merging and
// persistence stay deterministic and live outside this crate.

pub mod client;
pub mod extract;
pub mod normalize;

pub use client::{check_reachable, oracle_from_config, OllamaOracle, OpenAIOracle, Oracle, OracleError, OracleRequest};
pub use extract::{parse_response, Extraction, ExtractionError, Extractor, ResponseShape, SYSTEM_PROMPT};
pub use normalize::{Normalizer, Rejection};
