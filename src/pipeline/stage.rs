use crate::pipeline::CandidateRecord;
use async_trait::async_trait;
use std::fmt;

/// Stage priorities; lower runs first
pub mod priority {
    pub const TEXT_EXTRACTION: u32 = 200;
    pub const COUNTRY_EXTRACTION: u32 = 300;
    pub const MANDATORY_FIELDS: u32 = 400;
    pub const DEDUPLICATION: u32 = 500;
    pub const PERSISTENCE: u32 = 600;
    pub const EXPORT: u32 = 800;
}

/// Why a record left the pipeline without being committed
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DropReason {
    TextExtractionFailed,
    CountryExtractionFailed,
    MissingField(&'static str),
    Duplicate,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextExtractionFailed => f.write_str("text-extraction-failed"),
            Self::CountryExtractionFailed => f.write_str("country-extraction-failed"),
            Self::MissingField(name) => write!(f, "missing-field:{}", name),
            Self::Duplicate => f.write_str("duplicate"),
        }
    }
}

/// Result of applying one stage to a record
///
/// After `Drop` or `Fatal` no later stage runs for that record.
#[derive(Debug)]
pub enum Outcome {
    Continue(CandidateRecord),
    Drop(DropReason),
    Fatal(String),
}

impl Outcome {
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// One ordered step of the item pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &'static str;

    /// Constant position of the stage; see [`priority`]
    fn priority(&self) -> u32;

    /// Mutates, drops or fatally rejects a record
    async fn apply(&self, record: CandidateRecord) -> Outcome;
}
