//! Item pipeline
//!
//! Every candidate record produced by the item extractor runs through an
//! ordered list of [`Stage`]s. The standard order is:
//!
//! 1. text extraction (200)
//! 2. country extraction (300)
//! 3. mandatory field validation (400)
//! 4. deduplication (500)
//! 5. persistence (600)
//! 6. export (800)

mod enrichment;
mod executor;
mod record;
mod sinks;
mod stage;
mod validation;

pub use enrichment::{CountryExtraction, TextExtraction};
pub use executor::{Collaborators, PipelineExecutor};
pub use record::CandidateRecord;
pub use sinks::{Export, Persistence};
pub use stage::{priority, DropReason, Outcome, Stage};
pub use validation::{Deduplication, MandatoryFieldValidation, SeenSet, MANDATORY_FIELDS};
