//! # Claims Core
//!
//! Grouping and merge engine for per-line healthcare claim records.
//!
//! Claim lines are pulled from a [`RecordSource`], filtered for completeness,
//! spilled to a `subjectID|json` staging file, externally sorted by subject,
//! and reduced in one forward pass into one [`MergedClaim`] per claim, ordered
//! by start date within each subject:
//!
//! ```text
//! RecordSource -> completeness -> spill -> ExternalSort -> GroupingReducer
//!                                                          -> ClaimMerger
//!                                                          -> order_by_start_date
//! ```
//!
//! Memory use is bounded by the sort chunk size and the largest single subject,
//! never by the total input.
//!
//! **No process concerns**: reading configuration from the environment, logging
//! setup and writing results belong to the binaries.

pub mod assemble;
pub mod completeness;
pub mod config;
pub mod constants;
mod error;
pub mod merge;
pub mod parser;
pub mod record;
pub mod reducer;
pub mod schema;
pub mod sort;
pub mod source;
pub mod spill;
pub mod staging;

pub use claims_types::{ClaimType, FieldValue, Scalar};
pub use config::CoreConfig;
pub use error::{ClaimsError, ClaimsResult};
pub use merge::{ClaimMerger, ScalarConflictPolicy};
pub use parser::{ClaimParser, MergeOutcome, MergeReport};
pub use record::{ClaimLine, MergedClaim, RawRecord};
pub use reducer::MergedClaims;
pub use schema::{SchemaLookup, SchemaRegistry};
pub use sort::{ChunkedMergeSort, ExternalSort, SortStrategy, UnixSort};
pub use source::{IterSource, JsonLinesQueue, RecordSource};
