//! Pipeline orchestration.
//!
//! ```text
//! STAGE 1:  Ingest (profile the raw batch)
//! STAGE 2:  Raw Validation (HARD gate)
//! STAGE 3:  Cleaning
//! STAGE 4:  Processed Validation (SOFT gate)
//! STAGE 5:  KPI Computation
//! STAGE 6:  Fleet Analysis
//! STAGE 7:  Anomaly Detection
//! STAGE 8:  Enrichment (reasoning / debate / planning)
//! STAGE 9:  Narrative + Quality Gate (bounded retry)
//! STAGE 10: Decision Synthesis
//! STAGE 11: Report Assembly + Final Gate (bounded retry)
//! ```

pub mod context;
mod coordinator;
pub mod retry;

pub use coordinator::{PipelineCoordinator, PipelineOptions, PipelineStats};
