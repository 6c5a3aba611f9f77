#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! End-to-end locality analysis.
//!
//! [`Analyzer`] walks each request through an explicit
//! [`WorkflowState`] machine: input validation, a concurrent rendezvous of
//! metric selection and location resolution, the geodata fetch, metric
//! computation, and the narrative summary. Every stage returns a
//! [`StageDelta`] that is merged into the draft [`AnalysisResult`]; any
//! terminal error collapses the run into an error-only result.
//!
//! [`AnalysisResult`]: locality_lens_analysis_models::AnalysisResult

pub mod config;
pub mod coordinator;
pub mod delta;
pub mod state;
pub mod summary;

pub use config::{AnalysisConfig, CONFIG_ENV, ConfigError, TimeoutConfig};
pub use coordinator::{AnalysisError, Analyzer};
pub use delta::StageDelta;
pub use state::{TRANSITIONS, WorkflowState};
pub use summary::fallback_summary;
