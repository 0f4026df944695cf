//! mdp-pipeline library interface
//!
//! Ingestion, normalisation and fusion of maritime feeds (AIS positions,
//! sea-state observations, port calls). The binary is a thin wrapper around
//! [`pipeline::Pipeline`] and [`scheduler::Scheduler`].

pub mod error;
pub mod fusion;
pub mod normalize;
pub mod pipeline;
pub mod scheduler;
pub mod services;
pub mod sink;
pub mod sources;
pub mod tables;
pub mod utils;

pub use crate::error::{PipelineError, PipelineResult};
pub use crate::pipeline::{FusionReport, NormalizedTables, Pipeline, TickReport};
pub use crate::scheduler::{Scheduler, SchedulerPlan};
pub use crate::sources::SourceKind;
