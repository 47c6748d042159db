//! Core research pipeline for Researcher.
//!
//! This crate ties together query planning, concurrent web search, result
//! aggregation, findings extraction, and answer synthesis into one
//! end-to-end run driven by [`pipeline::Orchestrator`].

pub mod aggregate;
pub mod analyst;
pub mod pipeline;
pub mod planner;
pub mod search;
pub mod validator;
pub mod writer;

#[cfg(test)]
mod testing;

pub use pipeline::{Orchestrator, PipelineSettings, ProgressReporter, SilentProgress};
