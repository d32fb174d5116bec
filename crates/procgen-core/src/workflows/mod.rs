//! # Workflows Module
//!
//! High-level entry points that drive a complete procedure run.
//!
//! A workflow owns the run-scoped resources a procedure needs (the target
//! configuration, the worker pool and the shared engine state), runs the three
//! phases, and hands back the generated configuration together with any data the
//! nodes published.
//!
//! - **Generation Workflow** ([`generate`]) - builds or modifies a configuration
//!   from a procedure, optionally starting from a reference configuration.

pub mod generate;
