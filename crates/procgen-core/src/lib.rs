//! # procgen
//!
//! A procedural node-graph engine for building, modifying and analysing molecular
//! simulation configurations.
//!
//! A procedure is a tree of typed nodes. Some nodes own a nested branch that they
//! run repeatedly (once per selected site, for instance), and nodes share named
//! parameters and refer to each other through block-structured scopes. Procedures
//! are read from and written to a line-oriented text format or a structured TOML
//! form.
//!
//! ## Layers
//!
//! - **[`core`]: The Foundation.** The arithmetic expression language, the
//!   simulation data model (species, configurations, boxes, sites, regions,
//!   external potentials, histograms), the `CoreData` registry, and file I/O.
//!
//! - **[`engine`]: The Procedure Graph.** Node values and keyword stores, the node
//!   kinds, sequences and scope resolution, the prepare/execute/finalise driver,
//!   and serialisation.
//!
//! - **[`workflows`]: The Public API.** Runs a whole procedure against a
//!   configuration and returns the results.

pub mod core;
pub mod engine;
pub mod workflows;
