//! # Core Models Module
//!
//! The simulation data that procedure nodes read and modify.
//!
//! ## Key Components
//!
//! - [`species`] - Molecular templates with reference geometry and named sites
//! - [`configuration`] - The target of a procedure: box, molecules, properties and potentials
//! - [`simbox`] - Periodic cell with minimum-image operations
//! - [`site`] - Site instances located on molecules of a configuration
//! - [`region`] - Voxelised subsets of the box used for placement and picking
//! - [`potentials`] - External potentials attached to a configuration
//! - [`histogram`] - Fixed-width histograms accumulated by analysis nodes
//! - [`data1d`] - Processed one-dimensional data derived from histograms
//! - [`elements`] - Element symbols and atomic masses
//! - [`ids`] - Arena keys for molecules

pub mod configuration;
pub mod data1d;
pub mod elements;
pub mod histogram;
pub mod ids;
pub mod potentials;
pub mod region;
pub mod simbox;
pub mod site;
pub mod species;
