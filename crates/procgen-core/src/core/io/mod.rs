//! Provides input/output functionality for procedure and coordinate files.
//!
//! This module contains the low-level building blocks used when reading and
//! writing data: a quote-aware line tokenizer shared by the procedure text
//! format, a trait-based interface for coordinate file formats with an XYZ
//! implementation, and CSV export for accumulated histograms.

pub mod histogram;
pub mod line_parser;
pub mod traits;
pub mod xyz;
