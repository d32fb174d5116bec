//! # Expression Engine
//!
//! A small arithmetic language used wherever a node field may be given either as a
//! constant or as a formula over in-scope parameters (e.g. `"nMolecules*2"`).
//!
//! ## Overview
//!
//! - [`tokenizer`] splits the source into tokens (integer and real literals,
//!   identifiers, operators).
//! - [`parser`] is a Pratt parser producing an [`ast::ExpressionNode`] tree.
//! - [`expression::Expression`] owns the tree, its source text and any local
//!   variables, and evaluates against a [`variable::VariableSource`].
//!
//! ## Semantics
//!
//! - Integer operands produce integer results (`7/2 == 3`); any real operand promotes.
//! - Comparison and logical operators yield `1` or `0`; a value is true when `> 0`.
//! - Trigonometric functions work in degrees.
//! - Parse-time and evaluation-time failures are distinct [`error::ExpressionError`] variants.

pub mod ast;
pub mod error;
pub mod expression;
pub mod functions;
pub mod parser;
pub mod tokenizer;
pub mod value;
pub mod variable;

pub use error::ExpressionError;
pub use expression::Expression;
pub use value::ExpressionValue;
pub use variable::{ExpressionVariable, VariableSource};
