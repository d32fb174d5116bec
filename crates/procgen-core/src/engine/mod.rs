//! # Engine Module
//!
//! The procedure graph and its interpreter.
//!
//! ## Overview
//!
//! A [`procedure::Procedure`] holds every node and sequence of one graph in
//! arenas. Nodes carry a typed keyword store, named parameters and, for looping
//! kinds, a branch sequence of further nodes. Names and parameters are resolved
//! through lexical scope: a query looks backwards through its own sequence, then
//! through the sequence of the branch's owner, and so on up to the root.
//!
//! ## Architecture
//!
//! - **Graph** ([`procedure`], [`sequence`], [`node`], [`scope`]) - arenas, node
//!   kinds and scope resolution
//! - **Values** ([`node_value`], [`keywords`]) - literal-or-expression fields and
//!   the validated keyword grammar of each node kind
//! - **Execution** ([`context`], [`pool`], [`store`], [`progress`]) - the
//!   three-phase driver's context, worker pool, published data and progress events
//! - **Persistence** ([`serialise`]) - text and TOML readers and writers
//! - **Error Handling** ([`error`]) - authoring and execution errors
//! - **Configuration** ([`config`]) - run settings for workflows

pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod keywords;
pub mod node;
pub mod node_value;
pub(crate) mod nodes;
pub mod pool;
pub mod procedure;
pub mod progress;
pub mod scope;
pub mod sequence;
pub mod serialise;
pub mod store;
