pub mod data;
pub mod expression;
pub mod io;
pub mod models;
