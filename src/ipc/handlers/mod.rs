pub mod answers;
pub mod core;
pub mod evaluations;
pub mod groups;
pub mod questions;
