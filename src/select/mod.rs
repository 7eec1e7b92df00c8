//! Declarative selection trees and their execution against the schema.

pub mod fetch;
pub mod library;
pub mod schema;
pub mod tree;
