//! Storage module for Warden
//!
//! - `json`: JSON - settings and task definition files

mod json;

pub use json::{load_path, JsonStore};
