//! Shared error handling for the waygraph workspace.

mod error;

pub use error::{Error, Result};
