//! Utility modules for Metal.

pub mod config;
pub mod context;
pub mod diagnostic;
pub mod fs;
pub mod hash;
pub mod process;

pub use context::GlobalContext;
pub use process::{Cancellation, ProcessBuilder};
