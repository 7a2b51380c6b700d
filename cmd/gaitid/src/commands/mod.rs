//! CLI commands module.

mod config;
mod enroll;
mod gallery;
mod recognize;
mod stress;
mod util;

pub use config::ConfigCommand;
pub use enroll::EnrollCommand;
pub use gallery::{ListCommand, ShowCommand};
pub use recognize::MatchCommand;
pub use stress::StressCommand;

// Re-export utils for use in commands
pub(crate) use util::*;
