//! CLI command implementations

mod admin;
mod context;
mod handle;
mod style;

pub use admin::{run_attempts_clear, run_attempts_show, run_excluded_add, run_excluded_list};
pub use context::CommandContext;
pub use handle::{HandleOptions, run_handle};
pub use style::Stylize;
