//! Filesystem rule loader with optional hot-reload via `notify` watcher.
//!
//! Each YAML file holds a `rules: [...]` document. Disabled rules are
//! dropped at load time; a file that fails to parse or validate is skipped
//! and reported without affecting other files.

mod core;
mod error;
mod watcher;


pub use self::core::{load_from_str, RuleLoad, RuleLoader};
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
