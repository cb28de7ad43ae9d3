//! Built-in tool implementations for Loopwright.
//!
//! Tools give the model the ability to act on one workspace directory:
//! read, write and edit files, run shell commands, search, and list
//! directories. Every path-taking tool is confined to the workspace root.

pub mod context;
pub mod executor;
pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod glob_search;
pub mod grep;
pub mod list_dir;
pub mod shell;

pub use context::{ToolContext, ToolLimits};
pub use executor::ToolExecutor;
pub use list_dir::EMPTY_DIRECTORY;
