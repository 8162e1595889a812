pub mod add;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod list;
pub mod queue;
pub mod status;
pub mod sync;
pub mod watch;
