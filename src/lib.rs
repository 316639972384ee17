pub mod config;
pub mod errors;
pub mod extraction;
pub mod graph;
pub mod project;
pub mod resolution;
pub mod sync;
pub mod types;
pub mod watch;
