//! Small parsing and formatting helpers shared by the CLI and config layers

pub mod duration;

pub use duration::{format_duration, parse_duration, parse_run_duration};
