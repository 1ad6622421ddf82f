//! CLI utilities for sproochmaschinn.
//!
//! Context-based configuration and result output shared by the command-line
//! tools.

pub mod config;
pub mod output;

pub use config::{Config, Context, load_config};
pub use output::{Output, OutputFormat, print_verbose};
