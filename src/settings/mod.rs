//! File-plus-environment configuration and the command line that selects the file.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
