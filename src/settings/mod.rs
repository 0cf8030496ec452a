//! TOML settings loaded through `config`, with `VIDEOTUBE__*` environment
//! overrides.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
