use super::Parser;

/// VideoTube session and admission service.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Path to a TOML settings file. Defaults to settings/dev.toml in debug
    /// builds and settings/release.toml in release builds.
    #[arg(long)]
    pub settings: Option<String>,
}
