use super::Parser;

#[derive(Parser, Debug)]
#[command(name = "turnstile", version, about = "Session and token service")]
pub struct Cli {
    /// Path to a TOML settings file
    #[arg(long)]
    pub settings: Option<String>,
}
