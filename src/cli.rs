use clap::Parser;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct ArgParser {
    /// Path to the settings file (TOML or JSON). Created with defaults if missing.
    #[arg(long, default_value_t = String::from("modbus-sim.settings"))]
    pub config: String,

    /// Switch on verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
