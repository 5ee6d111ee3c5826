use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Runs the full orchestrator loop: resume-or-full-load, then CDC.
    Run {
        #[arg(long, help = "Path to a .env file overlaid on the process environment")]
        env_file: Option<String>,
    },
    /// Prints the current checkpoint and full-load progress for this table pairing.
    Status {
        #[arg(long, help = "Path to a .env file overlaid on the process environment")]
        env_file: Option<String>,

        #[arg(long, help = "Print the status as JSON instead of a table")]
        json: bool,
    },
}
