pub mod error;
pub mod preflight;
pub mod settings;

pub use error::ConfigError;
pub use preflight::{run as run_preflight, PreflightReport};
pub use settings::Config;
