pub mod applier;
pub mod cdc;
pub mod error;
pub mod orchestrator;

pub use applier::RowApplier;
pub use cdc::CdcLoop;
pub use error::OrchestratorError;
pub use orchestrator::Orchestrator;
