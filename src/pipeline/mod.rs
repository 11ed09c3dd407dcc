pub mod import;
pub mod extraction;
pub mod structuring;
pub mod processor; // Synchronous verification orchestrator
pub mod service; // Async façade: concurrent sides, bounded recognition

pub use processor::{VerificationFailure, VerificationOrchestrator, VerificationOutcome};
pub use service::VerificationService;
