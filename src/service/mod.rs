//! Orchestrator service modules
//!
//! This module contains the submission state machine, execution tracking,
//! retry policy and the top-level orchestrator.

pub mod orchestrator;
pub mod retry;
pub mod submission;
pub mod tracker;

// Re-export for convenience
pub use orchestrator::{AccountView, Orchestrator, OrchestratorSettings, TransferRequest};
pub use retry::RetryPolicy;
pub use submission::{ExecutionMode, SignedExecution, Submission, SubmissionState};
pub use tracker::{ExecutionOutcome, ExecutionReport, ExecutionTracker};
