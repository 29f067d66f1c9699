/*!
 * Processor Subsystem
 * Event loop state machine and multi-process orchestration
 */

pub mod event_processor;
pub mod parallel;
pub mod types;

// Re-export public API
pub use event_processor::EventProcessor;
pub use parallel::{EventBridge, ParallelProcessor};
pub use types::{ProcessOutcome, ProcessSummary, ProcessorState, StopReason};
