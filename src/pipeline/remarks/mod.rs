//! Remark generation: match review rows to target rows, compose one prompt
//! per match and write the model's reply into the target's output column.

pub mod cancel;
pub mod error;
pub mod pool;
pub mod runner;
pub mod types;

pub use cancel::CancellationToken;
pub use error::{ItemError, RemarkError, ERROR_MARKER};
pub use pool::{run_bounded, PoolSummary};
pub use runner::RemarkPipeline;
pub use types::*;
