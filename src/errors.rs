use crate::wal::WalError;
use thiserror::Error;

/// Fatal errors on the processing path.
///
/// There is deliberately no retry policy anywhere in the core: a durability
/// failure fails the in-flight command, and the recovery action is process
/// restart followed by full replay.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("durability log failure: {0}")]
    Wal(#[from] WalError),
}
