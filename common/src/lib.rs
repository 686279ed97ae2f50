// HYPE balance snapshot common library - main library exports

pub mod configuration;
pub mod merkle;
pub mod output;
pub mod pipeline;
pub mod ranking;
pub mod snapshot;

// Flattened re-exports
pub use self::configuration::{MerkleConfig, SnapshotConfig};
pub use self::pipeline::{build_merkle, run, MerkleSummary, PipelineSummary};
pub use self::snapshot::{AddressBalance, DuplicatePolicy, SnapshotError};
