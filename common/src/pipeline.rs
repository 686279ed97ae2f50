//! Balance snapshot pipeline: stream, extract, rank, write.

use crate::configuration::SnapshotConfig;
use crate::merkle::MerkleDistribution;
use crate::output::{read_balances, write_top_balances};
use crate::ranking::rank_balances;
use crate::snapshot::{BalanceExtractor, SnapshotError, StreamingStateParser};
use std::path::PathBuf;
use tracing::info;

/// Result of a completed balances run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    /// User state records streamed from the dump
    pub records: u64,
    /// Addresses holding a balance for the token
    pub qualifying: usize,
    /// Entries written after top-N truncation
    pub written: usize,
    pub output: PathBuf,
}

/// Result of a completed Merkle run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleSummary {
    pub leaves: usize,
    pub merkle_root: String,
}

/// Run all four stages. Nothing is written unless every stage succeeds.
pub fn run(config: &SnapshotConfig) -> Result<PipelineSummary, SnapshotError> {
    let parser = StreamingStateParser::new(&config.input_path)
        .with_key_path(&config.user_states_path);
    let mut extractor = BalanceExtractor::new(config.token_id, config.duplicate_entries);

    let streamed = parser.parse(&mut extractor).map_err(unwrap_callback_error)?;

    let stats = extractor.stats();
    info!(
        "Extracted {} balances for token {} ({} malformed records, {} without token)",
        stats.emitted, config.token_id, stats.malformed, stats.without_token
    );

    let ranked = rank_balances(extractor.into_balances())?;
    let written = write_top_balances(&ranked, config.top_n, &config.output_path)?;

    Ok(PipelineSummary {
        records: streamed.records,
        qualifying: ranked.len(),
        written,
        output: config.output_path.clone(),
    })
}

/// Build the Merkle distribution from the balances file named by `config`
pub fn build_merkle(config: &SnapshotConfig) -> Result<MerkleSummary, SnapshotError> {
    let balances = read_balances(&config.output_path)?;
    info!("Building merkle tree for {} addresses...", balances.len());

    let distribution = MerkleDistribution::build(&balances)?;
    distribution.write(&config.merkle.root_path, &config.merkle.proofs_path)?;

    Ok(MerkleSummary {
        leaves: distribution.proofs.len(),
        merkle_root: distribution.root.merkle_root,
    })
}

/// Errors raised by our own extractor travel through the callback; surface them directly
fn unwrap_callback_error(err: SnapshotError) -> SnapshotError {
    match err {
        SnapshotError::Callback(inner) => match inner.downcast::<SnapshotError>() {
            Ok(snapshot_error) => snapshot_error,
            Err(other) => SnapshotError::Callback(other),
        },
        other => other,
    }
}
