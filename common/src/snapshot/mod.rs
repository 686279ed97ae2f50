// SPDX-License-Identifier: Apache-2.0

//! Exchange state dump parsing.
//!
//! This module provides:
//! - Streaming callback-based reader for the user states array (`streaming_state.rs`)
//! - Typed balance extraction from raw user state records (`extract.rs`)
//! - Error types (`error.rs`)

// Submodules
mod error;
pub mod extract;
pub mod streaming_state;

// Re-export error types
pub use error::SnapshotError;

// Re-export extraction APIs
pub use extract::{
    extract_balance, AddressBalance, BalanceExtractor, DuplicatePolicy, ExtractStats, UserState,
    DEFAULT_TOKEN_ID,
};

// Re-export streaming APIs
pub use streaming_state::{
    CollectingCallbacks, StreamSummary, StreamingStateParser, UserStateCallback,
    DEFAULT_USER_STATES_PATH,
};
