//! Typed extraction of token balances from raw user state records.
//!
//! Records in the dump are heterogeneous, so every shape check yields an
//! absent result rather than an error: a record that does not look like
//! `[address, {"b": [[token_id, {"t": total}], ...]}]` contributes nothing.

use super::streaming_state::UserStateCallback;
use super::SnapshotError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};

/// Spot token id of HYPE
pub const DEFAULT_TOKEN_ID: u64 = 150;

/// Address and its balance, as written to the balances file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub address: String,
    /// Original textual form of the total, never reformatted
    pub balance: String,
}

impl AddressBalance {
    pub fn new(address: impl Into<String>, balance: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: balance.into(),
        }
    }
}

/// What to do when an address holds more than one entry for the token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    #[default]
    First,
    Last,
    Error,
}

impl Display for DuplicatePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicatePolicy::First => write!(f, "first"),
            DuplicatePolicy::Last => write!(f, "last"),
            DuplicatePolicy::Error => write!(f, "error"),
        }
    }
}

/// Borrowed view of a well-shaped user state record
#[derive(Debug, Clone, Copy)]
pub struct UserState<'a> {
    pub address: &'a str,
    balances: &'a [Value],
}

impl<'a> UserState<'a> {
    /// Validate `[address, {"b": [...]}, ...]`
    pub fn from_record(record: &'a Value) -> Option<Self> {
        let fields = record.as_array()?;
        if fields.len() < 2 {
            return None;
        }

        let address = fields[0].as_str()?;
        let balances = fields[1].as_object()?.get("b")?.as_array()?;

        Some(Self {
            address,
            balances: balances.as_slice(),
        })
    }

    /// Totals of every `[token_id, {"t": ...}]` entry, stringified, in order
    pub fn token_totals(&self, token_id: u64) -> impl Iterator<Item = String> + 'a {
        let balances = self.balances;
        balances.iter().filter_map(move |entry| {
            let entry = entry.as_array()?;
            if entry.len() < 2 || !is_token(&entry[0], token_id) {
                return None;
            }
            entry[1].as_object().and_then(total_of)
        })
    }
}

fn is_token(value: &Value, token_id: u64) -> bool {
    match value {
        Value::Number(n) => n.as_u64() == Some(token_id) || n.as_f64() == Some(token_id as f64),
        _ => false,
    }
}

fn total_of(detail: &Map<String, Value>) -> Option<String> {
    detail.get("t").map(|total| match total {
        Value::String(s) => s.clone(),
        // Numbers keep their source text
        other => other.to_string(),
    })
}

/// Extract the first balance for `token_id` from a raw user state record
pub fn extract_balance(record: &Value, token_id: u64) -> Option<AddressBalance> {
    let state = UserState::from_record(record)?;
    let total = state.token_totals(token_id).next()?;
    Some(AddressBalance::new(state.address, total))
}

/// Extraction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// User state records seen
    pub records: u64,
    /// Records that yielded a balance
    pub emitted: u64,
    /// Records with an unexpected shape
    pub malformed: u64,
    /// Well-shaped records with no qualifying token entry
    pub without_token: u64,
}

/// Streaming consumer collecting one balance per qualifying address
#[derive(Debug)]
pub struct BalanceExtractor {
    token_id: u64,
    policy: DuplicatePolicy,
    balances: Vec<AddressBalance>,
    stats: ExtractStats,
}

impl BalanceExtractor {
    pub fn new(token_id: u64, policy: DuplicatePolicy) -> Self {
        Self {
            token_id,
            policy,
            balances: Vec::new(),
            stats: ExtractStats::default(),
        }
    }

    pub fn stats(&self) -> ExtractStats {
        self.stats
    }

    pub fn balances(&self) -> &[AddressBalance] {
        &self.balances
    }

    pub fn into_balances(self) -> Vec<AddressBalance> {
        self.balances
    }

    fn select(&self, state: &UserState<'_>) -> Result<Option<String>, SnapshotError> {
        let mut totals = state.token_totals(self.token_id);
        let Some(first) = totals.next() else {
            return Ok(None);
        };

        let rest: Vec<String> = totals.collect();
        if rest.is_empty() {
            return Ok(Some(first));
        }

        match self.policy {
            DuplicatePolicy::First => {
                warn!(
                    "Address {} has {} entries for token {}, keeping the first",
                    state.address,
                    rest.len() + 1,
                    self.token_id
                );
                Ok(Some(first))
            }
            DuplicatePolicy::Last => {
                warn!(
                    "Address {} has {} entries for token {}, keeping the last",
                    state.address,
                    rest.len() + 1,
                    self.token_id
                );
                Ok(rest.into_iter().last())
            }
            DuplicatePolicy::Error => Err(SnapshotError::DuplicateEntry {
                address: state.address.to_string(),
                token_id: self.token_id,
            }),
        }
    }
}

impl UserStateCallback for BalanceExtractor {
    fn on_user_state(&mut self, record: Value) -> Result<()> {
        self.stats.records += 1;

        let Some(state) = UserState::from_record(&record) else {
            debug!("Skipping malformed user state #{}", self.stats.records);
            self.stats.malformed += 1;
            return Ok(());
        };

        match self.select(&state)? {
            Some(balance) => {
                self.balances.push(AddressBalance::new(state.address, balance));
                self.stats.emitted += 1;
            }
            None => self.stats.without_token += 1,
        }

        Ok(())
    }
}
