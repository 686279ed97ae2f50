// SPDX-License-Identifier: Apache-2.0

//! Streaming state dump parser with callback interface.
//!
//! Exchange state dumps run to many gigabytes, nearly all of which is
//! irrelevant to the balance snapshot. This parser walks the JSON document
//! with serde's streaming deserializer, skipping every key that is not on
//! the configured path, and hands each element of the user states array to
//! a callback as soon as it has been read:
//!
//! ```text
//! {
//!   "exchange": {
//!     "spot_clearinghouse": {
//!       "user_states": [
//!         ["0xabc...", { "b": [[150, { "t": "100.5" }], ...] }],
//!         ...
//!       ]
//!     }
//!   }
//! }
//! ```
//!
//! Memory use is bounded by the largest single user state record.

use super::SnapshotError;
use anyhow::Result;
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::Value;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Key path of the user states array in an exchange state dump
pub const DEFAULT_USER_STATES_PATH: &str = "exchange.spot_clearinghouse.user_states";

const READ_BUFFER_SIZE: usize = 16 * 1024 * 1024;
const PROGRESS_LOG_INTERVAL: u64 = 100_000;

// -----------------------------------------------------------------------------
// Callback Traits
// -----------------------------------------------------------------------------

/// Callback invoked for each element of the user states array (streaming)
pub trait UserStateCallback {
    /// Called once per user state record, in document order
    fn on_user_state(&mut self, record: Value) -> Result<()>;
}

/// Outcome of a completed stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    /// Number of user state records handed to the callback
    pub records: u64,
}

// -----------------------------------------------------------------------------
// Streaming Parser
// -----------------------------------------------------------------------------

/// Streaming state dump parser with callback interface
pub struct StreamingStateParser {
    file_path: PathBuf,
    key_path: Vec<String>,
}

impl StreamingStateParser {
    /// Create a new streaming parser for the given state dump
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            key_path: split_key_path(DEFAULT_USER_STATES_PATH),
        }
    }

    /// Override the dotted key path of the user states array
    pub fn with_key_path(mut self, key_path: &str) -> Self {
        self.key_path = split_key_path(key_path);
        self
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Parse the state dump and invoke the callback for every user state.
    ///
    /// The file handle lives only for the duration of this call. The whole
    /// document is read to the end, so a dump that is truncated or malformed
    /// after the user states array still fails.
    pub fn parse<C: UserStateCallback>(
        &self,
        callbacks: &mut C,
    ) -> Result<StreamSummary, SnapshotError> {
        let file =
            File::open(&self.file_path).map_err(|e| SnapshotError::io(&self.file_path, e))?;
        let reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
        let mut deserializer = serde_json::Deserializer::from_reader(reader);

        info!(
            "Streaming '{}' from {}",
            self.key_path.join("."),
            self.file_path.display()
        );

        let mut stream = UserStateStream {
            callbacks,
            records: 0,
            failure: None,
        };

        let seed = PathSeed {
            remaining: &self.key_path,
            stream: &mut stream,
        };
        let found = match seed.deserialize(&mut deserializer) {
            Ok(found) => found,
            Err(e) => {
                // A callback failure is smuggled through serde as a custom error
                if let Some(failure) = stream.failure.take() {
                    return Err(SnapshotError::Callback(failure));
                }
                return Err(SnapshotError::from_json(&self.file_path, e));
            }
        };

        if !found {
            return Err(SnapshotError::MissingPath {
                path: self.file_path.clone(),
                key_path: self.key_path.join("."),
            });
        }

        deserializer.end().map_err(|e| SnapshotError::from_json(&self.file_path, e))?;

        info!("Streamed {} user states", stream.records);
        Ok(StreamSummary {
            records: stream.records,
        })
    }
}

fn split_key_path(key_path: &str) -> Vec<String> {
    key_path.split('.').filter(|k| !k.is_empty()).map(str::to_string).collect()
}

// -----------------------------------------------------------------------------
// Visitors
// -----------------------------------------------------------------------------

struct UserStateStream<'c, C> {
    callbacks: &'c mut C,
    records: u64,
    failure: Option<anyhow::Error>,
}

/// Descends one key of the path; resolves to whether the array was reached
struct PathSeed<'s, 'p, 'c, C> {
    remaining: &'p [String],
    stream: &'s mut UserStateStream<'c, C>,
}

impl<'de, C: UserStateCallback> DeserializeSeed<'de> for PathSeed<'_, '_, '_, C> {
    type Value = bool;

    fn deserialize<D>(self, deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match self.remaining.split_first() {
            None => deserializer
                .deserialize_seq(RecordsVisitor {
                    stream: self.stream,
                })
                .map(|()| true),
            Some((key, rest)) => deserializer.deserialize_map(PathVisitor {
                key,
                rest,
                stream: self.stream,
            }),
        }
    }
}

struct PathVisitor<'s, 'p, 'c, C> {
    key: &'p str,
    rest: &'p [String],
    stream: &'s mut UserStateStream<'c, C>,
}

impl<'de, C: UserStateCallback> Visitor<'de> for PathVisitor<'_, '_, '_, C> {
    type Value = bool;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an object containing '{}'", self.key)
    }

    fn visit_map<A>(self, mut map: A) -> Result<bool, A::Error>
    where
        A: MapAccess<'de>,
    {
        let stream = self.stream;
        let mut found = false;

        while let Some(key) = map.next_key::<String>()? {
            if !found && key == self.key {
                found = map.next_value_seed(PathSeed {
                    remaining: self.rest,
                    stream: &mut *stream,
                })?;
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }

        Ok(found)
    }
}

struct RecordsVisitor<'s, 'c, C> {
    stream: &'s mut UserStateStream<'c, C>,
}

impl<'de, C: UserStateCallback> Visitor<'de> for RecordsVisitor<'_, '_, C> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an array of user states")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        let stream = self.stream;

        while let Some(record) = seq.next_element::<Value>()? {
            stream.records += 1;
            if stream.records % PROGRESS_LOG_INTERVAL == 0 {
                info!("Parsed {} user states...", stream.records);
            }

            if let Err(e) = stream.callbacks.on_user_state(record) {
                debug!("Callback failed at user state #{}", stream.records);
                stream.failure = Some(e);
                return Err(de::Error::custom("user state callback aborted the stream"));
            }
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Helper: Simple callback handler for testing
// -----------------------------------------------------------------------------

/// Simple callback handler that collects all records in memory (for testing)
#[derive(Debug, Default)]
pub struct CollectingCallbacks {
    pub records: Vec<Value>,
}

impl UserStateCallback for CollectingCallbacks {
    fn on_user_state(&mut self, record: Value) -> Result<()> {
        self.records.push(record);
        Ok(())
    }
}
