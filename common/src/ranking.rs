//! Ranking of extracted balances by numeric value.
//!
//! Totals are kept as the strings they were read as; the parsed number is
//! only a sort key and is dropped once the order is fixed.

use crate::snapshot::{AddressBalance, SnapshotError};
use std::cmp::Ordering;

/// A balance decorated with its numeric sort key
#[derive(Debug, Clone, PartialEq)]
pub struct RankedBalance {
    pub key: f64,
    pub entry: AddressBalance,
}

impl RankedBalance {
    pub fn new(entry: AddressBalance) -> Result<Self, SnapshotError> {
        let key = parse_balance(&entry.balance).ok_or_else(|| SnapshotError::InvalidBalance {
            address: entry.address.clone(),
            value: entry.balance.clone(),
        })?;
        Ok(Self { key, entry })
    }

    fn descending(&self, other: &Self) -> Ordering {
        other.key.total_cmp(&self.key)
    }
}

/// Numeric interpretation of a balance string; `None` for text that is not
/// a number or is NaN. Values beyond `f64` range rank as infinities.
pub fn parse_balance(value: &str) -> Option<f64> {
    let parsed = value.trim().parse::<f64>().ok()?;
    if parsed.is_nan() {
        return None;
    }
    // Fold -0.0 into 0.0 so the two compare equal under total ordering
    Some(parsed + 0.0)
}

/// Sort balances by descending value, ties in input order.
///
/// Fails on the first unparsable balance; nothing is returned in that case.
pub fn rank_balances(balances: Vec<AddressBalance>) -> Result<Vec<AddressBalance>, SnapshotError> {
    let mut ranked =
        balances.into_iter().map(RankedBalance::new).collect::<Result<Vec<_>, _>>()?;

    // Stable sort
    ranked.sort_by(RankedBalance::descending);

    Ok(ranked.into_iter().map(|r| r.entry).collect())
}
