use serde::Serialize;

use crate::join::JoinedRecord;

/// Dropping more than this fraction of joined records for uncalled bases is reported as a
/// warning rather than as information.
pub const WARN_DROPPED_FRACTION: f64 = 0.2;

/// The set of symbols that mark an uncalled base in a barcode. Matching is case-sensitive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UncalledBases {
    symbols: Vec<char>,
}

impl Default for UncalledBases {
    fn default() -> Self {
        UncalledBases { symbols: vec!['N'] }
    }
}

impl UncalledBases {
    pub fn is_uncalled(&self, base: char) -> bool {
        self.symbols.contains(&base)
    }

    /// A barcode is fully called when none of its bases is in the uncalled set.
    pub fn is_fully_called(&self, barcode: &str) -> bool {
        !barcode.chars().any(|b| self.is_uncalled(b))
    }
}

/// Error type for parsing a set of uncalled base symbols.
#[derive(Debug)]
pub struct ParseUncalledErr(String);

impl std::fmt::Display for ParseUncalledErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid uncalled base symbols: {}", self.0)
    }
}

impl std::error::Error for ParseUncalledErr {}

impl<'a> TryFrom<&'a str> for UncalledBases {
    type Error = ParseUncalledErr;

    fn try_from(arg: &'a str) -> Result<UncalledBases, Self::Error> {
        let mut symbols: Vec<char> = arg.chars().collect();
        symbols.sort_unstable();
        symbols.dedup();

        if symbols.is_empty() {
            return Err(ParseUncalledErr(String::from(
                "expected at least one symbol, as in `--uncalled N`",
            )));
        }

        if let Some(c) = symbols.iter().find(|c| c.is_whitespace()) {
            return Err(ParseUncalledErr(format!(
                "whitespace ({c:?}) cannot mark an uncalled base"
            )));
        }

        Ok(UncalledBases { symbols })
    }
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
}

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq)]
pub struct FilterStats {
    /// joined records seen by the filter
    pub before: usize,
    pub dropped: usize,
    pub dropped_fraction: f64,
    pub severity: Severity,
}

/// Removes every record whose barcode contains an uncalled base.
///
/// The returned [`FilterStats`] grade the loss: more than [`WARN_DROPPED_FRACTION`] of the
/// input is a [`Severity::Warning`]. This is a data quality signal only; filtering never
/// fails.
pub fn filter(
    joined: Vec<JoinedRecord>,
    uncalled: &UncalledBases,
) -> (Vec<JoinedRecord>, FilterStats) {
    let before = joined.len();

    let passing: Vec<JoinedRecord> = joined
        .into_iter()
        .filter(|rec| uncalled.is_fully_called(&rec.barcode))
        .collect();

    let dropped = before - passing.len();
    let dropped_fraction = if before == 0 {
        0.0
    } else {
        dropped as f64 / before as f64
    };

    let severity = if dropped_fraction > WARN_DROPPED_FRACTION {
        Severity::Warning
    } else {
        Severity::Info
    };

    (
        passing,
        FilterStats {
            before,
            dropped,
            dropped_fraction,
            severity,
        },
    )
}
