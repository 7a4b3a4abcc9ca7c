use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The analyses the server can surface, in catalog presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Analysis {
    StaleCells,
    IsolatedCells,
    IdleCells,
    DataLeak,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown analysis: {0}")]
pub struct UnknownAnalysisError(pub String);

impl Analysis {
    pub const CATALOG: [Self; 4] = [
        Self::StaleCells,
        Self::IsolatedCells,
        Self::IdleCells,
        Self::DataLeak,
    ];

    /// Display name; also the identifier the server filters on.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StaleCells => "Stale Cells Analysis",
            Self::IsolatedCells => "Isolated Cells Analysis",
            Self::IdleCells => "Idle Cells Analysis",
            Self::DataLeak => "Data Leak Analysis",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::StaleCells => {
                "An analysis that detects states that if executed directly may compute with an old state."
            }
            Self::IsolatedCells => {
                "An analysis that detects cells that are disconnected from all other cells and may be candidates for cleaning."
            }
            Self::IdleCells => {
                "An analysis that detects cells that do not modify data used in other cells and may be candidates for cleaning."
            }
            Self::DataLeak => {
                "An analysis to detect potential dependency between test and training data."
            }
        }
    }
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Analysis {
    type Err = UnknownAnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::CATALOG
            .into_iter()
            .find(|a| a.name() == trimmed)
            .ok_or_else(|| UnknownAnalysisError(s.to_string()))
    }
}

impl TryFrom<String> for Analysis {
    type Error = UnknownAnalysisError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Analysis> for String {
    fn from(value: Analysis) -> Self {
        value.name().to_string()
    }
}

/// Ordered set of analyses the user wants surfaced.
///
/// Order is selection order; a repeated analysis keeps its first position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveAnalyses {
    items: Vec<Analysis>,
}

impl ActiveAnalyses {
    #[must_use]
    pub fn new(selection: impl IntoIterator<Item = Analysis>) -> Self {
        let mut set = Self::default();
        set.replace(selection);
        set
    }

    /// Replace the whole set. No delta against the previous set is kept.
    pub fn replace(&mut self, selection: impl IntoIterator<Item = Analysis>) {
        self.items.clear();
        for analysis in selection {
            if !self.items.contains(&analysis) {
                self.items.push(analysis);
            }
        }
    }

    #[must_use]
    pub fn contains(&self, analysis: Analysis) -> bool {
        self.items.contains(&analysis)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Analysis> + '_ {
        self.items.iter().copied()
    }

    /// Names in selection order, as sent on the wire.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.items.iter().map(|a| a.name()).collect()
    }
}
