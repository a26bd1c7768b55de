//! The fixed set of profile columns and how each one is indexed.

use std::fmt;
use std::str::FromStr;

use crate::DataError;

/// How a column is stored in the search engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Tokenized free text, matched with a `match` query.
    Text,
    /// List of exact values (split on `|`), matched with a `term` query.
    Keyword,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProfileColumn {
    FullName,
    JobTitle,
    Industry,
    Summary,
    LocationCountry,
    Education,
    Experience,
    Skills,
    JobSummary,
}

impl ProfileColumn {
    /// All columns in canonical (raw file) order.
    pub const ALL: [Self; 9] = [
        Self::FullName,
        Self::JobTitle,
        Self::Industry,
        Self::Summary,
        Self::LocationCountry,
        Self::Education,
        Self::Experience,
        Self::Skills,
        Self::JobSummary,
    ];

    /// Columns that make up the deduplication key.
    pub const DEDUP_KEY: [Self; 3] = [Self::FullName, Self::JobTitle, Self::Industry];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullName => "full_name",
            Self::JobTitle => "job_title",
            Self::Industry => "industry",
            Self::Summary => "summary",
            Self::LocationCountry => "location_country",
            Self::Education => "education",
            Self::Experience => "experience",
            Self::Skills => "skills",
            Self::JobSummary => "job_summary",
        }
    }

    #[must_use]
    pub const fn kind(self) -> ColumnKind {
        match self {
            Self::Education | Self::Experience | Self::Skills => ColumnKind::Keyword,
            _ => ColumnKind::Text,
        }
    }

    #[must_use]
    pub const fn is_keyword(self) -> bool {
        matches!(self.kind(), ColumnKind::Keyword)
    }

    /// Column names as owned strings, handy for polars `select`/`unique` calls.
    pub fn names() -> Vec<String> {
        Self::ALL.iter().map(|c| c.as_str().to_string()).collect()
    }
}

impl fmt::Display for ProfileColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileColumn {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| DataError::UnknownColumn(s.to_string()))
    }
}
