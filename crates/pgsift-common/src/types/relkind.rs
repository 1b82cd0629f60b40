//! Relation kinds as encoded in the relation catalog.

use serde::Serialize;
use std::fmt;

/// The kind of a relation, stored as a single letter in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelKind {
    /// `r` — ordinary heap table.
    Table,
    /// `S` — sequence.
    Sequence,
    /// `i` — index.
    Index,
    /// `t` — TOAST chunk table.
    Toast,
    /// `v` — view (no storage).
    View,
    /// `m` — materialized view.
    MaterializedView,
    /// `c` — composite type.
    CompositeType,
    /// `f` — foreign table (no storage).
    ForeignTable,
    /// `p` — partitioned table (no storage).
    PartitionedTable,
    /// `I` — partitioned index (no storage).
    PartitionedIndex,
    /// Anything else; the letter is preserved.
    Other(char),
}

impl RelKind {
    /// Decodes the single-letter catalog encoding.
    #[must_use]
    pub fn from_char(c: char) -> Self {
        match c {
            'r' => Self::Table,
            'S' => Self::Sequence,
            'i' => Self::Index,
            't' => Self::Toast,
            'v' => Self::View,
            'm' => Self::MaterializedView,
            'c' => Self::CompositeType,
            'f' => Self::ForeignTable,
            'p' => Self::PartitionedTable,
            'I' => Self::PartitionedIndex,
            other => Self::Other(other),
        }
    }

    /// Returns the single-letter catalog encoding.
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            Self::Table => 'r',
            Self::Sequence => 'S',
            Self::Index => 'i',
            Self::Toast => 't',
            Self::View => 'v',
            Self::MaterializedView => 'm',
            Self::CompositeType => 'c',
            Self::ForeignTable => 'f',
            Self::PartitionedTable => 'p',
            Self::PartitionedIndex => 'I',
            Self::Other(c) => c,
        }
    }

    /// Returns true for kinds that own heap storage readable by the dumper.
    #[must_use]
    pub fn has_storage(self) -> bool {
        matches!(
            self,
            Self::Table | Self::Sequence | Self::Index | Self::Toast | Self::MaterializedView
        )
    }
}

impl fmt::Display for RelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
