use serde::{Deserialize, Serialize};

/// Approximate-match score. Higher is better, `0` means no usable overlap.
pub type Score = u64;

/// Identifier of an imported chart (assay table)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub String);

impl TableId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable position of a canonical record in the catalog arena.
///
/// Ids are never reused or invalidated: records are only ever appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(pub usize);

/// Virus type partition; one catalog exists per partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VirusType {
    #[serde(rename = "A(H1N1)")]
    H1N1,
    #[serde(rename = "A(H3N2)")]
    H3N2,
    #[serde(rename = "B")]
    B,
}

impl VirusType {
    /// Parse the nomenclature form (`A(H1N1)`, `A(H3N2)`, `B`), also accepting
    /// the short file-name forms (`h1`, `h3`, `b`).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A(H1N1)" | "H1" | "H1N1" => Some(Self::H1N1),
            "A(H3N2)" | "H3" | "H3N2" => Some(Self::H3N2),
            "B" => Some(Self::B),
            _ => None,
        }
    }

    /// Short tag used in snapshot file names (`hidb.h3.json.gz`)
    #[must_use]
    pub fn file_tag(self) -> &'static str {
        match self {
            Self::H1N1 => "h1",
            Self::H3N2 => "h3",
            Self::B => "b",
        }
    }
}

impl std::fmt::Display for VirusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::H1N1 => write!(f, "A(H1N1)"),
            Self::H3N2 => write!(f, "A(H3N2)"),
            Self::B => write!(f, "B"),
        }
    }
}
