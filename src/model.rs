use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of blank rows a fresh results form starts with.
pub const DEFAULT_STUDENT_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassName {
    #[serde(rename = "10")]
    Tenth,
    #[serde(rename = "12Arts")]
    TwelfthArts,
    #[serde(rename = "12Commerce")]
    TwelfthCommerce,
    #[serde(rename = "12Science")]
    TwelfthScience,
}

impl ClassName {
    pub const ALL: [ClassName; 4] = [
        ClassName::Tenth,
        ClassName::TwelfthArts,
        ClassName::TwelfthCommerce,
        ClassName::TwelfthScience,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClassName::Tenth => "10",
            ClassName::TwelfthArts => "12Arts",
            ClassName::TwelfthCommerce => "12Commerce",
            ClassName::TwelfthScience => "12Science",
        }
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown class: {0}")]
pub struct UnknownClass(pub String);

impl FromStr for ClassName {
    type Err = UnknownClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        ClassName::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| UnknownClass(t.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentEntry {
    pub position: String,
    pub name: String,
    pub marks: String,
    pub total_marks: String,
    pub percentage: String,
}

impl StudentEntry {
    pub fn blank(position: impl Into<String>) -> Self {
        Self {
            position: position.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionSnapshot {
    pub name: String,
    pub marks: String,
    pub total_marks: String,
    pub percentage: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultSummary {
    pub total_students: u32,
    pub passed: u32,
    pub result: String,
    pub first_position: PositionSnapshot,
    pub second_position: PositionSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionKind {
    FirstPosition,
    SecondPosition,
}

impl PositionKind {
    /// Index into `ResultRecord::data` that feeds this snapshot.
    pub fn source_index(self) -> usize {
        match self {
            PositionKind::FirstPosition => 0,
            PositionKind::SecondPosition => 1,
        }
    }
}

impl ResultSummary {
    pub fn position(&self, kind: PositionKind) -> &PositionSnapshot {
        match kind {
            PositionKind::FirstPosition => &self.first_position,
            PositionKind::SecondPosition => &self.second_position,
        }
    }

    pub fn position_mut(&mut self, kind: PositionKind) -> &mut PositionSnapshot {
        match kind {
            PositionKind::FirstPosition => &mut self.first_position,
            PositionKind::SecondPosition => &mut self.second_position,
        }
    }
}

/// One class-and-year's published results. `data` is kept in rank order:
/// `data[0]` and `data[1]` feed the first and second position snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub year: String,
    pub class: ClassName,
    #[serde(default)]
    pub data: Vec<StudentEntry>,
    #[serde(default)]
    pub summary: ResultSummary,
}

/// English ordinal for the pre-seeded rows ("1st", "2nd", "3rd", "4th"...).
pub fn rank_label(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

impl Default for ResultRecord {
    fn default() -> Self {
        Self {
            year: String::new(),
            class: ClassName::Tenth,
            data: (1..=DEFAULT_STUDENT_ROWS)
                .map(|n| StudentEntry::blank(rank_label(n)))
                .collect(),
            summary: ResultSummary::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResult {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(flatten)]
    pub record: ResultRecord,
}
