//! Placeholder slots in the report template.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::error::{CoreError, CoreResult};

/// A rectangular cell range such as `B10:F25`. Columns and rows are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub from_col: u32,
    pub from_row: u32,
    pub to_col: u32,
    pub to_row: u32,
}

fn parse_cell(cell: &str) -> Option<(u32, u32)> {
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0u32, |acc, c| acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1));
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((col - 1, row - 1))
}

fn column_name(mut col: u32) -> String {
    let mut out = Vec::new();
    col += 1;
    while col > 0 {
        let rem = (col - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        col = (col - 1) / 26;
    }
    out.iter().rev().collect()
}

impl FromStr for CellRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (a, b) = s.trim().split_once(':').ok_or_else(|| format!("'{s}' is not a range like B10:F25"))?;
        let (c1, r1) = parse_cell(a).ok_or_else(|| format!("invalid cell '{a}'"))?;
        let (c2, r2) = parse_cell(b).ok_or_else(|| format!("invalid cell '{b}'"))?;
        Ok(CellRange {
            from_col: c1.min(c2),
            from_row: r1.min(r2),
            to_col: c1.max(c2),
            to_row: r1.max(r2),
        })
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}:{}{}",
            column_name(self.from_col),
            self.from_row + 1,
            column_name(self.to_col),
            self.to_row + 1
        )
    }
}

impl Serialize for CellRange {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRange {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    #[default]
    Any,
}

impl Orientation {
    pub fn of(width: u32, height: u32) -> Self {
        if width >= height { Orientation::Landscape } else { Orientation::Portrait }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub key: String,
    pub label: String,
    /// Worksheet name; `None` means the first sheet.
    #[serde(default)]
    pub sheet: Option<String>,
    pub range: CellRange,
    #[serde(default)]
    pub orientation: Orientation,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layout {
    pub slots: Vec<Slot>,
}

fn slot(key: &str, label: &str, range: CellRange, orientation: Orientation, keywords: &[&str]) -> Slot {
    Slot {
        key: key.to_owned(),
        label: label.to_owned(),
        sheet: None,
        range,
        orientation,
        keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
    }
}

const fn range(from_col: u32, from_row: u32, to_col: u32, to_row: u32) -> CellRange {
    CellRange { from_col, from_row, to_col, to_row }
}

impl Default for Layout {
    /// Two columns by three rows of photo boxes on the first sheet.
    fn default() -> Self {
        use Orientation::*;
        Self {
            slots: vec![
                slot("tampak_depan", "Tampak Depan", range(1, 9, 5, 24), Landscape, &["depan", "front"]),
                slot("tampak_belakang", "Tampak Belakang", range(7, 9, 11, 24), Landscape, &["belakang", "back", "rear"]),
                slot("tampak_kiri", "Tampak Kiri", range(1, 27, 5, 42), Landscape, &["kiri", "left"]),
                slot("tampak_kanan", "Tampak Kanan", range(7, 27, 11, 42), Landscape, &["kanan", "right"]),
                slot("detail_1", "Detail 1", range(1, 45, 5, 60), Portrait, &["detail", "dekat", "close"]),
                slot("detail_2", "Detail 2", range(7, 45, 11, 60), Portrait, &["detail", "dekat", "close"]),
            ],
        }
    }
}

impl Layout {
    /// Load a JSON slot list, or the built-in layout when `path` is `None`.
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)?;
        let layout: Layout = serde_json::from_str(&raw)
            .map_err(|e| CoreError::Internal(format!("layout {}: {e}", path.display())))?;
        if layout.slots.is_empty() {
            return Err(CoreError::Internal(format!("layout {} has no slots", path.display())));
        }
        Ok(layout)
    }
}
