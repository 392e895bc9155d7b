// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

/// A single table cell. Id cells hold foreign keys and identity values,
/// Text cells hold everything the user can type. Whitespace-only text is
/// treated as no value throughout the engine.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Cell {
    #[default]
    Empty,
    Id(i64),
    Text(String),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// A comma-joined list column value; an empty list is no value.
    pub fn list(list: &str) -> Self {
        if list.is_empty() {
            Self::Empty
        } else {
            Self::Text(list.to_owned())
        }
    }

    pub fn id_opt(value: Option<i64>) -> Self {
        match value {
            Some(id) => Self::Id(id),
            None => Self::Empty,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Id(_) => false,
            Self::Text(text) => text.trim().is_empty(),
        }
    }

    /// Collapse blank text to `Empty` so value comparisons treat "", "  "
    /// and no-value alike.
    pub fn normalized(&self) -> Cell {
        if self.is_blank() {
            Cell::Empty
        } else {
            self.clone()
        }
    }

    pub fn as_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) if !text.trim().is_empty() => Some(text),
            _ => None,
        }
    }

    /// Stored representation for value payloads: blank cells carry no
    /// value, everything else its display form.
    pub fn to_stored(&self) -> Option<String> {
        if self.is_blank() {
            return None;
        }
        Some(self.display())
    }

    pub fn display(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Id(id) => id.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Id(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Cell;

    #[test]
    fn blank_detection_covers_whitespace_text() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::text("   ").is_blank());
        assert!(!Cell::text("x").is_blank());
        assert!(!Cell::Id(0).is_blank());
    }

    #[test]
    fn normalized_collapses_blank_variants() {
        assert_eq!(Cell::text(" ").normalized(), Cell::Empty);
        assert_eq!(Cell::text("salt").normalized(), Cell::text("salt"));
        assert_eq!(Cell::Id(7).normalized(), Cell::Id(7));
    }

    #[test]
    fn stored_form_drops_blanks() {
        assert_eq!(Cell::Empty.to_stored(), None);
        assert_eq!(Cell::text(" ").to_stored(), None);
        assert_eq!(Cell::text("12.5").to_stored(), Some("12.5".to_owned()));
        assert_eq!(Cell::Id(42).to_stored(), Some("42".to_owned()));
    }
}
