//! Sort specification and the caller-side header toggle

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sort direction for ORDER BY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

/// A resolved single-column sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Descending,
        }
    }
}

/// Header click state: at most one sorted column, cycling
/// unsorted -> ascending -> descending -> unsorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortState {
    active: Option<SortSpec>,
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the cycle for `column`. A different column starts over at
    /// ascending and clears the previous one.
    pub fn toggle(&mut self, column: &str) -> Option<&SortSpec> {
        self.active = match self.active.take() {
            Some(spec) if spec.column == column => match spec.direction {
                SortDirection::Ascending => Some(SortSpec::desc(column)),
                SortDirection::Descending => None,
            },
            _ => Some(SortSpec::asc(column)),
        };
        self.active.as_ref()
    }

    /// Direction shown on `column`'s header, if it is the sorted one
    pub fn direction_for(&self, column: &str) -> Option<SortDirection> {
        self.active
            .as_ref()
            .filter(|spec| spec.column == column)
            .map(|spec| spec.direction)
    }

    /// The sort to hand to the query builder
    pub fn current(&self) -> Option<&SortSpec> {
        self.active.as_ref()
    }

    pub fn clear(&mut self) {
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_directions() {
        assert_eq!("ASC".parse::<SortDirection>(), Ok(SortDirection::Ascending));
        assert_eq!("descending".parse::<SortDirection>(), Ok(SortDirection::Descending));
        assert!("up".parse::<SortDirection>().is_err());
    }

    #[test]
    fn clear_resets_state() {
        let mut state = SortState::new();
        state.toggle("name");
        state.clear();
        assert_eq!(state.current(), None);
    }
}
