//! Selection steps and the accumulated filter they produce.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One field a user narrows the catalog by.
///
/// The browse flow walks a configured ordered list of these; each variant
/// knows which catalog attribute it filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Level,
    Term,
    Category,
    Course,
    Item,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Term => "term",
            Self::Category => "category",
            Self::Course => "course",
            Self::Item => "item",
        }
    }

    /// Prompt shown when the user is asked to pick a value for this step.
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Level => "Choose a level:",
            Self::Term => "Choose a term:",
            Self::Category => "Choose a type:",
            Self::Course => "Choose a course:",
            Self::Item => "Choose a file:",
        }
    }

    /// Notice shown when a step turns out to have nothing to offer.
    pub fn empty_notice(self) -> &'static str {
        match self {
            Self::Level | Self::Term | Self::Category => {
                "No material has been added for this selection yet."
            }
            Self::Course => "No courses have been added for this selection yet.",
            Self::Item => "There are no files for the selected course.",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered `(step, value)` pairs answered so far.
///
/// Hashable so it can key the option cache; two filters are equal only when
/// they carry the same answers in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter(Vec<(StepKind, String)>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step: StepKind, value: impl Into<String>) -> Self {
        self.0.push((step, value.into()));
        self
    }

    pub fn get(&self, step: StepKind) -> Option<&str> {
        self.0
            .iter()
            .find(|(s, _)| *s == step)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StepKind, &str)> {
        self.0.iter().map(|(s, v)| (*s, v.as_str()))
    }
}

impl FromIterator<(StepKind, String)> for Filter {
    fn from_iter<I: IntoIterator<Item = (StepKind, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_kind_serializes_lowercase() {
        let json = serde_json::to_string(&StepKind::Category).unwrap();
        assert_eq!(json, "\"category\"");
        let back: StepKind = serde_json::from_str("\"item\"").unwrap();
        assert_eq!(back, StepKind::Item);
    }

    #[test]
    fn filter_lookup_by_step() {
        let filter = Filter::new()
            .with(StepKind::Level, "2")
            .with(StepKind::Course, "Algebra");
        assert_eq!(filter.get(StepKind::Level), Some("2"));
        assert_eq!(filter.get(StepKind::Course), Some("Algebra"));
        assert_eq!(filter.get(StepKind::Term), None);
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn filter_equality_is_order_sensitive() {
        let a = Filter::new()
            .with(StepKind::Level, "1")
            .with(StepKind::Term, "2");
        let b = Filter::new()
            .with(StepKind::Term, "2")
            .with(StepKind::Level, "1");
        assert_ne!(a, b);
    }
}
