//! Structural matching of variations by their size and color lists.
//!
//! When an incoming variation carries no barcode, the sync engine identifies
//! it by the combination of its size list and color list. Historically the
//! lists were compared element by element, so a reordered color list counts
//! as a different variation. [`VariationMatchMode::Set`] relaxes that to an
//! order-insensitive comparison.

use core::fmt;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Error returned when a match mode name cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid variation match mode: {0} (expected `sequence` or `set`)")]
pub struct MatchModeParseError(pub String);

/// How size and color lists are compared when matching variations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VariationMatchMode {
    /// Lists must be equal element by element, in the same order.
    #[default]
    Sequence,
    /// Lists must contain the same distinct values, in any order.
    Set,
}

impl VariationMatchMode {
    /// Returns `true` if the stored size/color lists identify the same
    /// variation as the incoming ones.
    #[must_use]
    pub fn same_variation(
        self,
        stored_sizes: &[String],
        stored_colors: &[String],
        incoming_sizes: &[String],
        incoming_colors: &[String],
    ) -> bool {
        self.lists_equal(stored_sizes, incoming_sizes)
            && self.lists_equal(stored_colors, incoming_colors)
    }

    fn lists_equal(self, stored: &[String], incoming: &[String]) -> bool {
        match self {
            Self::Sequence => stored == incoming,
            Self::Set => {
                stored.iter().collect::<BTreeSet<_>>() == incoming.iter().collect::<BTreeSet<_>>()
            }
        }
    }

    /// Configuration spelling of this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequence => "sequence",
            Self::Set => "set",
        }
    }
}

impl fmt::Display for VariationMatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VariationMatchMode {
    type Err = MatchModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" => Ok(Self::Sequence),
            "set" => Ok(Self::Set),
            _ => Err(MatchModeParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn list(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn test_sequence_mode_is_order_sensitive() {
        let mode = VariationMatchMode::Sequence;
        assert!(mode.same_variation(
            &list(&["S", "M"]),
            &list(&["Red"]),
            &list(&["S", "M"]),
            &list(&["Red"]),
        ));
        assert!(!mode.same_variation(
            &list(&["S", "M"]),
            &list(&["Red"]),
            &list(&["M", "S"]),
            &list(&["Red"]),
        ));
    }

    #[test]
    fn test_set_mode_ignores_order_and_repeats() {
        let mode = VariationMatchMode::Set;
        assert!(mode.same_variation(
            &list(&["S", "M"]),
            &list(&["Red", "Blue"]),
            &list(&["M", "S", "S"]),
            &list(&["Blue", "Red"]),
        ));
        assert!(!mode.same_variation(
            &list(&["S", "M"]),
            &list(&["Red"]),
            &list(&["S", "L"]),
            &list(&["Red"]),
        ));
    }

    #[test]
    fn test_both_lists_must_match() {
        let mode = VariationMatchMode::Sequence;
        assert!(!mode.same_variation(
            &list(&["S"]),
            &list(&["Red"]),
            &list(&["S"]),
            &list(&["Blue"]),
        ));
    }

    #[test]
    fn test_empty_lists_match_each_other() {
        assert!(VariationMatchMode::Sequence.same_variation(&[], &[], &[], &[]));
    }

    #[test]
    fn test_parse_match_mode() {
        assert_eq!(
            "sequence".parse::<VariationMatchMode>().unwrap(),
            VariationMatchMode::Sequence
        );
        assert_eq!(
            " SET ".parse::<VariationMatchMode>().unwrap(),
            VariationMatchMode::Set
        );
        assert!("fuzzy".parse::<VariationMatchMode>().is_err());
    }

    #[test]
    fn test_default_is_sequence() {
        assert_eq!(VariationMatchMode::default(), VariationMatchMode::Sequence);
    }
}
