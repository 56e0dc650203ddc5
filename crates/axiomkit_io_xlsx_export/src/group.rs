//! Adjacency grouping of consecutive rows sharing a key.

use crate::spec::EnumCellValue;
use crate::util::is_group_value_equal;

/// Grouping decision for one data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecGroupRowState {
    /// Row opens a new group (always true without a group column).
    pub if_group_start: bool,
    /// Outline level: 1 for continuation rows, else 0.
    pub n_outline_level: u8,
}

/// Worksheet-local adjacency tracker; each worksheet gets a fresh one.
///
/// Only the immediately preceding key is retained; records are expected to
/// arrive ordered by the group key.
#[derive(Debug, Clone, Default)]
pub struct GroupTracker {
    if_enabled: bool,
    value_current: Option<EnumCellValue>,
}

impl GroupTracker {
    /// Tracker for an export with (`true`) or without a group column.
    pub fn new(if_enabled: bool) -> Self {
        Self {
            if_enabled,
            value_current: None,
        }
    }

    /// Classify the next row by its group-field value.
    pub fn observe(&mut self, value: &EnumCellValue) -> SpecGroupRowState {
        if !self.if_enabled {
            return SpecGroupRowState {
                if_group_start: true,
                n_outline_level: 0,
            };
        }

        let if_group_start = match &self.value_current {
            Some(value_current) => !is_group_value_equal(value_current, value),
            None => true,
        };
        if if_group_start {
            self.value_current = Some(value.clone());
        }

        SpecGroupRowState {
            if_group_start,
            n_outline_level: if if_group_start { 0 } else { 1 },
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn derive_group_starts(l_keys: &[Option<&str>]) -> Vec<bool> {
        let mut tracker = GroupTracker::new(true);
        l_keys
            .iter()
            .map(|key| tracker.observe(&EnumCellValue::from(*key)).if_group_start)
            .collect()
    }

    #[test]
    fn test_group_starts_on_key_change_only() {
        let l_starts = derive_group_starts(&[
            Some("a"),
            Some("a"),
            Some("b"),
            Some("a"),
            None,
            None,
            Some(""),
        ]);
        assert_eq!(l_starts, vec![true, false, true, true, true, false, true]);
    }

    #[test]
    fn test_first_null_key_still_starts_group() {
        let mut tracker = GroupTracker::new(true);
        let state = tracker.observe(&EnumCellValue::None);
        assert!(state.if_group_start);
        assert_eq!(state.n_outline_level, 0);
    }

    #[test]
    fn test_disabled_tracker_never_outlines() {
        let mut tracker = GroupTracker::new(false);
        for _ in 0..3 {
            let state = tracker.observe(&EnumCellValue::from("same"));
            assert_eq!(
                state,
                SpecGroupRowState {
                    if_group_start: true,
                    n_outline_level: 0
                }
            );
        }
    }

    proptest! {
        #[test]
        fn prop_group_start_iff_key_differs_from_previous(
            l_keys in prop::collection::vec(prop::option::of(0u8..4), 0..64)
        ) {
            let mut tracker = GroupTracker::new(true);
            for (n_idx, key) in l_keys.iter().enumerate() {
                let value = EnumCellValue::from(key.map(i64::from));
                let state = tracker.observe(&value);
                let if_expected_start = n_idx == 0 || l_keys[n_idx - 1] != *key;
                prop_assert_eq!(state.if_group_start, if_expected_start);
                prop_assert_eq!(state.n_outline_level, if if_expected_start { 0 } else { 1 });
            }
        }
    }
}
