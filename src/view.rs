use std::collections::BTreeSet;

use crate::aggregate::{GroupBy, GroupKey, Series};
use crate::catalog::{DrugFilter, DEFAULT_GROUP_BY, DEFAULT_VITAL};

/// User interaction that changes what the chart shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    SelectVital(String),
    SelectGroup(GroupBy),
    SelectDrug(DrugFilter),
    /// Flip one group in or out of the legend toggle set.
    ToggleGroup(GroupKey),
    /// Clear the legend toggle set.
    ShowAll,
}

/// Immutable snapshot of every selection the chart depends on.
///
/// Transitions never mutate in place; `apply` returns the next state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub vital: String,
    pub group_by: GroupBy,
    pub drug: DrugFilter,
    /// Legend toggle set; empty means every group is visible.
    pub active_groups: BTreeSet<GroupKey>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            vital: DEFAULT_VITAL.to_string(),
            group_by: DEFAULT_GROUP_BY,
            drug: DrugFilter::All,
            active_groups: BTreeSet::new(),
        }
    }
}

impl ViewState {
    pub fn apply(&self, event: ViewEvent) -> ViewState {
        let mut next = self.clone();
        match event {
            ViewEvent::SelectVital(vital) => next.vital = vital.trim().to_lowercase(),
            ViewEvent::SelectGroup(group_by) => {
                // Keys of the previous dimension can never match the new one.
                if group_by != next.group_by {
                    next.active_groups.clear();
                }
                next.group_by = group_by;
            }
            ViewEvent::SelectDrug(drug) => next.drug = drug,
            ViewEvent::ToggleGroup(key) => {
                if !next.active_groups.remove(&key) {
                    next.active_groups.insert(key);
                }
            }
            ViewEvent::ShowAll => next.active_groups.clear(),
        }
        next
    }

    pub fn is_visible(&self, key: &GroupKey) -> bool {
        self.active_groups.is_empty() || self.active_groups.contains(key)
    }

    pub fn visible<'a>(&'a self, series: &'a [Series]) -> impl Iterator<Item = &'a Series> + 'a {
        series.iter().filter(move |s| self.is_visible(&s.key))
    }
}
