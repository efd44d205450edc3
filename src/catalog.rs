use std::collections::{HashMap, HashSet};

use crate::aggregate::{GroupBy, GroupKey};
use crate::loader::{AnestheticEvent, VitalReading};

pub const DEFAULT_VITAL: &str = "map";
pub const DEFAULT_GROUP_BY: GroupBy = GroupBy::EmergencyStatus;
pub const ALL_DRUGS: &str = "All";

/// Known infusion-rate channels and their human-readable drug names.
const DRUG_NAMES: [(&str, &str); 2] = [
    ("orchestra/rftn20_rate", "Remifentanil"),
    ("orchestra/ppf20_rate", "Propofol"),
];

/// Human-readable name for a drug channel, falling back to the raw name.
pub fn drug_display_name(tname: &str) -> &str {
    let lowered = tname.to_lowercase();
    DRUG_NAMES
        .iter()
        .find(|(raw, _)| *raw == lowered)
        .map(|(_, name)| *name)
        .unwrap_or(tname)
}

/// Drug filter applied before aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum DrugFilter {
    #[default]
    All,
    /// Lower-cased channel name.
    Channel(String),
}

impl DrugFilter {
    /// Parse a selector value; "All" in any case selects every case.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL_DRUGS) {
            DrugFilter::All
        } else {
            DrugFilter::Channel(trimmed.to_lowercase())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            DrugFilter::All => ALL_DRUGS,
            DrugFilter::Channel(tname) => drug_display_name(tname),
        }
    }
}

/// One entry of a selection control: submitted value plus display text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Everything the selection controls offer, derived once after loading.
#[derive(Debug, Clone, Default)]
pub struct OptionCatalog {
    vitals: Vec<String>,
    drugs: Vec<String>,
    group_keys: HashMap<GroupBy, Vec<GroupKey>>,
}

impl OptionCatalog {
    pub fn build(readings: &[VitalReading], events: &[AnestheticEvent]) -> Self {
        let vitals = distinct(readings.iter().map(|r| r.signal.as_str()));
        let drugs = distinct(
            events
                .iter()
                .map(|e| e.tname.as_str())
                .filter(|t| t.to_lowercase().contains("rate")),
        );

        let group_keys = GroupBy::ALL
            .into_iter()
            .map(|dim| {
                let mut seen = HashSet::new();
                let keys: Vec<GroupKey> = readings
                    .iter()
                    .map(|r| dim.key_of(r))
                    .filter(|k| seen.insert(*k))
                    .cloned()
                    .collect();
                (dim, keys)
            })
            .collect();

        Self {
            vitals,
            drugs,
            group_keys,
        }
    }

    /// Distinct vital signs in first-seen order.
    pub fn vitals(&self) -> &[String] {
        &self.vitals
    }

    /// Distinct rate channels in first-seen order, without the "All" entry.
    pub fn drugs(&self) -> &[String] {
        &self.drugs
    }

    pub fn vital_options(&self) -> Vec<SelectOption> {
        self.vitals
            .iter()
            .map(|v| SelectOption {
                value: v.clone(),
                label: v.to_uppercase(),
            })
            .collect()
    }

    pub fn group_options(&self) -> Vec<SelectOption> {
        GroupBy::ALL
            .into_iter()
            .map(|dim| SelectOption {
                value: dim.column().to_string(),
                label: dim.label().to_string(),
            })
            .collect()
    }

    pub fn drug_options(&self) -> Vec<SelectOption> {
        std::iter::once(SelectOption {
            value: ALL_DRUGS.to_string(),
            label: ALL_DRUGS.to_string(),
        })
        .chain(self.drugs.iter().map(|d| SelectOption {
            value: d.clone(),
            label: drug_display_name(d).to_string(),
        }))
        .collect()
    }

    /// Group keys of one dimension across all readings, first-seen order.
    pub fn group_keys(&self, dim: GroupBy) -> &[GroupKey] {
        self.group_keys.get(&dim).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stable position of a key within its dimension, used for color choice.
    pub fn group_index(&self, dim: GroupBy, key: &GroupKey) -> Option<usize> {
        self.group_keys(dim).iter().position(|k| k == key)
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_string)
        .collect()
}
