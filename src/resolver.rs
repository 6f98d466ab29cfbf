use std::collections::{BTreeMap, BTreeSet};

use crate::models::ImportRecord;

/// Provider id to display name. Ids may be present without a usable name.
#[derive(Debug, Clone, Default)]
pub struct ProviderMap {
    names: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub label: String,
    pub name: Option<String>,
}

impl ProviderMap {
    /// Records `id -> name` unless the id was seen before; the first row wins.
    pub fn insert_first(&mut self, id: &str, name: &str) {
        let name = name.trim();
        let name = (!name.is_empty()).then(|| name.to_string());
        self.names.entry(id.trim().to_string()).or_insert(name);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.names.get(id).and_then(|name| name.as_deref())
    }

    /// The label is the mapped name when present, the raw id otherwise.
    pub fn resolve(&self, id: &str) -> ResolvedProvider {
        let name = self.name_of(id).map(String::from);
        ResolvedProvider {
            label: name.clone().unwrap_or_else(|| id.to_string()),
            name,
        }
    }
}

/// Drops records whose label is in `excluded`.
pub fn exclude_labels(records: Vec<ImportRecord>, excluded: &BTreeSet<String>) -> Vec<ImportRecord> {
    if excluded.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| !excluded.contains(record.provider_label.trim()))
        .collect()
}

/// Keeps only records whose provider resolved to a real name.
pub fn named_only(records: Vec<ImportRecord>) -> Vec<ImportRecord> {
    records
        .into_iter()
        .filter(|record| {
            record
                .provider_name
                .as_deref()
                .is_some_and(|name| !name.trim().is_empty())
        })
        .collect()
}

/// Sorted, de-duplicated labels; the option list for an allow-list.
pub fn provider_labels(records: &[ImportRecord]) -> Vec<String> {
    records
        .iter()
        .map(|record| record.provider_label.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// An empty allow-list keeps everything.
pub fn apply_allow_list(records: Vec<ImportRecord>, allow: &[String]) -> Vec<ImportRecord> {
    if allow.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|record| allow.iter().any(|label| label == &record.provider_label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(id: &str, label: &str, name: Option<&str>) -> ImportRecord {
        ImportRecord {
            provider_id: id.to_string(),
            provider_label: label.to_string(),
            provider_name: name.map(String::from),
            count: 1,
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn resolves_name_or_falls_back_to_id() {
        let mut map = ProviderMap::default();
        map.insert_first("1001", " Daily News ");
        map.insert_first("1002", "");

        assert_eq!(
            map.resolve("1001"),
            ResolvedProvider {
                label: "Daily News".to_string(),
                name: Some("Daily News".to_string()),
            }
        );
        assert_eq!(map.resolve("1002").label, "1002");
        assert_eq!(map.resolve("9999").name, None);
    }

    #[test]
    fn first_mapping_wins() {
        let mut map = ProviderMap::default();
        map.insert_first("1001", "First");
        map.insert_first("1001", "Second");
        assert_eq!(map.name_of("1001"), Some("First"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn exclusion_matches_trimmed_labels() {
        let excluded: BTreeSet<String> = ["Legacy Feed".to_string()].into_iter().collect();
        let records = vec![
            record("1", "Legacy Feed ", Some("Legacy Feed")),
            record("2", "Daily News", Some("Daily News")),
        ];
        let kept = exclude_labels(records, &excluded);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].provider_id, "2");
    }

    #[test]
    fn named_filter_drops_id_only_providers() {
        let records = vec![
            record("1", "Daily News", Some("Daily News")),
            record("2", "2", None),
        ];
        let kept = named_only(records);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].provider_label, "Daily News");
    }

    #[test]
    fn allow_list_filters_when_present() {
        let records = vec![
            record("1", "A", Some("A")),
            record("2", "B", Some("B")),
            record("3", "A", Some("A")),
        ];
        assert_eq!(provider_labels(&records), vec!["A", "B"]);
        assert_eq!(apply_allow_list(records.clone(), &[]).len(), 3);
        assert_eq!(apply_allow_list(records, &["B".to_string()]).len(), 1);
    }
}
