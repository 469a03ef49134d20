use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    matcher::{MatchPolicy, best_match},
    model::{Dataset, HourlyRecord},
    taxonomy::TaxonomyTable,
};

/// Resolved description -> icon code. Iterates in description order.
pub type ConditionIndex = BTreeMap<String, String>;

/// Description -> icon code for taxonomy entries no record resolved to.
pub type MissingIndex = BTreeMap<String, String>;

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub conditions: ConditionIndex,
    pub missing: MissingIndex,
    /// Records left with their raw phrase.
    pub unresolved: usize,
}

impl Resolution {
    /// Every icon code the run knows about, mapped to its description.
    pub fn known_icons(&self) -> BTreeMap<String, String> {
        let mut icons = BTreeMap::new();
        for (description, code) in self.conditions.iter().chain(self.missing.iter()) {
            icons.entry(code.clone()).or_insert_with(|| description.clone());
        }
        icons
    }
}

/// Canonicalize the condition of every hourly record in `dataset`.
///
/// Matches are computed for the whole dataset before any record is touched.
/// An empty taxonomy leaves every record on its raw phrase.
pub fn resolve(dataset: &mut Dataset, taxonomy: &TaxonomyTable, policy: MatchPolicy) -> Resolution {
    let descriptions = taxonomy.descriptions();
    let mut cache: HashMap<String, Option<String>> = HashMap::new();
    let mut plan = Vec::with_capacity(dataset.record_count());
    let mut conditions = ConditionIndex::new();

    for record in dataset.hours() {
        let phrase = source_phrase(record);
        let resolved = cache
            .entry(phrase.to_string())
            .or_insert_with(|| {
                let m = best_match(phrase, &descriptions)?;
                tracing::debug!(phrase, candidate = %m.candidate, score = m.score, "Matched condition");
                policy.accepts(&m).then_some(m.candidate)
            })
            .clone();

        if let Some(description) = &resolved {
            if let Some(code) = taxonomy.icon_code_of(description) {
                conditions
                    .entry(description.clone())
                    .or_insert_with(|| code.to_string());
            }
        }
        plan.push(resolved);
    }

    let mut unresolved = 0;
    for (record, resolved) in dataset.hours_mut().zip(plan) {
        record.resolved_condition = match resolved {
            Some(description) => description,
            None => {
                unresolved += 1;
                source_phrase(record).to_string()
            }
        };
    }

    let used: HashSet<&str> = conditions.values().map(String::as_str).collect();
    let mut missing = MissingIndex::new();
    for entry in taxonomy.entries().iter().filter(|e| !used.contains(e.icon_code.as_str())) {
        missing
            .entry(entry.description.clone())
            .or_insert_with(|| entry.icon_code.clone());
    }

    tracing::info!(
        resolved = conditions.len(),
        missing = missing.len(),
        unresolved,
        "Resolved forecast conditions"
    );

    Resolution { conditions, missing, unresolved }
}

/// The provider phrase, falling back to the stored condition for documents
/// written before raw phrases were kept.
fn source_phrase(record: &HourlyRecord) -> &str {
    if record.raw_condition.is_empty() {
        &record.resolved_condition
    } else {
        &record.raw_condition
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::{Coordinates, Day, DayRecord, TaxonomyEntry, Temperature};

    pub(crate) fn dataset(phrases: &[&[&str]]) -> Dataset {
        let days = phrases
            .iter()
            .enumerate()
            .map(|(i, hours)| DayRecord {
                location: "Springfield".into(),
                coordinates: Coordinates { longitude: -89.6, latitude: 39.8 },
                day: Day {
                    date: format!("06/{:02}/2024", i + 1),
                    min_temp: Temperature::from_celsius(10.0),
                    max_temp: Temperature::from_celsius(20.0),
                    hours: hours
                        .iter()
                        .enumerate()
                        .map(|(h, p)| {
                            HourlyRecord::new(
                                format!("{h:02}:00:00"),
                                Temperature::from_celsius(15.0),
                                50,
                                *p,
                            )
                        })
                        .collect(),
                },
            })
            .collect();
        Dataset::new(days)
    }

    pub(crate) fn taxonomy(rows: &[(&str, &str)]) -> TaxonomyTable {
        TaxonomyTable::from_entries(rows.iter().map(|(c, d)| TaxonomyEntry::new(*c, *d)).collect())
            .unwrap()
    }

    fn owm() -> TaxonomyTable {
        taxonomy(&[
            ("01d", "Clear Sky"),
            ("02d", "Few Clouds"),
            ("03d", "Scattered Clouds"),
            ("04d", "Broken Clouds"),
            ("09d", "Shower Rain"),
            ("10d", "Rain"),
            ("11d", "Thunderstorm"),
            ("13d", "Snow"),
            ("50d", "Mist"),
        ])
    }

    #[test]
    fn trailing_space_phrase_resolves_to_clear_sky() {
        let mut data = dataset(&[&["Clear Sky "]]);
        let res = resolve(&mut data, &taxonomy(&[("01d", "Clear Sky"), ("02d", "Few Clouds")]), MatchPolicy::default());

        let record = data.hours().next().unwrap();
        assert_eq!(record.resolved_condition, "Clear Sky");
        assert_eq!(record.raw_condition, "Clear Sky ");
        assert_eq!(res.conditions.get("Clear Sky").map(String::as_str), Some("01d"));
        assert_eq!(res.missing.get("Few Clouds").map(String::as_str), Some("02d"));
        assert_eq!(res.unresolved, 0);
    }

    #[test]
    fn empty_taxonomy_leaves_raw_text() {
        let mut data = dataset(&[&["Overcast", "Rain"], &["Snow"]]);
        let res = resolve(&mut data, &TaxonomyTable::default(), MatchPolicy::default());

        assert!(res.conditions.is_empty());
        assert!(res.missing.is_empty());
        assert_eq!(res.unresolved, 3);
        for record in data.hours() {
            assert_eq!(record.resolved_condition, record.raw_condition);
        }
    }

    #[test]
    fn index_values_come_from_taxonomy_and_missing_is_disjoint() {
        let table = owm();
        let mut data = dataset(&[
            &["Clear", "Partially cloudy", "Rain", "Overcast"],
            &["Snow", "Rain, Overcast", "Clear"],
        ]);
        let res = resolve(&mut data, &table, MatchPolicy::default());

        let codes: HashSet<&str> = table.entries().iter().map(|e| e.icon_code.as_str()).collect();
        for code in res.conditions.values() {
            assert!(codes.contains(code.as_str()));
        }
        for code in res.missing.values() {
            assert!(!res.conditions.values().any(|c| c == code));
        }
        assert_eq!(res.conditions.len() + res.missing.len(), table.len());
    }

    #[test]
    fn shared_description_picks_first_code_every_time() {
        let table = taxonomy(&[("09d", "Rain"), ("10d", "Rain"), ("01d", "Clear Sky")]);

        for _ in 0..3 {
            let mut data = dataset(&[&["rain"]]);
            let res = resolve(&mut data, &table, MatchPolicy::default());
            assert_eq!(res.conditions.get("Rain").map(String::as_str), Some("09d"));
            assert_eq!(res.missing.get("Rain").map(String::as_str), Some("10d"));
        }
    }

    #[test]
    fn unmatched_shared_description_keeps_first_code() {
        let table = taxonomy(&[("01d", "Clear Sky"), ("09d", "Rain"), ("10d", "Rain")]);
        let mut data = dataset(&[&["Clear Sky"]]);
        let res = resolve(&mut data, &table, MatchPolicy::default());

        assert_eq!(res.missing.len(), 1);
        assert_eq!(res.missing.get("Rain").map(String::as_str), Some("09d"));
        assert_eq!(res.known_icons().get("09d").map(String::as_str), Some("Rain"));
    }

    #[test]
    fn threshold_leaves_weak_matches_unresolved() {
        let mut data = dataset(&[&["Clear Sky", "qqqqqqqq"]]);
        let res = resolve(&mut data, &owm(), MatchPolicy { min_score: 60 });

        let hours: Vec<_> = data.hours().collect();
        assert_eq!(hours[0].resolved_condition, "Clear Sky");
        assert_eq!(hours[1].resolved_condition, "qqqqqqqq");
        assert_eq!(res.unresolved, 1);
        assert_eq!(res.conditions.len(), 1);
    }

    #[test]
    fn resolving_twice_gives_same_outcome() {
        let table = owm();
        let mut data = dataset(&[&["Clear", "Overcast", "Rain"]]);
        let first = resolve(&mut data, &table, MatchPolicy::default());
        let snapshot = data.clone();
        let second = resolve(&mut data, &table, MatchPolicy::default());

        assert_eq!(first, second);
        assert_eq!(data, snapshot);
    }

    #[test]
    fn known_icons_cover_resolved_and_missing() {
        let mut data = dataset(&[&["Clear Sky"]]);
        let res = resolve(&mut data, &owm(), MatchPolicy::default());
        let icons = res.known_icons();

        assert_eq!(icons.len(), 9);
        assert_eq!(icons.get("01d").map(String::as_str), Some("Clear Sky"));
        assert_eq!(icons.get("50d").map(String::as_str), Some("Mist"));
    }
}
