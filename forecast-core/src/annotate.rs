use std::collections::BTreeMap;

use anyhow::Context;

use crate::{
    error::PipelineError,
    model::{Dataset, IconPayload},
    resolver::{ConditionIndex, Resolution},
    store::{CONDITIONS_DOCUMENT, DocumentStore, FORECAST_DOCUMENT},
};

/// Attach the day icon of each record's resolved condition.
///
/// Records whose condition is not in `index`, or whose icon failed to
/// fetch, end up with no icon. Running it again with the same inputs
/// changes nothing.
pub fn annotate<'a>(
    dataset: &'a mut Dataset,
    icons: &BTreeMap<String, IconPayload>,
    index: &ConditionIndex,
) -> &'a mut Dataset {
    for record in dataset.hours_mut() {
        record.icon = index
            .get(&record.resolved_condition)
            .and_then(|code| icons.get(code))
            .map(IconPayload::day_icon);
    }
    dataset
}

/// Description -> payload for every fetched code, resolved or missing.
pub fn conditions_summary(
    resolution: &Resolution,
    icons: &BTreeMap<String, IconPayload>,
) -> BTreeMap<String, IconPayload> {
    let mut summary = BTreeMap::new();
    for (description, code) in resolution.conditions.iter().chain(resolution.missing.iter()) {
        if let Some(payload) = icons.get(code) {
            summary.entry(description.clone()).or_insert_with(|| IconPayload {
                description: description.clone(),
                ..payload.clone()
            });
        }
    }
    summary
}

/// Write `dataset` as the forecast document.
pub fn store_forecast(store: &dyn DocumentStore, dataset: &Dataset) -> Result<(), PipelineError> {
    let value = serde_json::to_value(dataset)
        .context("Failed to serialize forecast")
        .map_err(|e| PipelineError::persistence(FORECAST_DOCUMENT, e))?;
    store.store_document(FORECAST_DOCUMENT, &value)
}

/// Write the annotated forecast and the conditions summary.
pub fn publish(
    store: &dyn DocumentStore,
    dataset: &Dataset,
    summary: &BTreeMap<String, IconPayload>,
) -> Result<(), PipelineError> {
    store_forecast(store, dataset)?;

    let value = serde_json::to_value(summary)
        .context("Failed to serialize conditions summary")
        .map_err(|e| PipelineError::persistence(CONDITIONS_DOCUMENT, e))?;
    store.store_document(CONDITIONS_DOCUMENT, &value)?;

    tracing::info!(
        days = dataset.days().len(),
        conditions = summary.len(),
        "Published forecast documents"
    );
    Ok(())
}

/// Read back a previously stored forecast document.
pub fn load_forecast(store: &dyn DocumentStore) -> Result<Dataset, PipelineError> {
    let value = store.load_document(FORECAST_DOCUMENT)?;
    serde_json::from_value(value)
        .context("Forecast document has an unexpected shape")
        .map_err(|e| PipelineError::persistence(FORECAST_DOCUMENT, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        matcher::MatchPolicy,
        resolver::{
            resolve,
            tests::{dataset, taxonomy},
        },
        store::tests::MemoryStore,
    };
    use serde_json::json;

    fn payload(code: &str, description: &str) -> IconPayload {
        IconPayload {
            description: description.into(),
            icon_code: code.into(),
            day_bytes: format!("day:{code}").into_bytes(),
            night_bytes: format!("night:{code}").into_bytes(),
        }
    }

    fn setup() -> (Dataset, Resolution, BTreeMap<String, IconPayload>) {
        let table = taxonomy(&[("01d", "Clear Sky"), ("09d", "Shower Rain"), ("13d", "Snow")]);
        let mut data = dataset(&[&["Clear Sky", "Shower Rain", "Clear Sky"], &["Shower Rain"]]);
        let res = resolve(&mut data, &table, MatchPolicy::default());
        let icons: BTreeMap<_, _> = [payload("01d", "Clear Sky"), payload("13d", "Snow")]
            .into_iter()
            .map(|p| (p.icon_code.clone(), p))
            .collect();
        (data, res, icons)
    }

    #[test]
    fn records_get_day_icon_or_stay_empty_when_asset_failed() {
        let (mut data, res, icons) = setup();
        annotate(&mut data, &icons, &res.conditions);

        let hours: Vec<_> = data.hours().collect();
        let clear = hours[0].icon.as_ref().unwrap();
        assert_eq!(clear.icon_code, "01d");
        assert_eq!(clear.description, "Clear Sky");
        assert_eq!(clear.bytes, b"day:01d");
        assert!(hours[1].icon.is_none());
        assert!(hours[3].icon.is_none());
    }

    #[test]
    fn annotating_twice_changes_nothing() {
        let (mut data, res, icons) = setup();
        annotate(&mut data, &icons, &res.conditions);
        let once = data.clone();
        annotate(&mut data, &icons, &res.conditions);
        assert_eq!(data, once);
    }

    #[test]
    fn unresolved_records_keep_empty_icon() {
        let mut data = dataset(&[&["Hail"]]);
        let res = resolve(&mut data, &taxonomy(&[]), MatchPolicy::default());
        annotate(&mut data, &BTreeMap::new(), &res.conditions);
        assert!(data.hours().all(|r| r.icon.is_none()));
    }

    #[test]
    fn summary_covers_resolved_and_missing_fetched_codes() {
        let (_, res, icons) = setup();
        let summary = conditions_summary(&res, &icons);

        assert_eq!(summary.keys().collect::<Vec<_>>(), vec!["Clear Sky", "Snow"]);
        assert_eq!(summary["Snow"].night_bytes, b"night:13d");
    }

    #[test]
    fn publish_writes_both_documents() {
        let (mut data, res, icons) = setup();
        annotate(&mut data, &icons, &res.conditions);
        let summary = conditions_summary(&res, &icons);
        let store = MemoryStore::default();

        publish(&store, &data, &summary).unwrap();

        let forecast = store.get(FORECAST_DOCUMENT).unwrap();
        let first = &forecast[0]["day"]["hourly_data"][0];
        assert_eq!(first["conditions"], json!("Clear Sky"));
        assert_eq!(first["emoji"]["Icon Code"], json!("01d"));
        assert_eq!(forecast[0]["day"]["hourly_data"][1]["emoji"], json!(""));

        let conditions = store.get(CONDITIONS_DOCUMENT).unwrap();
        assert_eq!(conditions["Snow"]["Icon Code"], json!("13d"));
        assert!(conditions["Snow"]["Night Decoded Bytes"].is_string());

        assert_eq!(load_forecast(&store).unwrap(), data);
    }

    #[test]
    fn failed_forecast_write_stops_before_summary() {
        let (data, res, icons) = setup();
        let store = MemoryStore { failing: vec![FORECAST_DOCUMENT.into()], ..Default::default() };

        let err = publish(&store, &data, &conditions_summary(&res, &icons)).unwrap_err();

        assert!(matches!(err, PipelineError::PersistenceError { .. }));
        assert!(store.get(CONDITIONS_DOCUMENT).is_none());
    }
}
