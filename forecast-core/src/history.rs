use serde_json::{Map, Value};

use crate::{
    error::PipelineError,
    model::HistoryRecord,
    store::{DocumentStore, HISTORY_DOCUMENT},
};

/// Group archived hours by date.
///
/// Each `"Date: <date>"` key holds `"Time N"` / `"Temperature N"` pairs in
/// archive order. `N` numbers records across the whole archive, starting at 1.
pub fn history_document(records: &[HistoryRecord]) -> Value {
    let mut days = Map::new();

    for (n, record) in (1..).zip(records) {
        let day = days
            .entry(format!("Date: {}", record.date))
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(slots) = day {
            slots.insert(format!("Time {n}"), Value::from(record.time.as_str()));
            slots.insert(
                format!("Temperature {n}"),
                record.temperature_f.map_or(Value::Null, Value::from),
            );
        }
    }
    Value::Object(days)
}

/// Write `records` as the history document.
pub fn store_history(
    store: &dyn DocumentStore,
    records: &[HistoryRecord],
) -> Result<(), PipelineError> {
    let value = history_document(records);
    store.store_document(HISTORY_DOCUMENT, &value)?;

    tracing::info!(
        records = records.len(),
        days = value.as_object().map_or(0, Map::len),
        "Stored temperature history"
    );
    Ok(())
}
