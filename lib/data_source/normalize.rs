use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use serde_json::Value;

use super::record::Record;

/// Returns a datacenter with its buildings resolved, its operational date in
/// RFC 3339 form and `import` set to true.
///
/// Datacenters exported without a `buildings` array only carry `buildingIds`;
/// those are looked up in `buildings`. Ids with no matching building keep their
/// slot as `null`.
pub fn normalize_datacenter(datacenter: &Record, buildings: &[Record]) -> Record {
    let mut normalized = datacenter.clone();

    if is_missing(datacenter.get("buildings")) {
        if let Some(Value::Array(ids)) = datacenter.get("buildingIds") {
            let resolved: Vec<Value> = ids
                .iter()
                .map(|id| match buildings.iter().find(|b| b.get("id") == Some(id)) {
                    Some(building) => Value::Object(building.fields().clone()),
                    None => {
                        debug!("No building found for id {}", id);
                        Value::Null
                    }
                })
                .collect();
            normalized.insert("buildings", Value::Array(resolved));
        }
    }

    if let Some(date) = datacenter.get("operationalDate").and_then(parse_epoch_millis) {
        normalized.insert("operationalDate", Value::String(date));
    }

    normalized.insert("import", Value::Bool(true));
    normalized
}

fn is_missing(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

fn parse_epoch_millis(value: &Value) -> Option<String> {
    let millis = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        _ => return None,
    };
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|date| date.to_rfc3339_opts(SecondsFormat::Millis, true))
}
