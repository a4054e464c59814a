//! Serde helpers for flexible deserialization.
//!
//! With the `api` and `tracing` features, fields the response types do not know
//! about are logged as warnings and failures are logged with the path that broke,
//! so a backend schema change shows up in the logs before it shows up as a bug.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
#[cfg(feature = "api")]
use serde::de::DeserializeOwned;
use serde::{Deserialize as _, Deserializer};
use serde_json::Value;

/// Offset-less layouts accepted by [`lenient_timestamp`], read as UTC.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Deserialize an optional timestamp without failing the surrounding value.
///
/// Accepts RFC 3339, ISO 8601 without an offset, `YYYY-MM-DD HH:MM:SS` and
/// Unix epoch milliseconds. Anything else is logged and becomes `None`.
///
/// Use with `#[serde(default, deserialize_with = "lenient_timestamp")]`.
pub fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(value) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(None);
    };

    let parsed = match &value {
        Value::String(text) => parse_timestamp(text),
        Value::Number(millis) => millis
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    };

    #[cfg(feature = "tracing")]
    if parsed.is_none() {
        tracing::debug!(%value, "Ignoring unparseable timestamp");
    }

    Ok(parsed)
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::<FixedOffset>::parse_from_rfc3339(text) {
        return Some(timestamp.with_timezone(&Utc));
    }

    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// Deserialize `value`, logging unknown fields and the failing path.
#[cfg(all(feature = "api", feature = "tracing"))]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    use std::any::type_name;

    tracing::trace!(type_name = %type_name::<T>(), json = %value, "deserializing JSON");

    let mut unknown_paths: Vec<String> = Vec::new();
    let result = serde_ignored::deserialize(&value, |path| {
        unknown_paths.push(path.to_string());
    });

    let parsed: T = match result {
        Ok(parsed) => parsed,
        Err(e) => {
            if let Err(path_err) = serde_path_to_error::deserialize::<_, T>(&value) {
                let path = path_err.path().to_string();
                tracing::error!(
                    type_name = %type_name::<T>(),
                    path = %path,
                    value = %describe(lookup(&value, &path)),
                    error = %path_err.inner(),
                    "deserialization failed"
                );
            }
            return Err(e.into());
        }
    };

    for path in unknown_paths {
        tracing::warn!(
            type_name = %type_name::<T>(),
            field = %path,
            value = %describe(lookup(&value, &path)),
            "unknown field in API response"
        );
    }

    Ok(parsed)
}

/// Deserialize `value`, reporting the failing path in the error when tracing is disabled.
#[cfg(all(feature = "api", not(feature = "tracing")))]
pub fn deserialize_with_warnings<T: DeserializeOwned>(value: Value) -> crate::Result<T> {
    serde_path_to_error::deserialize(value).map_err(|e| e.into_inner().into())
}

/// Find the value a `serde_ignored` or `serde_path_to_error` path points at.
///
/// Both write `a.b.0` or `a.b[0]`; `?` marks an `Option` and is skipped.
#[cfg(all(feature = "api", feature = "tracing"))]
fn lookup<'value>(value: &'value Value, path: &str) -> Option<&'value Value> {
    let pointer: String = path
        .replace('[', ".")
        .replace(']', "")
        .split('.')
        .filter(|segment| !segment.is_empty() && *segment != "?")
        .flat_map(|segment| ["/", segment])
        .collect();

    value.pointer(&pointer)
}

#[cfg(all(feature = "api", feature = "tracing"))]
fn describe(value: Option<&Value>) -> String {
    value.map_or_else(|| "<unable to retrieve>".to_owned(), Value::to_string)
}
