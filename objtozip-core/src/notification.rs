//! Reading S3 "object created" notifications.
//!
//! The trigger payload is accessed field by field on a [`serde_json::Value`] rather than
//! deserialised into a strict schema: a payload without `Records` yields an error for the
//! caller to log, and a record with a missing field is reported on its own so the other
//! records can still be processed.

use percent_encoding::percent_decode_str;
use serde_json::Value;

/// One storage-object-created event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub bucket_name: String,
    /// Decoded object key.
    pub object_key: String,
    pub event_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("notification has no 'Records' field")]
    MissingRecords,
    #[error("notification 'Records' field is not a list")]
    RecordsNotAList,
    #[error("record {index} has no '{field}'")]
    MissingField { index: usize, field: &'static str },
}

/// Extracts the records of a notification in delivery order.
///
/// The outer error means there is nothing to process. Each inner result is one record.
pub fn parse_records(
    event: &Value,
) -> Result<Vec<Result<NotificationRecord, NotificationError>>, NotificationError> {
    let records = event
        .get("Records")
        .ok_or(NotificationError::MissingRecords)?
        .as_array()
        .ok_or(NotificationError::RecordsNotAList)?;

    Ok(records
        .iter()
        .enumerate()
        .map(|(index, record)| parse_record(index, record))
        .collect())
}

fn parse_record(index: usize, record: &Value) -> Result<NotificationRecord, NotificationError> {
    let bucket_name = record
        .pointer("/s3/bucket/name")
        .and_then(Value::as_str)
        .ok_or(NotificationError::MissingField {
            index,
            field: "s3.bucket.name",
        })?;
    let raw_key = record
        .pointer("/s3/object/key")
        .and_then(Value::as_str)
        .ok_or(NotificationError::MissingField {
            index,
            field: "s3.object.key",
        })?;
    let event_name = record
        .get("eventName")
        .and_then(Value::as_str)
        .map(str::to_owned);

    Ok(NotificationRecord {
        bucket_name: bucket_name.to_owned(),
        object_key: decode_key(raw_key),
        event_name,
    })
}

/// S3 form-encodes keys in notifications: `+` for space and `%XX` escapes.
/// Keys that do not decode to valid UTF-8 are returned unchanged.
pub fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match percent_decode_str(&spaced).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_owned(),
    }
}
