//! Response shaping: serialized entities, no envelope.

use crate::store::Record;
use serde_json::Value;

pub fn serialize_one(record: &Record) -> Value {
    record.to_json()
}

pub fn serialize_many(records: &[Record]) -> Value {
    Value::Array(records.iter().map(Record::to_json).collect())
}

/// Destroy-style shaping: an exactly-one result collapses to the bare
/// object, anything else stays a sequence.
pub fn serialize_one_or_many(records: &[Record]) -> Value {
    match records {
        [single] => serialize_one(single),
        _ => serialize_many(records),
    }
}
