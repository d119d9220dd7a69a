//! Field extraction and value mapping for array JSON
//!
//! Absent and null fields yield `None` so collectors skip the sample instead
//! of reporting a zero that would be indistinguishable from a real one.

use serde_json::Value;

/// Mapping from a categorical status string to a numeric code
#[derive(Debug, Clone, Copy)]
pub struct StatusTable {
    pub field: &'static str,
    pub codes: &'static [(&'static str, f64)],
    /// Code for any string not listed in `codes`
    pub fallback: f64,
}

impl StatusTable {
    pub fn code(&self, status: &str) -> f64 {
        self.codes
            .iter()
            .find(|(name, _)| *name == status)
            .map(|(_, code)| *code)
            .unwrap_or(self.fallback)
    }

    /// Map a JSON value; strings and booleans are compared by their text form
    pub fn map_value(&self, value: &Value) -> f64 {
        match value {
            Value::String(s) => self.code(s),
            Value::Bool(b) => self.code(if *b { "true" } else { "false" }),
            Value::Number(n) => self.code(&n.to_string()),
            _ => self.fallback,
        }
    }
}

pub const CLUSTER_STATE: StatusTable = StatusTable {
    field: "cluster_state",
    codes: &[("Configured", 1.0)],
    fallback: 0.0,
};

pub const LIFECYCLE_STATE: StatusTable = StatusTable {
    field: "lifecycle_state",
    codes: &[("Healthy", 1.0)],
    fallback: 0.0,
};

pub const OPERATIONAL_STATUS: StatusTable = StatusTable {
    field: "operational_status",
    codes: &[("Started", 1.0)],
    fallback: 0.0,
};

pub const LINK_UP: StatusTable = StatusTable {
    field: "is_link_up",
    codes: &[("true", 1.0), ("false", 0.0)],
    fallback: 0.0,
};

pub const VOLUME_STATE: StatusTable = StatusTable {
    field: "state",
    codes: &[("Ready", 1.0)],
    fallback: 0.0,
};

const TABLES: [StatusTable; 5] = [CLUSTER_STATE, LIFECYCLE_STATE, OPERATIONAL_STATUS, LINK_UP, VOLUME_STATE];

/// Look up the status table registered for a field key
pub fn status_table(field: &str) -> Option<&'static StatusTable> {
    TABLES.iter().find(|t| t.field == field)
}

/// Numeric value for `key` given its raw value: mapped through the status
/// table when one exists, otherwise read as a number.
pub fn float_data(key: &str, value: &Value) -> Option<f64> {
    match status_table(key) {
        Some(table) if !value.is_null() => Some(table.map_value(value)),
        Some(_) => None,
        None => as_f64(value),
    }
}

/// Present, non-null field of an object
pub fn field<'a>(object: &'a Value, key: &str) -> Option<&'a Value> {
    object.get(key).filter(|v| !v.is_null())
}

/// Numeric field; numeric strings are accepted, anything else is a miss
pub fn field_f64(object: &Value, key: &str) -> Option<f64> {
    field(object, key).and_then(as_f64)
}

/// Text form of a field for use as a label value; absent or null gives ""
pub fn field_label(object: &Value, key: &str) -> String {
    match field(object, key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Parse a port speed such as `"25_Gbps"` into its leading number.
///
/// Null or absent speeds read as 0. A value without a numeric prefix is
/// malformed and yields `None`.
pub fn parse_speed(value: Option<&Value>) -> Option<f64> {
    let text = match value {
        None | Some(Value::Null) => return Some(0.0),
        Some(Value::String(s)) => s.as_str(),
        Some(Value::Number(n)) => return n.as_f64(),
        Some(_) => return None,
    };

    let prefix = text.split('_').next().unwrap_or_default();
    prefix.trim().parse::<i64>().ok().map(|speed| speed as f64)
}
