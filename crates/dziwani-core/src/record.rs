//! Project rows as returned by the store.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One result row, keyed by the column alias used in the SELECT.
pub type Row = serde_json::Map<String, Value>;

/// A single project, keyed by the aliases of the detail query.
///
/// Every field is optional: the catalog is maintained by hand and gaps are
/// common. Missing values are rendered as "Not available", never as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectRecord {
    pub project_name: Option<String>,
    pub project_code: Option<String>,
    pub project_sector: Option<String>,
    pub status: Option<String>,
    pub stage: Option<String>,
    pub region: Option<String>,
    pub district: Option<String>,
    #[serde(alias = "traditionalauthority")]
    pub traditional_authority: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_budget: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    pub total_expenditure: Option<f64>,
    pub funding_source: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub start_date: Option<String>,
    pub completion_date: Option<String>,
    pub last_monitoring_visit: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    pub completion_progress: Option<f64>,
    pub contractor: Option<String>,
    pub contract_signing_date: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub fiscal_year: Option<String>,
}

impl ProjectRecord {
    /// Decode a store row. Unknown columns are ignored.
    pub fn from_row(row: &Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(row.clone()))
    }
}

/// Read a number from a JSON number, a numeric string, or null.
///
/// Blank and unparseable strings read as missing rather than failing the row.
pub fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse().ok(),
        _ => None,
    })
}

/// Read text from a string or number; blank strings read as missing.
pub fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
