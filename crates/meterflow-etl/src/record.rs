//! Source records and the tabular rows they map to.
//!
//! The public feed serves flat JSON objects with camelCase keys. The
//! destination table keeps ten of those columns, all text; everything else
//! (meter location, zone geometry, restriction metadata) is dropped by the
//! transform. The mapping is pure: the same batch always produces the same
//! rows, in the same order.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Column names of the destination table, in CREATE TABLE order.
///
/// These double as the CSV header. Postgres folds the unquoted identifiers
/// to lowercase; the CSV load skips the header row, so the spelling only has
/// to be stable, not case-matched.
pub const COLUMNS: [&str; 10] = [
    "startDtm",
    "endDtm",
    "transactionAmt",
    "paymentTypeName",
    "transactionStatusCode",
    "maxHoursCnt",
    "meterTypeDsc",
    "dollarPerHourRate",
    "activeStatusInd",
    "metroAreaName",
];

/// One transaction as served by the feed.
///
/// Only the key and the columns the destination schema keeps are modeled;
/// serde discards the rest of the payload (source codes, meter ids, zone
/// numbers, coordinates, restriction text), which is the "drop irrelevant
/// columns" half of the transform.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    /// Unique transaction key. Identifies the record upstream; not loaded.
    #[serde(deserialize_with = "scalar_to_string")]
    pub parking_transaction_key: String,

    #[serde(deserialize_with = "scalar_to_string")]
    pub start_dtm: String,
    #[serde(deserialize_with = "scalar_to_string")]
    pub end_dtm: String,
    #[serde(deserialize_with = "scalar_to_string")]
    pub transaction_amt: String,
    #[serde(deserialize_with = "scalar_to_string")]
    pub payment_type_name: String,
    #[serde(deserialize_with = "scalar_to_string")]
    pub transaction_status_code: String,
    #[serde(deserialize_with = "scalar_to_string")]
    pub max_hours_cnt: String,
    #[serde(deserialize_with = "scalar_to_string")]
    pub meter_type_dsc: String,
    #[serde(deserialize_with = "scalar_to_string")]
    pub dollar_per_hour_rate: String,
    #[serde(deserialize_with = "scalar_to_string")]
    pub active_status_ind: String,
    #[serde(deserialize_with = "scalar_to_string")]
    pub metro_area_name: String,
}

impl RawTransaction {
    /// Map this record into its destination row.
    pub fn into_row(self) -> TransactionRow {
        TransactionRow {
            start_dtm: self.start_dtm,
            end_dtm: self.end_dtm,
            transaction_amt: self.transaction_amt,
            payment_type_name: self.payment_type_name,
            transaction_status_code: self.transaction_status_code,
            max_hours_cnt: self.max_hours_cnt,
            meter_type_dsc: self.meter_type_dsc,
            dollar_per_hour_rate: self.dollar_per_hour_rate,
            active_status_ind: self.active_status_ind,
            metro_area_name: self.metro_area_name,
        }
    }
}

/// One row of the destination table. Field order matches [`COLUMNS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRow {
    pub start_dtm: String,
    pub end_dtm: String,
    pub transaction_amt: String,
    pub payment_type_name: String,
    pub transaction_status_code: String,
    pub max_hours_cnt: String,
    pub meter_type_dsc: String,
    pub dollar_per_hour_rate: String,
    pub active_status_ind: String,
    pub metro_area_name: String,
}

impl TransactionRow {
    /// Field values in column order.
    pub fn fields(&self) -> [&str; 10] {
        [
            &self.start_dtm,
            &self.end_dtm,
            &self.transaction_amt,
            &self.payment_type_name,
            &self.transaction_status_code,
            &self.max_hours_cnt,
            &self.meter_type_dsc,
            &self.dollar_per_hour_rate,
            &self.active_status_ind,
            &self.metro_area_name,
        ]
    }
}

/// Transform a batch of raw records into destination rows, preserving order.
pub fn transform_batch(records: Vec<RawTransaction>) -> Vec<TransactionRow> {
    records.into_iter().map(RawTransaction::into_row).collect()
}

/// Accept any JSON scalar where the table expects text.
///
/// The feed is inconsistent about amounts and rates: some deployments serve
/// them as strings, some as numbers. Every destination column is TEXT, so
/// both are stringified here. Null and composite values are still rejected.
fn scalar_to_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a scalar value, got: {other}"
        ))),
    }
}
