//! MySQL column decoding into JSON.
//!
//! Decoding is two-phase: `categorize_type` maps the driver's type name to a
//! `TypeCategory`, then a per-category decoder pulls the value out of the row.
//! Values that cannot be decoded become `null` and are logged, so one odd
//! column never fails a whole result set.

use crate::models::Row as JsonRow;
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::{Column, Decode, Row, Type, TypeInfo};

/// Logical category for MySQL column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Temporal,
    Text,
    Binary,
    Json,
}

/// Classify a MySQL type name into a logical category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal first; "numeric" would otherwise never be reached
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }

    // Temporal before integer so that "time"/"datetime" never match "int"
    if matches!(lower.as_str(), "datetime" | "timestamp" | "date" | "time") {
        return TypeCategory::Temporal;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower == "year" {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bit" {
        return TypeCategory::Binary;
    }

    // varchar, char, text, enum, set and anything unrecognised
    TypeCategory::Text
}

/// Raw DECIMAL text, kept exact instead of going through f64.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary payloads are returned as UTF-8 text when valid, base64 otherwise.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    match std::str::from_utf8(bytes) {
        Ok(s) => JsonValue::String(s.to_string()),
        Err(_) => JsonValue::String(STANDARD.encode(bytes)),
    }
}

/// Convert a driver row into a column-ordered JSON object.
pub trait RowToJson {
    fn to_json_map(&self) -> JsonRow;
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> JsonRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let value = decode_column(self, idx, categorize_type(type_name));
                (col.name().to_string(), value)
            })
            .collect()
    }
}

fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> JsonValue {
    match category {
        TypeCategory::Decimal => decode_decimal(row, idx),
        TypeCategory::Integer => decode_integer(row, idx),
        TypeCategory::Boolean => decode_boolean(row, idx),
        TypeCategory::Float => decode_float(row, idx),
        TypeCategory::Temporal => decode_temporal(row, idx),
        TypeCategory::Binary => decode_binary_col(row, idx),
        TypeCategory::Json => decode_json(row, idx),
        TypeCategory::Text => decode_text(row, idx),
    }
}

fn decode_decimal(row: &MySqlRow, idx: usize) -> JsonValue {
    match row.try_get::<Option<RawDecimal>, _>(idx) {
        Ok(Some(v)) => JsonValue::String(v.0),
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::error!(column = idx, error = ?e, "Failed to decode DECIMAL");
            JsonValue::Null
        }
    }
}

/// Read a column as `T`, or `None` when `T` does not match the wire type.
fn try_number<T>(row: &MySqlRow, idx: usize) -> Option<JsonValue>
where
    T: for<'r> Decode<'r, sqlx::MySql> + Type<sqlx::MySql>,
    JsonValue: From<T>,
{
    row.try_get::<Option<T>, _>(idx)
        .ok()
        .map(|v| v.map_or(JsonValue::Null, JsonValue::from))
}

fn decode_integer(row: &MySqlRow, idx: usize) -> JsonValue {
    // Unsigned columns only decode as unsigned; YEAR only as 16-bit
    try_number::<i64>(row, idx)
        .or_else(|| try_number::<u64>(row, idx))
        .or_else(|| try_number::<u16>(row, idx))
        .or_else(|| try_number::<i16>(row, idx))
        .unwrap_or_else(|| decode_text(row, idx))
}

fn decode_boolean(row: &MySqlRow, idx: usize) -> JsonValue {
    row.try_get::<Option<bool>, _>(idx)
        .ok()
        .flatten()
        .map(JsonValue::Bool)
        .unwrap_or(JsonValue::Null)
}

fn decode_float(row: &MySqlRow, idx: usize) -> JsonValue {
    match row.try_get::<Option<f64>, _>(idx) {
        Ok(v) => v.map_or(JsonValue::Null, float_value),
        Err(_) => row
            .try_get::<Option<f32>, _>(idx)
            .ok()
            .flatten()
            .map_or(JsonValue::Null, |v| float_value(f64::from(v))),
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Temporal values are rendered as MySQL's own text form.
fn decode_temporal(row: &MySqlRow, idx: usize) -> JsonValue {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return v
            .map(|dt| JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return v
            .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(idx) {
        return v
            .map(|t| JsonValue::String(t.format("%H:%M:%S%.f").to_string()))
            .unwrap_or(JsonValue::Null);
    }
    // Zero dates and negative TIME values do not fit chrono
    decode_text(row, idx)
}

fn decode_binary_col(row: &MySqlRow, idx: usize) -> JsonValue {
    row.try_get::<Option<Vec<u8>>, _>(idx)
        .ok()
        .flatten()
        .map(|v| decode_binary_value(&v))
        .unwrap_or(JsonValue::Null)
}

fn decode_json(row: &MySqlRow, idx: usize) -> JsonValue {
    row.try_get::<Option<JsonValue>, _>(idx)
        .ok()
        .flatten()
        .unwrap_or(JsonValue::Null)
}

fn decode_text(row: &MySqlRow, idx: usize) -> JsonValue {
    match row.try_get::<Option<String>, _>(idx) {
        Ok(Some(v)) => JsonValue::String(v),
        Ok(None) => JsonValue::Null,
        Err(_) => match row.try_get_unchecked::<Option<Vec<u8>>, _>(idx) {
            Ok(Some(bytes)) => decode_binary_value(&bytes),
            Ok(None) => JsonValue::Null,
            Err(e) => {
                tracing::warn!(column = idx, error = ?e, "Undecodable column value");
                JsonValue::Null
            }
        },
    }
}
