//! Conversion of ad-hoc SQLite rows into JSON objects.
//!
//! Values are decoded by their runtime storage class rather than the
//! declared column type, so expression columns such as `SUM(amount)` keep
//! their numbers.

use sea_orm::JsonValue;
use sea_orm::sqlx::sqlite::SqliteRow;
use sea_orm::sqlx::{Column, Row, TypeInfo, ValueRef};
use serde_json::{Map, Number};

pub fn row_to_json(row: &SqliteRow) -> Result<JsonValue, sea_orm::sqlx::Error> {
    let mut object = Map::with_capacity(row.columns().len());

    for column in row.columns() {
        let index = column.ordinal();
        let storage_class = {
            let raw = row.try_get_raw(index)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            }
        };
        let declared_bool = column.type_info().name().eq_ignore_ascii_case("BOOLEAN");

        let value = match storage_class.as_deref() {
            None => JsonValue::Null,
            Some("INTEGER") if declared_bool => JsonValue::Bool(row.try_get::<i64, _>(index)? != 0),
            Some("INTEGER" | "BOOLEAN") => JsonValue::from(row.try_get::<i64, _>(index)?),
            Some("REAL") => Number::from_f64(row.try_get::<f64, _>(index)?)
                .map_or(JsonValue::Null, JsonValue::Number),
            Some("BLOB") => {
                let bytes: Vec<u8> = row.try_get(index)?;
                String::from_utf8(bytes).map_or_else(
                    |e| JsonValue::from(e.into_bytes()),
                    JsonValue::String,
                )
            }
            Some(_) => JsonValue::String(row.try_get::<String, _>(index)?),
        };

        object.insert(column.name().to_string(), value);
    }

    Ok(JsonValue::Object(object))
}
