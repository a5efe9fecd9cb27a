//! Row scanning: list-of-map form and serde-driven typed records.
//!
//! The typed path drives each row through a deserializer that applies the
//! scanner coercion rules: numeric→bool (zero is false), integer→string
//! via decimal formatting, bytes→string via UTF-8, and timestamps carried
//! as RFC 3339 text. Column-to-field mapping is the serde field name.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::value::StrDeserializer;
use serde::de::{DeserializeOwned, IntoDeserializer, MapAccess, SeqAccess, Visitor};
use serde::forward_to_deserialize_any;
use sqlrelay_core::{DbError, Maps, QueryResult, Result, Row, Value};
use std::fmt;

/// The timestamp layouts accepted when coercing a string to a time
const TIME_LAYOUTS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];

/// Parse a timestamp from any of the known layouts
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    for layout in TIME_LAYOUTS {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(t.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

/// Coerce a scanned value to a timestamp
pub fn scan_time(value: &Value) -> Result<DateTime<Utc>> {
    match value {
        Value::Time(t) => Ok(*t),
        Value::String(s) => {
            parse_time(s).ok_or_else(|| DbError::conversion(format!("string {:?}", s), "time"))
        }
        Value::Int(secs) => DateTime::from_timestamp(*secs, 0)
            .ok_or_else(|| DbError::conversion(format!("int {}", secs), "time")),
        other => Err(DbError::conversion(other.type_name(), "time")),
    }
}

/// The list-of-map form: each row becomes a column → value map, with byte
/// sequences reinterpreted as UTF-8 strings when valid.
pub fn scan_maps(result: &QueryResult) -> Maps {
    result
        .rows
        .iter()
        .map(|row| {
            row.columns()
                .iter()
                .zip(row.values.iter())
                .map(|(col, value)| {
                    let value = match value {
                        Value::Bytes(b) => match std::str::from_utf8(b) {
                            Ok(s) => Value::String(s.to_string()),
                            Err(_) => value.clone(),
                        },
                        other => other.clone(),
                    };
                    (col.clone(), value)
                })
                .collect()
        })
        .collect()
}

/// Materialize every row into `T`. An empty result yields an empty vector.
pub fn scan<T: DeserializeOwned>(result: &QueryResult) -> Result<Vec<T>> {
    result
        .rows
        .iter()
        .map(|row| {
            T::deserialize(RowDeserializer { row }).map_err(|err| DbError::ConversionFailed {
                from: err.to_string(),
                to: short_type_name::<T>().to_string(),
            })
        })
        .collect()
}

/// Materialize the first row into `T`; an empty result is `not_found`
pub fn scan_one<T: DeserializeOwned>(result: &QueryResult) -> Result<T> {
    let row = result.rows.first().ok_or(DbError::NotFound)?;
    T::deserialize(RowDeserializer { row }).map_err(|err| DbError::ConversionFailed {
        from: err.to_string(),
        to: short_type_name::<T>().to_string(),
    })
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// serde error carrier for the scan deserializer
#[derive(Debug)]
pub struct ScanError(String);

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ScanError {}

impl serde::de::Error for ScanError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        ScanError(msg.to_string())
    }
}

struct RowDeserializer<'de> {
    row: &'de Row,
}

impl<'de> serde::Deserializer<'de> for RowDeserializer<'de> {
    type Error = ScanError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        visitor.visit_map(RowAccess {
            row: self.row,
            idx: 0,
        })
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

struct RowAccess<'de> {
    row: &'de Row,
    idx: usize,
}

impl<'de> MapAccess<'de> for RowAccess<'de> {
    type Error = ScanError;

    fn next_key_seed<K>(&mut self, seed: K) -> std::result::Result<Option<K::Value>, ScanError>
    where
        K: serde::de::DeserializeSeed<'de>,
    {
        if self.idx >= self.row.columns().len() {
            return Ok(None);
        }
        let key: StrDeserializer<'_, ScanError> =
            self.row.columns()[self.idx].as_str().into_deserializer();
        seed.deserialize(key).map(Some)
    }

    fn next_value_seed<S>(&mut self, seed: S) -> std::result::Result<S::Value, ScanError>
    where
        S: serde::de::DeserializeSeed<'de>,
    {
        let value = &self.row.values[self.idx];
        self.idx += 1;
        seed.deserialize(ValueDeserializer { value })
    }
}

struct ValueDeserializer<'de> {
    value: &'de Value,
}

impl<'de> ValueDeserializer<'de> {
    fn fail<T>(&self, to: &str) -> std::result::Result<T, ScanError> {
        Err(ScanError(format!(
            "cannot convert {} to {}",
            self.value.type_name(),
            to
        )))
    }

    fn to_i64(&self) -> std::result::Result<i64, ScanError> {
        match self.value {
            Value::Int(n) => Ok(*n),
            Value::Uint(n) => i64::try_from(*n)
                .map_err(|_| ScanError(format!("uint {} overflows i64", n))),
            Value::Float(f) => Ok(*f as i64),
            Value::Bool(b) => Ok(*b as i64),
            Value::String(s) => s
                .parse::<i64>()
                .map_err(|_| ScanError(format!("cannot convert string {:?} to int", s))),
            _ => Err(ScanError(format!(
                "cannot convert {} to int",
                self.value.type_name()
            ))),
        }
    }

    fn to_u64(&self) -> std::result::Result<u64, ScanError> {
        match self.value {
            Value::Uint(n) => Ok(*n),
            Value::Int(n) => u64::try_from(*n)
                .map_err(|_| ScanError(format!("negative int {} for uint", n))),
            Value::Bool(b) => Ok(*b as u64),
            Value::String(s) => s
                .parse::<u64>()
                .map_err(|_| ScanError(format!("cannot convert string {:?} to uint", s))),
            _ => Err(ScanError(format!(
                "cannot convert {} to uint",
                self.value.type_name()
            ))),
        }
    }
}

macro_rules! de_signed {
    ($($method:ident => $visit:ident as $t:ty),*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
            visitor.$visit(self.to_i64()? as $t)
        }
    )*};
}

macro_rules! de_unsigned {
    ($($method:ident => $visit:ident as $t:ty),*) => {$(
        fn $method<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
            visitor.$visit(self.to_u64()? as $t)
        }
    )*};
}

impl<'de> serde::Deserializer<'de> for ValueDeserializer<'de> {
    type Error = ScanError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Int(n) => visitor.visit_i64(*n),
            Value::Uint(n) => visitor.visit_u64(*n),
            Value::Float(f) => visitor.visit_f64(*f),
            Value::String(s) => visitor.visit_str(s),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => visitor.visit_str(s),
                Err(_) => visitor.visit_bytes(b),
            },
            Value::Time(t) => visitor.visit_string(t.to_rfc3339()),
            Value::Json(j) => json_any(j, visitor),
            Value::Named { value, .. } => ValueDeserializer { value }.deserialize_any(visitor),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.value {
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Int(n) => visitor.visit_bool(*n != 0),
            Value::Uint(n) => visitor.visit_bool(*n != 0),
            Value::Float(f) => visitor.visit_bool(*f != 0.0),
            Value::String(s) => match s.as_str() {
                "1" | "true" | "TRUE" => visitor.visit_bool(true),
                "0" | "false" | "FALSE" => visitor.visit_bool(false),
                _ => self.fail("bool"),
            },
            _ => self.fail("bool"),
        }
    }

    de_signed! {
        deserialize_i8 => visit_i8 as i8,
        deserialize_i16 => visit_i16 as i16,
        deserialize_i32 => visit_i32 as i32,
        deserialize_i64 => visit_i64 as i64
    }

    de_unsigned! {
        deserialize_u8 => visit_u8 as u8,
        deserialize_u16 => visit_u16 as u16,
        deserialize_u32 => visit_u32 as u32,
        deserialize_u64 => visit_u64 as u64
    }

    fn deserialize_i128<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        visitor.visit_i128(self.to_i64()? as i128)
    }

    fn deserialize_u128<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        visitor.visit_u128(self.to_u64()? as u128)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        self.deserialize_f64(visitor)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.value.as_f64() {
            Some(f) => visitor.visit_f64(f),
            None => self.fail("float"),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.value {
            Value::String(s) => visitor.visit_str(s),
            Value::Int(n) => visitor.visit_string(n.to_string()),
            Value::Uint(n) => visitor.visit_string(n.to_string()),
            Value::Float(f) => visitor.visit_string(f.to_string()),
            Value::Bool(b) => visitor.visit_string(b.to_string()),
            Value::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => visitor.visit_str(s),
                Err(_) => self.fail("string"),
            },
            Value::Time(t) => visitor.visit_string(t.to_rfc3339()),
            Value::Json(j) => visitor.visit_string(j.to_string()),
            _ => self.fail("string"),
        }
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        self.deserialize_str(visitor)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.value {
            Value::Bytes(b) => visitor.visit_bytes(b),
            Value::String(s) => visitor.visit_bytes(s.as_bytes()),
            _ => self.fail("bytes"),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            _ => self.fail("unit"),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> std::result::Result<V::Value, ScanError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.value {
            Value::Json(j) => json_any(j, visitor),
            _ => self.fail("sequence"),
        }
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.value {
            Value::Json(j) => json_any(j, visitor),
            _ => self.fail("map"),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> std::result::Result<V::Value, ScanError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> std::result::Result<V::Value, ScanError> {
        match self.value {
            Value::String(s) => {
                let variant: StrDeserializer<'_, ScanError> = s.as_str().into_deserializer();
                visitor.visit_enum(variant)
            }
            _ => self.fail("enum"),
        }
    }

    forward_to_deserialize_any! {
        char tuple tuple_struct unit_struct identifier ignored_any
    }
}

/// Drive a visitor from a JSON value (nested JSON columns)
fn json_any<'de, V: Visitor<'de>>(
    j: &'de serde_json::Value,
    visitor: V,
) -> std::result::Result<V::Value, ScanError> {
    match j {
        serde_json::Value::Null => visitor.visit_unit(),
        serde_json::Value::Bool(b) => visitor.visit_bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                visitor.visit_i64(i)
            } else if let Some(u) = n.as_u64() {
                visitor.visit_u64(u)
            } else {
                visitor.visit_f64(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => visitor.visit_str(s),
        serde_json::Value::Array(items) => visitor.visit_seq(JsonSeqAccess { iter: items.iter() }),
        serde_json::Value::Object(map) => visitor.visit_map(JsonMapAccess {
            iter: map.iter(),
            value: None,
        }),
    }
}

struct JsonDeserializer<'de> {
    json: &'de serde_json::Value,
}

impl<'de> serde::Deserializer<'de> for JsonDeserializer<'de> {
    type Error = ScanError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        json_any(self.json, visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> std::result::Result<V::Value, ScanError> {
        match self.json {
            serde_json::Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}

struct JsonSeqAccess<'de> {
    iter: std::slice::Iter<'de, serde_json::Value>,
}

impl<'de> SeqAccess<'de> for JsonSeqAccess<'de> {
    type Error = ScanError;

    fn next_element_seed<S>(&mut self, seed: S) -> std::result::Result<Option<S::Value>, ScanError>
    where
        S: serde::de::DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some(json) => seed.deserialize(JsonDeserializer { json }).map(Some),
            None => Ok(None),
        }
    }
}

struct JsonMapAccess<'de> {
    iter: serde_json::map::Iter<'de>,
    value: Option<&'de serde_json::Value>,
}

impl<'de> MapAccess<'de> for JsonMapAccess<'de> {
    type Error = ScanError;

    fn next_key_seed<K>(&mut self, seed: K) -> std::result::Result<Option<K::Value>, ScanError>
    where
        K: serde::de::DeserializeSeed<'de>,
    {
        match self.iter.next() {
            Some((key, value)) => {
                self.value = Some(value);
                let key: StrDeserializer<'_, ScanError> = key.as_str().into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<S>(&mut self, seed: S) -> std::result::Result<S::Value, ScanError>
    where
        S: serde::de::DeserializeSeed<'de>,
    {
        let json = self
            .value
            .take()
            .ok_or_else(|| ScanError("value requested before key".to_string()))?;
        seed.deserialize(JsonDeserializer { json })
    }
}
