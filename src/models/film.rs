//! Film record and its validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// A film and its award counts for one year.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Film {
    /// Film title, trimmed
    pub title: String,

    /// Ceremony year
    pub year: i32,

    /// Number of awards won
    pub awards: u32,

    /// Number of nominations
    pub nominations: u32,

    /// Whether the film won Best Picture
    #[serde(default)]
    pub best_picture: bool,
}

impl Film {
    /// Build a film from a raw JSON item.
    ///
    /// Fails with a validation error naming the first offending field.
    pub fn from_item(item: &Value) -> Result<Self> {
        let fields = item
            .as_object()
            .ok_or_else(|| AppError::validation("item", "expected a JSON object"))?;

        Ok(Self {
            title: text_field(fields, "title")?.trim().to_string(),
            year: int_field(fields, "year")?,
            awards: count_field(fields, "awards")?,
            nominations: count_field(fields, "nominations")?,
            best_picture: flag_field(fields, "best_picture")?,
        })
    }

    /// Build films from a JSON array payload, preserving source order.
    pub fn from_payload(payload: &str) -> Result<Vec<Self>> {
        let items: Vec<Value> = serde_json::from_str(payload)?;
        items.iter().map(Self::from_item).collect()
    }
}

fn required<'a>(fields: &'a Map<String, Value>, name: &str) -> Result<&'a Value> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(AppError::validation(name, "field required")),
        Some(value) => Ok(value),
    }
}

fn text_field(fields: &Map<String, Value>, name: &str) -> Result<String> {
    match required(fields, name)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(AppError::validation(
            name,
            format!("expected text, got {other}"),
        )),
    }
}

fn int_field(fields: &Map<String, Value>, name: &str) -> Result<i32> {
    let value = required(fields, name)?;
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| AppError::validation(name, format!("expected an integer, got {value}")))
}

fn count_field(fields: &Map<String, Value>, name: &str) -> Result<u32> {
    let n = int_field(fields, name)?;
    u32::try_from(n).map_err(|_| AppError::validation(name, format!("must be non-negative, got {n}")))
}

fn flag_field(fields: &Map<String, Value>, name: &str) -> Result<bool> {
    let Some(value) = fields.get(name) else {
        return Ok(false);
    };

    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
            "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
            _ => Err(AppError::validation(name, format!("expected a boolean, got {value}"))),
        },
        _ => Err(AppError::validation(name, format!("expected a boolean, got {value}"))),
    }
}
