// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed values for the progressive scanner and the watch engine.
//!
//! Integers and floats travel little-endian; `utf8` values are raw bytes of
//! the configured width.  Comparison semantics follow the scanner contract:
//! byte-wise equality for `utf8`, numeric equality and ordering otherwise.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::protocol::AgentFault;

/// Wire value types accepted by `memory_value_scan_start` and
/// `memory_watch_add`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    Float,
    Double,
    Utf8,
}

/// A concrete value read from, or searched for in, target memory.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Bytes(Vec<u8>),
}

impl ValueType {
    /// Fixed byte width, or `None` for `utf8` (width comes from the needle).
    pub fn width(&self) -> Option<usize> {
        match self {
            Self::S8 | Self::U8 => Some(1),
            Self::S16 | Self::U16 => Some(2),
            Self::S32 | Self::U32 | Self::Float => Some(4),
            Self::S64 | Self::U64 | Self::Double => Some(8),
            Self::Utf8 => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S8 => "s8",
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::U16 => "u16",
            Self::S32 => "s32",
            Self::U32 => "u32",
            Self::S64 => "s64",
            Self::U64 => "u64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Utf8 => "utf8",
        }
    }

    /// Parse a request-supplied value (JSON string or number) into a typed
    /// [`ScanValue`], range-checked for the integer widths.
    pub fn parse_value(&self, raw: &Value) -> Result<ScanValue, AgentFault> {
        let text = match raw {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(AgentFault::new(format!(
                    "invalid {} value: {other}",
                    self.as_str()
                )))
            }
        };
        let bad = || AgentFault::new(format!("invalid {} value: {text:?}", self.as_str()));
        match self {
            Self::S8 => text.parse::<i8>().map(|v| ScanValue::Signed(v as i64)).map_err(|_| bad()),
            Self::S16 => text.parse::<i16>().map(|v| ScanValue::Signed(v as i64)).map_err(|_| bad()),
            Self::S32 => text.parse::<i32>().map(|v| ScanValue::Signed(v as i64)).map_err(|_| bad()),
            Self::S64 => text.parse::<i64>().map(ScanValue::Signed).map_err(|_| bad()),
            Self::U8 => text.parse::<u8>().map(|v| ScanValue::Unsigned(v as u64)).map_err(|_| bad()),
            Self::U16 => {
                text.parse::<u16>().map(|v| ScanValue::Unsigned(v as u64)).map_err(|_| bad())
            }
            Self::U32 => {
                text.parse::<u32>().map(|v| ScanValue::Unsigned(v as u64)).map_err(|_| bad())
            }
            Self::U64 => text.parse::<u64>().map(ScanValue::Unsigned).map_err(|_| bad()),
            Self::Float | Self::Double => {
                text.parse::<f64>().map(ScanValue::Float).map_err(|_| bad())
            }
            Self::Utf8 => {
                if text.is_empty() {
                    return Err(bad());
                }
                Ok(ScanValue::Bytes(text.into_bytes()))
            }
        }
    }

    /// Little-endian encoding of a value of this type.
    pub fn encode(&self, value: &ScanValue) -> Vec<u8> {
        match (self, value) {
            (Self::S8, ScanValue::Signed(v)) => (*v as i8).to_le_bytes().to_vec(),
            (Self::S16, ScanValue::Signed(v)) => (*v as i16).to_le_bytes().to_vec(),
            (Self::S32, ScanValue::Signed(v)) => (*v as i32).to_le_bytes().to_vec(),
            (Self::S64, ScanValue::Signed(v)) => v.to_le_bytes().to_vec(),
            (Self::U8, ScanValue::Unsigned(v)) => (*v as u8).to_le_bytes().to_vec(),
            (Self::U16, ScanValue::Unsigned(v)) => (*v as u16).to_le_bytes().to_vec(),
            (Self::U32, ScanValue::Unsigned(v)) => (*v as u32).to_le_bytes().to_vec(),
            (Self::U64, ScanValue::Unsigned(v)) => v.to_le_bytes().to_vec(),
            (Self::Float, ScanValue::Float(v)) => (*v as f32).to_le_bytes().to_vec(),
            (Self::Double, ScanValue::Float(v)) => v.to_le_bytes().to_vec(),
            (Self::Utf8, ScanValue::Bytes(b)) => b.clone(),
            // Mismatched pairings cannot be produced by parse_value/decode.
            _ => Vec::new(),
        }
    }

    /// Decode `width` little-endian bytes into a typed value.  Returns `None`
    /// when the slice is shorter than the type requires.
    pub fn decode(&self, bytes: &[u8]) -> Option<ScanValue> {
        match self {
            Self::S8 => bytes.first().map(|&b| ScanValue::Signed(b as i8 as i64)),
            Self::U8 => bytes.first().map(|&b| ScanValue::Unsigned(b as u64)),
            Self::S16 => le_array::<2>(bytes).map(|a| ScanValue::Signed(i16::from_le_bytes(a) as i64)),
            Self::U16 => le_array::<2>(bytes).map(|a| ScanValue::Unsigned(u16::from_le_bytes(a) as u64)),
            Self::S32 => le_array::<4>(bytes).map(|a| ScanValue::Signed(i32::from_le_bytes(a) as i64)),
            Self::U32 => le_array::<4>(bytes).map(|a| ScanValue::Unsigned(u32::from_le_bytes(a) as u64)),
            Self::S64 => le_array::<8>(bytes).map(|a| ScanValue::Signed(i64::from_le_bytes(a))),
            Self::U64 => le_array::<8>(bytes).map(|a| ScanValue::Unsigned(u64::from_le_bytes(a))),
            Self::Float => le_array::<4>(bytes).map(|a| ScanValue::Float(f32::from_le_bytes(a) as f64)),
            Self::Double => le_array::<8>(bytes).map(|a| ScanValue::Float(f64::from_le_bytes(a))),
            Self::Utf8 => {
                if bytes.is_empty() {
                    None
                } else {
                    Some(ScanValue::Bytes(bytes.to_vec()))
                }
            }
        }
    }
}

fn le_array<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}

impl ScanValue {
    /// JSON rendering for responses and events.  Byte values render as a
    /// lossy UTF-8 string.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Signed(v) => json!(v),
            Self::Unsigned(v) => json!(v),
            Self::Float(v) => json!(v),
            Self::Bytes(b) => json!(String::from_utf8_lossy(b)),
        }
    }

    /// Ordering for the `increased` / `decreased` conditions.  `None` for
    /// byte values and for NaN comparisons.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Signed(a), Self::Signed(b)) => Some(a.cmp(b)),
            (Self::Unsigned(a), Self::Unsigned(b)) => Some(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
