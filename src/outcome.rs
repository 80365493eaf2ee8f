use crate::foundation::error::CutlineResult;

/// Discriminated result handed across the public boundary.
///
/// Serializes as `{"ok": true, ...payload}` or `{"ok": false, "message": "..."}`. Struct payloads
/// are flattened next to `ok`; other payloads land under `value`.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    /// Success with a payload.
    Ok(T),
    /// Failure with a human-readable message.
    Err {
        /// Error display text.
        message: String,
    },
}

impl<T> Outcome<T> {
    /// Return `true` on success.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// Convert back into a plain result carrying the message.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Ok(v) => Ok(v),
            Self::Err { message } => Err(message),
        }
    }
}

impl<T> From<CutlineResult<T>> for Outcome<T> {
    fn from(result: CutlineResult<T>) -> Self {
        match result {
            Ok(v) => Self::Ok(v),
            Err(e) => Self::Err {
                message: e.to_string(),
            },
        }
    }
}

impl<T: serde::Serialize> serde::Serialize for Outcome<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{Error as _, SerializeMap as _};

        match self {
            Self::Ok(v) => {
                let value = serde_json::to_value(v).map_err(S::Error::custom)?;
                match value {
                    serde_json::Value::Object(fields) => {
                        let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                        map.serialize_entry("ok", &true)?;
                        for (k, v) in &fields {
                            if k != "ok" {
                                map.serialize_entry(k, v)?;
                            }
                        }
                        map.end()
                    }
                    serde_json::Value::Null => {
                        let mut map = serializer.serialize_map(Some(1))?;
                        map.serialize_entry("ok", &true)?;
                        map.end()
                    }
                    other => {
                        let mut map = serializer.serialize_map(Some(2))?;
                        map.serialize_entry("ok", &true)?;
                        map.serialize_entry("value", &other)?;
                        map.end()
                    }
                }
            }
            Self::Err { message } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("ok", &false)?;
                map.serialize_entry("message", message)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/outcome.rs"]
mod tests;
