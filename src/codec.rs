//! Per-field codecs translating between the user-facing attribute tree and
//! the wire JSON shape.
//!
//! Encoding omits a field when its value is the zero value and the field does
//! not opt into `send_zero`; fields the caller never set are not encoded at
//! all. Decoding skips malformed or empty nested objects returned by the
//! remote side rather than failing, since partially-populated responses are a
//! fact of life.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::EngineError;
use crate::spec::{FieldDef, Mutability, ResourceSpec};
use crate::state::{DesiredState, RemoteState};
use crate::value::{FieldKind, FieldSet, FieldValue};

/// Bidirectional transform between a user value and its wire JSON form.
pub trait FieldCodec: Send + Sync {
    /// Converts a user value to the wire representation.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the value has the wrong shape for this
    /// codec.
    fn encode(&self, value: &FieldValue) -> Result<serde_json::Value, CodecError>;

    /// Converts a wire value back to the user representation.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the wire value cannot be interpreted.
    fn decode(&self, value: &serde_json::Value) -> Result<FieldValue, CodecError>;
}

/// Errors raised by individual codecs.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum CodecError {
    /// Raised when a value does not match the codec's expected shape.
    #[error("expected {expected}, found {found}")]
    Shape {
        /// Shape the codec expected.
        expected: &'static str,
        /// Shape that was actually supplied.
        found: String,
    },
    /// Raised when a wire number does not fit a signed 64-bit integer.
    #[error("integer out of range: {0}")]
    IntRange(String),
}

fn wire_shape(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::from("null"),
        serde_json::Value::Bool(_) => String::from("bool"),
        serde_json::Value::Number(_) => String::from("number"),
        serde_json::Value::String(_) => String::from("string"),
        serde_json::Value::Array(_) => String::from("array"),
        serde_json::Value::Object(_) => String::from("object"),
    }
}

fn user_shape(value: &FieldValue) -> String {
    String::from(value.kind().name())
}

/// Identity codec for scalar fields.
#[derive(Clone, Copy, Debug)]
pub struct ScalarCodec(FieldKind);

impl ScalarCodec {
    /// Creates a scalar codec for the given kind.
    #[must_use]
    pub const fn new(kind: FieldKind) -> Self {
        Self(kind)
    }
}

impl FieldCodec for ScalarCodec {
    fn encode(&self, value: &FieldValue) -> Result<serde_json::Value, CodecError> {
        match (self.0, value) {
            (FieldKind::Str, FieldValue::Str(s)) => Ok(serde_json::Value::String(s.clone())),
            (FieldKind::Bool, FieldValue::Bool(b)) => Ok(serde_json::Value::Bool(*b)),
            (FieldKind::Int, FieldValue::Int(n)) => Ok(serde_json::Value::from(*n)),
            _ => Err(CodecError::Shape {
                expected: self.0.name(),
                found: user_shape(value),
            }),
        }
    }

    fn decode(&self, value: &serde_json::Value) -> Result<FieldValue, CodecError> {
        match (self.0, value) {
            (FieldKind::Str, serde_json::Value::String(s)) => Ok(FieldValue::Str(s.clone())),
            (FieldKind::Bool, serde_json::Value::Bool(b)) => Ok(FieldValue::Bool(*b)),
            (FieldKind::Int, serde_json::Value::Number(n)) => n
                .as_i64()
                .map(FieldValue::Int)
                .ok_or_else(|| CodecError::IntRange(n.to_string())),
            _ => Err(CodecError::Shape {
                expected: self.0.name(),
                found: wire_shape(value),
            }),
        }
    }
}

/// Structural codec for objects and sets.
///
/// Keys translate between snake_case (user) and camelCase (wire)
/// recursively. Encoding omits zero-valued nested attributes; decoding skips
/// nulls, and set decoding additionally drops empty objects coming back from
/// the API.
#[derive(Clone, Copy, Debug)]
pub struct MappedCodec(FieldKind);

impl MappedCodec {
    /// Creates a structural codec for `Object` or `Set` fields.
    #[must_use]
    pub const fn new(kind: FieldKind) -> Self {
        Self(kind)
    }
}

impl FieldCodec for MappedCodec {
    fn encode(&self, value: &FieldValue) -> Result<serde_json::Value, CodecError> {
        match (self.0, value) {
            (FieldKind::Object, FieldValue::Object(_)) | (FieldKind::Set, FieldValue::Set(_)) => {
                encode_nested(value)
            }
            _ => Err(CodecError::Shape {
                expected: self.0.name(),
                found: user_shape(value),
            }),
        }
    }

    fn decode(&self, value: &serde_json::Value) -> Result<FieldValue, CodecError> {
        match (self.0, value) {
            (FieldKind::Object, serde_json::Value::Object(_))
            | (FieldKind::Set, serde_json::Value::Array(_)) => decode_nested(value)?
                .ok_or(CodecError::Shape {
                    expected: self.0.name(),
                    found: String::from("null"),
                }),
            _ => Err(CodecError::Shape {
                expected: self.0.name(),
                found: wire_shape(value),
            }),
        }
    }
}

/// Codec for objects whose keys are user data (labels, annotations) and must
/// not be case-converted.
#[derive(Clone, Copy, Debug)]
pub struct RawObjectCodec;

impl FieldCodec for RawObjectCodec {
    fn encode(&self, value: &FieldValue) -> Result<serde_json::Value, CodecError> {
        let FieldValue::Object(map) = value else {
            return Err(CodecError::Shape {
                expected: "object",
                found: user_shape(value),
            });
        };
        let mut out = serde_json::Map::new();
        for (key, nested) in map {
            out.insert(key.clone(), encode_nested(nested)?);
        }
        Ok(serde_json::Value::Object(out))
    }

    fn decode(&self, value: &serde_json::Value) -> Result<FieldValue, CodecError> {
        let serde_json::Value::Object(entries) = value else {
            return Err(CodecError::Shape {
                expected: "object",
                found: wire_shape(value),
            });
        };
        let mut map = BTreeMap::new();
        for (key, nested) in entries {
            if let Some(decoded) = decode_nested(nested)? {
                map.insert(key.clone(), decoded);
            }
        }
        Ok(FieldValue::Object(map))
    }
}

fn encode_nested(value: &FieldValue) -> Result<serde_json::Value, CodecError> {
    match value {
        FieldValue::Str(s) => Ok(serde_json::Value::String(s.clone())),
        FieldValue::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        FieldValue::Int(n) => Ok(serde_json::Value::from(*n)),
        FieldValue::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, nested) in map {
                if nested.is_zero() {
                    continue;
                }
                out.insert(snake_to_camel(key), encode_nested(nested)?);
            }
            Ok(serde_json::Value::Object(out))
        }
        FieldValue::Set(set) => {
            let mut out = Vec::with_capacity(set.len());
            for item in set {
                out.push(encode_nested(item)?);
            }
            Ok(serde_json::Value::Array(out))
        }
    }
}

fn decode_nested(value: &serde_json::Value) -> Result<Option<FieldValue>, CodecError> {
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::Bool(b) => Ok(Some(FieldValue::Bool(*b))),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(FieldValue::Int)
            .map(Some)
            .ok_or_else(|| CodecError::IntRange(n.to_string())),
        serde_json::Value::String(s) => Ok(Some(FieldValue::Str(s.clone()))),
        serde_json::Value::Object(entries) => {
            let mut map = BTreeMap::new();
            for (key, nested) in entries {
                if let Some(decoded) = decode_nested(nested)? {
                    map.insert(camel_to_snake(key), decoded);
                }
            }
            Ok(Some(FieldValue::Object(map)))
        }
        serde_json::Value::Array(items) => {
            let mut set = FieldSet::new();
            for item in items {
                let Some(decoded) = decode_nested(item)? else {
                    continue;
                };
                // Partially-populated responses can contain empty members.
                if matches!(&decoded, FieldValue::Object(map) if map.is_empty()) {
                    continue;
                }
                set.insert(decoded);
            }
            Ok(Some(FieldValue::Set(set)))
        }
    }
}

pub(crate) fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Registry of per-field codecs layered over the kind defaults.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    overrides: HashMap<String, Arc<dyn FieldCodec>>,
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.overrides.keys().collect();
        names.sort();
        f.debug_struct("CodecRegistry")
            .field("overrides", &names)
            .finish()
    }
}

impl CodecRegistry {
    /// Creates a registry with only the kind-default codecs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom codec for a field, replacing the kind default.
    pub fn register(&mut self, field_name: impl Into<String>, codec: Arc<dyn FieldCodec>) {
        self.overrides.insert(field_name.into(), codec);
    }

    /// Resolves the codec for a field definition.
    #[must_use]
    pub fn codec_for(&self, field: &FieldDef) -> Arc<dyn FieldCodec> {
        if let Some(codec) = self.overrides.get(field.name()) {
            return Arc::clone(codec);
        }
        match field.kind() {
            FieldKind::Str | FieldKind::Bool | FieldKind::Int => {
                Arc::new(ScalarCodec::new(field.kind()))
            }
            FieldKind::Object | FieldKind::Set => Arc::new(MappedCodec::new(field.kind())),
        }
    }

    /// Encodes a single field value, attributing failures to the field.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Codec`] when the codec rejects the value.
    pub fn encode_field(
        &self,
        field: &FieldDef,
        value: &FieldValue,
    ) -> Result<serde_json::Value, EngineError> {
        self.codec_for(field)
            .encode(value)
            .map_err(|err| EngineError::Codec {
                field: field.name().to_owned(),
                message: err.to_string(),
            })
    }

    /// Encodes the explicitly set fields of a desired state into a wire
    /// object, omitting zero values unless the field opts into `send_zero`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when a computed field was set, and
    /// [`EngineError::Codec`] for conversion failures.
    pub fn encode_desired(
        &self,
        spec: &ResourceSpec,
        desired: &DesiredState,
    ) -> Result<serde_json::Map<String, serde_json::Value>, EngineError> {
        let mut body = serde_json::Map::new();
        for field in spec.fields() {
            let Some(value) = desired.get(field.name()) else {
                continue;
            };
            if field.mutability() == Mutability::Computed {
                return Err(EngineError::Validation(format!(
                    "field '{}' is server-computed and cannot be set",
                    field.name()
                )));
            }
            if value.is_zero() && !field.sends_zero() {
                continue;
            }
            body.insert(
                field.wire_name().to_owned(),
                self.encode_field(field, value)?,
            );
        }
        Ok(body)
    }

    /// Encodes a field for a PATCH body. A zero value on a field that does
    /// not send zeroes becomes an explicit `null`, clearing the remote value.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Codec`] when the codec rejects the value.
    pub fn encode_for_update(
        &self,
        field: &FieldDef,
        value: &FieldValue,
    ) -> Result<serde_json::Value, EngineError> {
        if value.is_zero() && !field.sends_zero() {
            return Ok(serde_json::Value::Null);
        }
        self.encode_field(field, value)
    }

    /// Decodes a wire response body into remote state, skipping fields the
    /// server did not report.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Remote`] style codec errors as
    /// [`EngineError::Codec`] attributed to the offending field, and
    /// [`EngineError::Validation`] when the body is not a JSON object.
    pub fn decode_remote(
        &self,
        spec: &ResourceSpec,
        body: &serde_json::Value,
    ) -> Result<RemoteState, EngineError> {
        let serde_json::Value::Object(entries) = body else {
            return Err(EngineError::Validation(String::from(
                "remote response body must be a JSON object",
            )));
        };

        let mut remote = RemoteState::new();
        for field in spec.fields() {
            let Some(raw) = entries.get(field.wire_name()) else {
                continue;
            };
            if raw.is_null() {
                continue;
            }
            let decoded =
                self.codec_for(field)
                    .decode(raw)
                    .map_err(|err| EngineError::Codec {
                        field: field.name().to_owned(),
                        message: err.to_string(),
                    })?;
            remote.set(field.name(), decoded);
        }
        Ok(remote)
    }
}
