//! Value codec: wire values to managed values and back
//!
//! Decoding honours an optional expected type: a wire int32 becomes an enum
//! member, a font value, or a char when the target slot says so. Reference
//! kinds decode through the object factory, so the same native handle always
//! yields the same wrapper. Encoding moves freshly allocated payloads into the
//! returned [`WireValue`]; the codec keeps nothing.

use super::structs::{decode_blob, encode_blob, BlobLayout};
use super::{
    Color, CornerRadius, Duration, EnumValue, FontStretch, FontStyle, FontWeight, GridLength,
    KeyTime, Matrix, Point, Rect, RepeatBehavior, Size, Thickness, TimeSpan, Value,
};
use crate::bridge::Bridge;
use crate::error::{BridgeError, BridgeResult};
use crate::types::{TypeCategory, TypeRef};
use scenebridge_sdk::{TypeTag, WirePayload, WireValue};

/// Converts between [`WireValue`] and [`Value`] for one bridge
pub struct ValueCodec<'b> {
    bridge: &'b Bridge,
}

fn mismatch(wire: &WireValue) -> BridgeError {
    BridgeError::Protocol(format!(
        "tag {} cannot carry a {} payload",
        wire.tag,
        wire.payload_name()
    ))
}

impl<'b> ValueCodec<'b> {
    pub(crate) fn new(bridge: &'b Bridge) -> Self {
        Self { bridge }
    }

    /// Decode a wire value, optionally guided by the type of the receiving slot
    pub fn decode(&self, expected: Option<&TypeRef>, wire: &WireValue) -> BridgeResult<Value> {
        let tag = wire.tag;

        if tag == TypeTag::INVALID {
            return match wire.payload {
                WirePayload::Null => Ok(Value::Null),
                _ => Err(mismatch(wire)),
            };
        }
        if !tag.is_value_kind() {
            return self.decode_object(wire);
        }
        if tag.is_blob_kind() {
            return self.decode_struct(wire);
        }

        match (tag, &wire.payload) {
            (_, WirePayload::Null) => Ok(Value::Null),
            (TypeTag::BOOL, WirePayload::Bool(b)) => Ok(Value::Bool(*b)),
            (TypeTag::DOUBLE, WirePayload::F64(f)) => Ok(Value::F64(*f)),
            (TypeTag::UINT64, WirePayload::U64(u)) => Ok(Value::U64(*u)),
            (TypeTag::INT64, WirePayload::I64(i)) => Ok(Value::I64(*i)),
            (TypeTag::TIMESPAN, WirePayload::I64(ticks)) => {
                Ok(Value::TimeSpan(TimeSpan::from_ticks(*ticks)))
            }
            (TypeTag::INT32, WirePayload::I32(i)) => decode_int32(*i, expected),
            (TypeTag::CHAR, WirePayload::I32(i)) => decode_char(*i),
            (TypeTag::FONT_WEIGHT, WirePayload::I32(i)) => Ok(Value::FontWeight(FontWeight(*i))),
            (TypeTag::FONT_STYLE, WirePayload::I32(i)) => decode_font_style(*i),
            (TypeTag::FONT_STRETCH, WirePayload::I32(i)) => Ok(Value::FontStretch(FontStretch(*i))),
            (TypeTag::STRING, WirePayload::String(s)) => Ok(Value::String(s.clone())),
            (TypeTag::MANAGED, WirePayload::Managed(id)) => {
                Ok(Value::Managed(self.bridge.handles().redeem(*id)?))
            }
            (TypeTag::NATIVE_ERROR, WirePayload::Error(record)) => {
                Ok(Value::Error((**record).clone()))
            }
            _ => Err(mismatch(wire)),
        }
    }

    fn decode_object(&self, wire: &WireValue) -> BridgeResult<Value> {
        let ty = self.bridge.registry().resolve(wire.tag)?;
        if !ty.is_object_family() {
            return Err(BridgeError::Protocol(format!(
                "tag {} ({}) is not an object type",
                wire.tag,
                ty.full_name()
            )));
        }
        match wire.payload {
            WirePayload::Null => Ok(Value::Null),
            WirePayload::Object(handle) => {
                let object = self.bridge.create_or_reuse(wire.tag, handle)?;
                Ok(Value::Object(object))
            }
            _ => Err(mismatch(wire)),
        }
    }

    fn decode_struct(&self, wire: &WireValue) -> BridgeResult<Value> {
        let blob = match &wire.payload {
            WirePayload::Null => None,
            WirePayload::Blob(bytes) => Some(&bytes[..]),
            _ => return Err(mismatch(wire)),
        };
        let value = match wire.tag {
            TypeTag::COLOR => Value::Color(decode_blob::<Color>(blob)?),
            TypeTag::POINT => Value::Point(decode_blob::<Point>(blob)?),
            TypeTag::SIZE => Value::Size(decode_blob::<Size>(blob)?),
            TypeTag::RECT => Value::Rect(decode_blob::<Rect>(blob)?),
            TypeTag::THICKNESS => Value::Thickness(decode_blob::<Thickness>(blob)?),
            TypeTag::CORNER_RADIUS => Value::CornerRadius(decode_blob::<CornerRadius>(blob)?),
            TypeTag::MATRIX => Value::Matrix(decode_blob::<Matrix>(blob)?),
            TypeTag::GRID_LENGTH => Value::GridLength(decode_blob::<GridLength>(blob)?),
            TypeTag::DURATION => Value::Duration(decode_blob::<Duration>(blob)?),
            TypeTag::KEY_TIME => Value::KeyTime(decode_blob::<KeyTime>(blob)?),
            TypeTag::REPEAT_BEHAVIOR => Value::RepeatBehavior(decode_blob::<RepeatBehavior>(blob)?),
            _ => return Err(mismatch(wire)),
        };
        Ok(value)
    }

    /// Encode a value under its natural tag
    pub fn encode(&self, value: &Value) -> BridgeResult<WireValue> {
        let wire = match value {
            Value::Null => WireValue::null(TypeTag::INVALID),
            Value::Bool(b) => WireValue::bool(*b),
            Value::I32(i) => WireValue::i32(*i),
            Value::I64(i) => WireValue::i64(*i),
            Value::U64(u) => WireValue::u64(*u),
            Value::F64(f) => WireValue::f64(*f),
            Value::Char(c) => WireValue {
                tag: TypeTag::CHAR,
                payload: WirePayload::I32(*c as i32),
            },
            Value::String(s) => WireValue::string(s.clone()),
            Value::Enum(e) => WireValue::i32(e.value),
            Value::FontWeight(w) => WireValue {
                tag: TypeTag::FONT_WEIGHT,
                payload: WirePayload::I32(w.0),
            },
            Value::FontStyle(s) => WireValue {
                tag: TypeTag::FONT_STYLE,
                payload: WirePayload::I32(s.to_i32()),
            },
            Value::FontStretch(s) => WireValue {
                tag: TypeTag::FONT_STRETCH,
                payload: WirePayload::I32(s.0),
            },
            Value::Color(v) => blob(v),
            Value::Point(v) => blob(v),
            Value::Size(v) => blob(v),
            Value::Rect(v) => blob(v),
            Value::Thickness(v) => blob(v),
            Value::CornerRadius(v) => blob(v),
            Value::Matrix(v) => blob(v),
            Value::GridLength(v) => blob(v),
            Value::Duration(v) => blob(v),
            Value::KeyTime(v) => blob(v),
            Value::RepeatBehavior(v) => blob(v),
            Value::TimeSpan(ts) => WireValue {
                tag: TypeTag::TIMESPAN,
                payload: WirePayload::I64(ts.ticks()),
            },
            Value::Object(o) => {
                let peer = o.peer();
                if peer.is_detached() {
                    return Err(BridgeError::Detached(peer.handle()));
                }
                WireValue::object(peer.type_tag(), peer.handle())
            }
            Value::Managed(v) => WireValue::managed(self.bridge.handles().publish(v.clone())),
            Value::Error(record) => WireValue::error(record.clone()),
        };
        Ok(wire)
    }

    /// Encode a value for a slot of type `declared`.
    ///
    /// Nulls carry the declared type's tag.
    pub fn encode_as(&self, value: &Value, declared: &TypeRef) -> BridgeResult<WireValue> {
        if value.is_null() {
            let tag = match declared.category() {
                TypeCategory::Any => TypeTag::INVALID,
                _ => self.bridge.registry().tag_of(declared)?,
            };
            return Ok(WireValue::null(tag));
        }
        self.encode(value)
    }
}

fn blob<T: BlobLayout>(value: &T) -> WireValue {
    WireValue::blob(T::TAG, encode_blob(value))
}

fn decode_int32(i: i32, expected: Option<&TypeRef>) -> BridgeResult<Value> {
    let Some(ty) = expected else {
        return Ok(Value::I32(i));
    };
    match ty.category() {
        TypeCategory::Enum(_) => Ok(Value::Enum(EnumValue { ty: ty.clone(), value: i })),
        TypeCategory::Value(TypeTag::FONT_WEIGHT) => Ok(Value::FontWeight(FontWeight(i))),
        TypeCategory::Value(TypeTag::FONT_STYLE) => decode_font_style(i),
        TypeCategory::Value(TypeTag::FONT_STRETCH) => Ok(Value::FontStretch(FontStretch(i))),
        TypeCategory::Value(TypeTag::CHAR) => decode_char(i),
        _ => Ok(Value::I32(i)),
    }
}

fn decode_char(i: i32) -> BridgeResult<Value> {
    u32::try_from(i)
        .ok()
        .and_then(char::from_u32)
        .map(Value::Char)
        .ok_or_else(|| BridgeError::Protocol(format!("{} is not a valid char", i)))
}

fn decode_font_style(i: i32) -> BridgeResult<Value> {
    FontStyle::from_i32(i)
        .map(Value::FontStyle)
        .ok_or_else(|| BridgeError::Protocol(format!("{} is not a valid font style", i)))
}
