//! Managed values and the codec that moves them across the boundary

pub mod codec;
pub mod convert;
pub mod font;
pub mod handles;
pub mod structs;
pub mod time;

pub use codec::ValueCodec;
pub use font::{FontStretch, FontStyle, FontWeight};
pub use handles::{ManagedHandleTable, ManagedValue};
pub use structs::{Color, CornerRadius, GridLength, GridUnitType, Matrix, Point, Rect, Size, Thickness};
pub use time::{Duration, KeyTime, RepeatBehavior, TimeSpan};

use crate::object::ObjectRef;
use crate::types::{TypeCategory, TypeRef};
use scenebridge_sdk::{ErrorRecord, TypeTag};
use std::fmt;
use std::sync::Arc;

/// A member of a managed enumeration
#[derive(Debug, Clone)]
pub struct EnumValue {
    /// Enumeration type
    pub ty: TypeRef,
    /// Underlying value
    pub value: i32,
}

impl EnumValue {
    /// Member name, if the value names a declared member
    pub fn name(&self) -> Option<&str> {
        self.ty.enum_name(self.value)
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.ty.full_name() == other.ty.full_name()
    }
}

/// A managed value
#[derive(Debug, Clone)]
pub enum Value {
    /// Null (of any type)
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit integer
    I32(i32),
    /// 64-bit integer
    I64(i64),
    /// Unsigned 64-bit integer
    U64(u64),
    /// 64-bit float
    F64(f64),
    /// Unicode scalar
    Char(char),
    /// String
    String(String),
    /// Enumeration member
    Enum(EnumValue),
    /// Font weight
    FontWeight(FontWeight),
    /// Font style
    FontStyle(FontStyle),
    /// Font stretch
    FontStretch(FontStretch),
    /// Color
    Color(Color),
    /// Point
    Point(Point),
    /// Size
    Size(Size),
    /// Rectangle
    Rect(Rect),
    /// Thickness
    Thickness(Thickness),
    /// Corner radius
    CornerRadius(CornerRadius),
    /// Affine matrix
    Matrix(Matrix),
    /// Grid length
    GridLength(GridLength),
    /// Time span
    TimeSpan(TimeSpan),
    /// Timeline duration
    Duration(Duration),
    /// Key-frame time
    KeyTime(KeyTime),
    /// Repeat behavior
    RepeatBehavior(RepeatBehavior),
    /// Wrapper of a native object
    Object(ObjectRef),
    /// Managed-only value, published to native code by handle
    Managed(ManagedValue),
    /// Error record produced natively
    Error(ErrorRecord),
}

impl Value {
    /// Check if this is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Wrapped object, if any
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// String contents, if any
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Float contents, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer contents (including enum values), if any
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            Value::Enum(e) => Some(e.value),
            _ => None,
        }
    }

    /// Tag this value travels under when no hint overrides it
    pub fn natural_tag(&self) -> TypeTag {
        match self {
            Value::Null => TypeTag::INVALID,
            Value::Bool(_) => TypeTag::BOOL,
            Value::I32(_) | Value::Enum(_) => TypeTag::INT32,
            Value::I64(_) => TypeTag::INT64,
            Value::U64(_) => TypeTag::UINT64,
            Value::F64(_) => TypeTag::DOUBLE,
            Value::Char(_) => TypeTag::CHAR,
            Value::String(_) => TypeTag::STRING,
            Value::FontWeight(_) => TypeTag::FONT_WEIGHT,
            Value::FontStyle(_) => TypeTag::FONT_STYLE,
            Value::FontStretch(_) => TypeTag::FONT_STRETCH,
            Value::Color(_) => TypeTag::COLOR,
            Value::Point(_) => TypeTag::POINT,
            Value::Size(_) => TypeTag::SIZE,
            Value::Rect(_) => TypeTag::RECT,
            Value::Thickness(_) => TypeTag::THICKNESS,
            Value::CornerRadius(_) => TypeTag::CORNER_RADIUS,
            Value::Matrix(_) => TypeTag::MATRIX,
            Value::GridLength(_) => TypeTag::GRID_LENGTH,
            Value::TimeSpan(_) => TypeTag::TIMESPAN,
            Value::Duration(_) => TypeTag::DURATION,
            Value::KeyTime(_) => TypeTag::KEY_TIME,
            Value::RepeatBehavior(_) => TypeTag::REPEAT_BEHAVIOR,
            Value::Object(o) => o.type_tag(),
            Value::Managed(_) => TypeTag::MANAGED,
            Value::Error(_) => TypeTag::NATIVE_ERROR,
        }
    }

    /// Type name for diagnostics
    pub fn type_name(&self) -> String {
        match self {
            Value::Enum(e) => e.ty.full_name().to_string(),
            Value::Object(o) => o.managed_type().full_name().to_string(),
            Value::Null => "null".to_string(),
            other => other.natural_tag().name().to_string(),
        }
    }

    /// Check if the value may be stored in a slot of type `ty`.
    ///
    /// Null is assignable to every type.
    pub fn is_assignable_to(&self, ty: &TypeRef) -> bool {
        if self.is_null() {
            return true;
        }
        match ty.category() {
            TypeCategory::Any => true,
            TypeCategory::Value(tag) => self.natural_tag() == *tag && !matches!(self, Value::Enum(_)),
            TypeCategory::Enum(_) => match self {
                Value::Enum(e) => e.ty.full_name() == ty.full_name(),
                Value::I32(_) => true,
                _ => false,
            },
            TypeCategory::Class { .. } | TypeCategory::Interface | TypeCategory::NativeOnly => {
                match self {
                    Value::Object(o) => o.managed_type().is_subtype_of(ty),
                    _ => false,
                }
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (I32(a), I32(b)) => a == b,
            (I64(a), I64(b)) => a == b,
            (U64(a), U64(b)) => a == b,
            (F64(a), F64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Char(a), Char(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Enum(a), Enum(b)) => a == b,
            (FontWeight(a), FontWeight(b)) => a == b,
            (FontStyle(a), FontStyle(b)) => a == b,
            (FontStretch(a), FontStretch(b)) => a == b,
            (Color(a), Color(b)) => a == b,
            (Point(a), Point(b)) => a == b,
            (Size(a), Size(b)) => a == b,
            (Rect(a), Rect(b)) => a == b,
            (Thickness(a), Thickness(b)) => a == b,
            (CornerRadius(a), CornerRadius(b)) => a == b,
            (Matrix(a), Matrix(b)) => a == b,
            (GridLength(a), GridLength(b)) => a == b,
            (TimeSpan(a), TimeSpan(b)) => a == b,
            (Duration(a), Duration(b)) => a == b,
            (KeyTime(a), KeyTime(b)) => a == b,
            (RepeatBehavior(a), RepeatBehavior(b)) => a == b,
            (Object(a), Object(b)) => Arc::ptr_eq(a, b),
            (Managed(a), Managed(b)) => Arc::ptr_eq(a, b),
            (Error(a), Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::I32(i) => write!(f, "{}", i),
            Value::I64(i) => write!(f, "{}", i),
            Value::U64(u) => write!(f, "{}", u),
            Value::F64(x) => write!(f, "{}", x),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Enum(e) => match e.name() {
                Some(name) => write!(f, "{}.{}", e.ty.name(), name),
                None => write!(f, "{}({})", e.ty.name(), e.value),
            },
            Value::TimeSpan(ts) => write!(f, "{}", ts),
            Value::Object(o) => write!(f, "{}@{}", o.managed_type().name(), o.handle()),
            Value::Error(e) => write!(f, "{}", e),
            other => write!(f, "{:?}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::I32(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::builtins;

    #[test]
    fn test_natural_tags() {
        assert_eq!(Value::F64(1.0).natural_tag(), TypeTag::DOUBLE);
        assert_eq!(Value::Point(Point::new(1.0, 2.0)).natural_tag(), TypeTag::POINT);
        assert_eq!(Value::Null.natural_tag(), TypeTag::INVALID);
    }

    #[test]
    fn test_assignability_of_values() {
        let b = builtins();
        assert!(Value::F64(3.0).is_assignable_to(&b.double));
        assert!(!Value::I32(3).is_assignable_to(&b.double));
        assert!(Value::Null.is_assignable_to(&b.double));
        assert!(Value::String("x".into()).is_assignable_to(&b.object));
        assert!(Value::I32(1).is_assignable_to(&b.visibility));

        let visible = Value::Enum(EnumValue { ty: b.visibility.clone(), value: 0 });
        assert!(visible.is_assignable_to(&b.visibility));
        assert!(!visible.is_assignable_to(&b.orientation));
        assert!(!visible.is_assignable_to(&b.int32));
    }

    #[test]
    fn test_nan_equality() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_ne!(Value::F64(1.0), Value::I32(1));
    }

    #[test]
    fn test_enum_display() {
        let v = Value::Enum(EnumValue { ty: builtins().visibility.clone(), value: 1 });
        assert_eq!(v.to_string(), "Visibility.Collapsed");
    }
}
