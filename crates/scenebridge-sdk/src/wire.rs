//! Tagged values as they travel across the boundary

use crate::handle::NativeHandle;
use crate::tag::TypeTag;
use std::fmt;

/// A value on the wire: a [`TypeTag`] plus a payload.
///
/// Heap payloads (`Blob`, `String`) are owned by the value. Whoever receives a
/// `WireValue` by move takes ownership of its payload; nothing else keeps a
/// pointer into it.
#[derive(Debug, Clone, PartialEq)]
pub struct WireValue {
    /// Declared type of the value
    pub tag: TypeTag,
    /// Payload; `WirePayload::Null` for a typed null
    pub payload: WirePayload,
}

/// Payload of a [`WireValue`]
#[derive(Debug, Clone, PartialEq)]
pub enum WirePayload {
    /// No payload (null value, null blob, or null object)
    Null,
    /// Inline boolean
    Bool(bool),
    /// Inline 32-bit integer (int32, char, enums, font values)
    I32(i32),
    /// Inline 64-bit integer (int64, time spans)
    I64(i64),
    /// Inline unsigned 64-bit integer
    U64(u64),
    /// Inline 64-bit float
    F64(f64),
    /// Owned fixed-layout struct bytes, little-endian
    Blob(Box<[u8]>),
    /// Owned string
    String(String),
    /// Native object handle
    Object(NativeHandle),
    /// Id of a value published in the managed handle table
    Managed(u64),
    /// Native error record
    Error(Box<ErrorRecord>),
}

impl WireValue {
    /// Typed null
    pub fn null(tag: TypeTag) -> Self {
        WireValue { tag, payload: WirePayload::Null }
    }

    /// Boolean value
    pub fn bool(b: bool) -> Self {
        WireValue { tag: TypeTag::BOOL, payload: WirePayload::Bool(b) }
    }

    /// 32-bit integer value
    pub fn i32(i: i32) -> Self {
        WireValue { tag: TypeTag::INT32, payload: WirePayload::I32(i) }
    }

    /// 64-bit integer value
    pub fn i64(i: i64) -> Self {
        WireValue { tag: TypeTag::INT64, payload: WirePayload::I64(i) }
    }

    /// Unsigned 64-bit integer value
    pub fn u64(u: u64) -> Self {
        WireValue { tag: TypeTag::UINT64, payload: WirePayload::U64(u) }
    }

    /// Float value
    pub fn f64(f: f64) -> Self {
        WireValue { tag: TypeTag::DOUBLE, payload: WirePayload::F64(f) }
    }

    /// String value
    pub fn string(s: impl Into<String>) -> Self {
        WireValue { tag: TypeTag::STRING, payload: WirePayload::String(s.into()) }
    }

    /// Struct blob with the given tag
    pub fn blob(tag: TypeTag, bytes: Box<[u8]>) -> Self {
        WireValue { tag, payload: WirePayload::Blob(bytes) }
    }

    /// Native object reference
    pub fn object(tag: TypeTag, handle: NativeHandle) -> Self {
        if handle.is_null() {
            return WireValue::null(tag);
        }
        WireValue { tag, payload: WirePayload::Object(handle) }
    }

    /// Published managed value
    pub fn managed(id: u64) -> Self {
        WireValue { tag: TypeTag::MANAGED, payload: WirePayload::Managed(id) }
    }

    /// Native error
    pub fn error(record: ErrorRecord) -> Self {
        WireValue {
            tag: TypeTag::NATIVE_ERROR,
            payload: WirePayload::Error(Box::new(record)),
        }
    }

    /// Check if the payload is empty
    pub fn is_null(&self) -> bool {
        matches!(self.payload, WirePayload::Null)
    }

    /// Object handle carried by this value, if any
    pub fn as_object(&self) -> Option<NativeHandle> {
        match self.payload {
            WirePayload::Object(handle) => Some(handle),
            _ => None,
        }
    }

    /// String payload, if any
    pub fn as_str(&self) -> Option<&str> {
        match &self.payload {
            WirePayload::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the payload shape, for diagnostics
    pub fn payload_name(&self) -> &'static str {
        match self.payload {
            WirePayload::Null => "null",
            WirePayload::Bool(_) => "bool",
            WirePayload::I32(_) => "i32",
            WirePayload::I64(_) => "i64",
            WirePayload::U64(_) => "u64",
            WirePayload::F64(_) => "f64",
            WirePayload::Blob(_) => "blob",
            WirePayload::String(_) => "string",
            WirePayload::Object(_) => "object",
            WirePayload::Managed(_) => "managed",
            WirePayload::Error(_) => "error",
        }
    }
}

/// Category of an error crossing the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Generic failure
    Exception,
    /// Invalid argument
    Argument,
    /// Operation not valid in the current state
    InvalidOperation,
    /// Access from the wrong thread
    Unauthorized,
    /// Document parse or build failure
    Parser,
}

/// An error record, either produced natively or reported by managed code.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    /// Error category
    pub kind: ErrorKind,
    /// Numeric code; `0` when unspecified
    pub code: i32,
    /// Human-readable message
    pub message: String,
    /// Source line, for document errors
    pub line: Option<u32>,
    /// Source column, for document errors
    pub column: Option<u32>,
}

impl ErrorRecord {
    /// Create a record with no position information
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ErrorRecord {
            kind,
            code: 0,
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Attach a numeric code
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    /// Attach a source position
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if self.code != 0 {
            write!(f, " {}", self.code)?;
        }
        write!(f, ": {}", self.message)?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, " (line {}, column {})", line, column)?;
        }
        Ok(())
    }
}
