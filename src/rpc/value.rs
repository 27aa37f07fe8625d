//! Value model shared by handlers and the wire.
//!
//! ```text
//!   application side                     wire side
//!   ┌──────────────────────┐  serialize  ┌──────────────────┐
//!   │ Data                 │ ──────────▶ │ Value            │
//!   │  primitives, arrays, │             │  primitives,     │
//!   │  objects, errors,    │             │  arrays, objects,│
//!   │  custom, functions…  │ ◀────────── │  transferables   │
//!   └──────────────────────┘   From<>    └──────────────────┘
//! ```
//!
//! [`Value`] is the plain, transport-safe form. It derives serde so any
//! serde format (postcard for byte pipes, JSON for debugging) can carry it.
//! [`Data`] is what handlers produce and callers pass in: it can additionally
//! hold error records, values with a custom serialization hook, and local-only
//! things (callables, symbols, opaque objects) that the serializer refuses.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::rpc::handler::Handler;
use crate::rpc::serializer::Serializable;

// ── Transferables ──────────────────────────────────────────────

/// A resource whose ownership moves with the message instead of being
/// copied. The same item appears inline in the value tree and in the
/// message's transfer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transferable {
    /// Binary buffer.
    Buffer(Arc<[u8]>),
    /// Transport-defined handle (port, socket, descriptor id).
    Handle(u64),
}

// ── Wire value ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i64),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    Transfer(Transferable),
}

impl Value {
    /// `Undefined` or `Null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Loose truthiness used for the stream `done` flag.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::BigInt(n) => *n != 0,
            Self::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::BigInt(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::BigInt(n) => Some(*n),
            Self::Number(n) if n.fract() == 0.0 => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Object field lookup. Missing keys and non-objects yield `None`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(key))
    }

    /// Build an object from `(key, value)` pairs.
    pub fn object<K, V, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Lossy JSON rendering. `Undefined` becomes `null`, buffers become
    /// byte arrays and handles become numbers.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Undefined | Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n).map_or(Json::Null, Json::Number),
            Self::BigInt(n) => Json::from(*n),
            Self::String(s) => Json::String(s.clone()),
            Self::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Self::Object(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Transfer(Transferable::Buffer(bytes)) => {
                Json::Array(bytes.iter().map(|b| Json::from(*b)).collect())
            }
            Self::Transfer(Transferable::Handle(h)) => Json::from(*h),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Transferable> for Value {
    fn from(t: Transferable) -> Self {
        Self::Transfer(t)
    }
}

// ── Error records ──────────────────────────────────────────────

/// Structured error record. Serialized as an object carrying `name`,
/// `message`, a redacted `stack`, and the optional source location.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
    pub column_number: Option<u32>,
    pub line_number: Option<u32>,
    pub file_name: Option<String>,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    /// A generic `Error` with the given message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn with_location(mut self, file_name: impl Into<String>, line: u32, column: u32) -> Self {
        self.file_name = Some(file_name.into());
        self.line_number = Some(line);
        self.column_number = Some(column);
        self
    }

    /// Rebuild a record from a received error object. Anything without a
    /// non-empty string `name` is not a named error.
    pub fn from_value(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?;
        if name.is_empty() {
            return None;
        }
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_owned);
        let number = |key: &str| value.get(key).and_then(Value::as_f64).map(|n| n as u32);
        Some(Self {
            name: name.to_owned(),
            message: text("message").unwrap_or_default(),
            stack: text("stack"),
            column_number: number("columnNumber"),
            line_number: number("lineNumber"),
            file_name: text("fileName"),
        })
    }

    /// Wire form with the stack kept verbatim. Used for records that are
    /// already redacted, e.g. when re-forwarding a received error.
    pub fn to_value(&self) -> Value {
        let opt_str = |s: &Option<String>| s.clone().map_or(Value::Undefined, Value::String);
        let opt_num = |n: Option<u32>| n.map_or(Value::Undefined, Value::from);
        Value::object([
            ("name", Value::from(self.name.as_str())),
            ("message", Value::from(self.message.as_str())),
            ("stack", opt_str(&self.stack)),
            ("columnNumber", opt_num(self.column_number)),
            ("lineNumber", opt_num(self.line_number)),
            ("fileName", opt_str(&self.file_name)),
        ])
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

// ── Application data ───────────────────────────────────────────

/// Application-side value.
#[derive(Clone, Default)]
pub enum Data {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i64),
    String(String),
    Array(Vec<Data>),
    Object(BTreeMap<String, Data>),
    Transfer(Transferable),
    Error(ErrorInfo),
    /// A value that knows how to serialize itself.
    Custom(Rc<dyn Serializable>),
    /// A callable. Never serializable.
    Function(Handler),
    /// A unique symbol. Never serializable.
    Symbol(String),
    /// Any other local object. Never serializable.
    Opaque(Rc<dyn Any>),
}

impl Data {
    pub fn object<K, V, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Data>,
    {
        Self::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn custom(value: impl Serializable + 'static) -> Self {
        Self::Custom(Rc::new(value))
    }

    pub fn opaque(value: impl Any) -> Self {
        Self::Opaque(Rc::new(value))
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "Undefined"),
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::BigInt(n) => write!(f, "BigInt({n})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Self::Object(map) => f.debug_tuple("Object").field(map).finish(),
            Self::Transfer(t) => f.debug_tuple("Transfer").field(t).finish(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Self::Custom(_) => write!(f, "Custom(..)"),
            Self::Function(_) => write!(f, "Function(..)"),
            Self::Symbol(s) => write!(f, "Symbol({s:?})"),
            Self::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

/// Received wire values re-enter application code unchanged.
impl From<Value> for Data {
    fn from(value: Value) -> Self {
        match value {
            Value::Undefined => Self::Undefined,
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::BigInt(n) => Self::BigInt(n),
            Value::String(s) => Self::String(s),
            Value::Array(items) => Self::Array(items.into_iter().map(Data::from).collect()),
            Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Data::from(v))).collect())
            }
            Value::Transfer(t) => Self::Transfer(t),
        }
    }
}

impl From<serde_json::Value> for Data {
    fn from(json: serde_json::Value) -> Self {
        Self::from(Value::from(json))
    }
}

impl From<ErrorInfo> for Data {
    fn from(e: ErrorInfo) -> Self {
        Self::Error(e)
    }
}

impl From<Handler> for Data {
    fn from(h: Handler) -> Self {
        Self::Function(h)
    }
}

impl From<bool> for Data {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Data {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Data {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Data {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Data>> for Data {
    fn from(items: Vec<Data>) -> Self {
        Self::Array(items)
    }
}

impl From<Transferable> for Data {
    fn from(t: Transferable) -> Self {
        Self::Transfer(t)
    }
}

impl From<()> for Data {
    fn from((): ()) -> Self {
        Self::Undefined
    }
}
