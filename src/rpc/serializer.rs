//! Conversion of application [`Data`] into transport-safe [`Value`]s.
//!
//! Rules, applied recursively:
//!
//! - primitives pass through unchanged
//! - transferables are kept in place and appended to the transfer list
//! - error records become plain objects with a redacted stack
//! - [`Serializable`] values delegate to their own hook (which may add to
//!   the transfer list)
//! - callables and symbols fail with [`SerializationError::Unsupported`]
//! - opaque local objects fail with [`SerializationError::UnknownType`]
//!
//! Serialization is pure apart from appending to the caller's transfer list.

use crate::error::SerializationError;
use crate::rpc::value::{Data, ErrorInfo, Transferable, Value};

/// Placeholder written in place of error stack traces.
pub const REDACTED_STACK: &str = "<redacted>";

/// Custom serialization hook for application types.
pub trait Serializable {
    fn serialize(&self, transfer: &mut Vec<Transferable>) -> Result<Value, SerializationError>;
}

/// Serialize one value, collecting transferables into `transfer`.
pub fn serialize(data: &Data, transfer: &mut Vec<Transferable>) -> Result<Value, SerializationError> {
    Ok(match data {
        Data::Undefined => Value::Undefined,
        Data::Null => Value::Null,
        Data::Bool(b) => Value::Bool(*b),
        Data::Number(n) => Value::Number(*n),
        Data::BigInt(n) => Value::BigInt(*n),
        Data::String(s) => Value::String(s.clone()),
        Data::Array(items) => Value::Array(serialize_all(items, transfer)?),
        Data::Object(map) => {
            let mut out = std::collections::BTreeMap::new();
            for (key, item) in map {
                out.insert(key.clone(), serialize(item, transfer)?);
            }
            Value::Object(out)
        }
        Data::Transfer(t) => {
            transfer.push(t.clone());
            Value::Transfer(t.clone())
        }
        Data::Error(info) => serialize_error(info),
        Data::Custom(custom) => custom.serialize(transfer)?,
        Data::Function(_) | Data::Symbol(_) => return Err(SerializationError::Unsupported),
        Data::Opaque(_) => return Err(SerializationError::UnknownType),
    })
}

/// Serialize an argument list in order.
pub fn serialize_all(items: &[Data], transfer: &mut Vec<Transferable>) -> Result<Vec<Value>, SerializationError> {
    items.iter().map(|item| serialize(item, transfer)).collect()
}

/// Error records lose their stack on the way out.
pub fn serialize_error(info: &ErrorInfo) -> Value {
    ErrorInfo {
        stack: Some(REDACTED_STACK.to_owned()),
        ..info.clone()
    }
    .to_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handler::{Handler, Reply};
    use std::sync::Arc;

    struct Point {
        x: i32,
        y: i32,
        blob: Arc<[u8]>,
    }

    impl Serializable for Point {
        fn serialize(&self, transfer: &mut Vec<Transferable>) -> Result<Value, SerializationError> {
            let blob = Transferable::Buffer(self.blob.clone());
            transfer.push(blob.clone());
            Ok(Value::object([
                ("x", Value::from(self.x)),
                ("y", Value::from(self.y)),
                ("blob", Value::Transfer(blob)),
            ]))
        }
    }

    #[test]
    fn primitives_pass_through() {
        let mut transfer = Vec::new();
        let data = Data::from(vec![Data::Null, Data::from(1.5), Data::from("s"), Data::BigInt(3)]);
        let v = serialize(&data, &mut transfer).unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Value::Null, Value::Number(1.5), Value::from("s"), Value::BigInt(3)])
        );
        assert!(transfer.is_empty());
    }

    #[test]
    fn transferables_are_collected_in_order() {
        let a = Transferable::Handle(1);
        let b = Transferable::Buffer(Arc::from(&[7u8][..]));
        let data = Data::object([
            ("a", Data::Transfer(a.clone())),
            ("nested", Data::from(vec![Data::Transfer(b.clone())])),
        ]);
        let mut transfer = Vec::new();
        let v = serialize(&data, &mut transfer).unwrap();
        assert_eq!(transfer, vec![a.clone(), b]);
        assert_eq!(v.get("a"), Some(&Value::Transfer(a)));
    }

    #[test]
    fn errors_are_redacted() {
        let info = ErrorInfo::new("TypeError", "boom")
            .with_stack("at secret (/home/me/app.rs:1:1)")
            .with_location("app.rs", 10, 2);
        let v = serialize(&Data::from(info), &mut Vec::new()).unwrap();
        assert_eq!(v.get("name"), Some(&Value::from("TypeError")));
        assert_eq!(v.get("message"), Some(&Value::from("boom")));
        assert_eq!(v.get("stack"), Some(&Value::from(REDACTED_STACK)));
        assert_eq!(v.get("lineNumber"), Some(&Value::from(10)));
        assert_eq!(v.get("columnNumber"), Some(&Value::from(2)));
        assert_eq!(v.get("fileName"), Some(&Value::from("app.rs")));
    }

    #[test]
    fn missing_error_fields_are_undefined() {
        let v = serialize(&Data::from(ErrorInfo::message("m")), &mut Vec::new()).unwrap();
        assert_eq!(v.get("lineNumber"), Some(&Value::Undefined));
        assert_eq!(v.get("fileName"), Some(&Value::Undefined));
    }

    #[test]
    fn custom_hook_contributes_transferables() {
        let p = Point {
            x: 1,
            y: 2,
            blob: Arc::from(&[9u8, 9][..]),
        };
        let mut transfer = Vec::new();
        let v = serialize(&Data::custom(p), &mut transfer).unwrap();
        assert_eq!(v.get("x"), Some(&Value::from(1)));
        assert_eq!(transfer.len(), 1);
    }

    #[test]
    fn callables_and_symbols_are_rejected() {
        let f = Handler::new(|_| Reply::value(Data::Undefined));
        assert_eq!(
            serialize(&Data::from(f), &mut Vec::new()),
            Err(SerializationError::Unsupported)
        );
        assert_eq!(
            serialize(&Data::Symbol("tag".into()), &mut Vec::new()),
            Err(SerializationError::Unsupported)
        );
    }

    #[test]
    fn opaque_objects_are_unknown() {
        let nested = Data::from(vec![Data::from(1), Data::opaque(42u8)]);
        assert_eq!(
            serialize(&nested, &mut Vec::new()),
            Err(SerializationError::UnknownType)
        );
    }
}
