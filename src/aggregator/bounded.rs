//! Depth-bounded conversion of `Serialize` values into JSON.
//!
//! `serde_json::to_value` recurses for as long as a `Serialize` impl keeps
//! producing nested values, so a type that serializes a reference back to
//! itself never terminates. This serializer counts nesting and replaces
//! anything deeper than [`MAX_DEPTH`] with [`CIRCULAR_MARKER`].

use serde::ser::{self, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Deepest nesting level kept verbatim.
pub const MAX_DEPTH: usize = 64;

/// Placeholder stored where nesting was cut off.
pub const CIRCULAR_MARKER: &str = "[Circular]";

/// A value could not be represented as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct SerializeError(String);

impl ser::Error for SerializeError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        SerializeError(msg.to_string())
    }
}

/// Convert `value` into a finite JSON tree.
pub fn to_bounded_value<T: Serialize + ?Sized>(value: &T) -> Result<Value, SerializeError> {
    nested(0, value)
}

fn nested<T: Serialize + ?Sized>(depth: usize, value: &T) -> Result<Value, SerializeError> {
    if depth > MAX_DEPTH {
        return Ok(Value::String(CIRCULAR_MARKER.to_string()));
    }
    value.serialize(BoundedSerializer { depth })
}

fn map_key<T: Serialize + ?Sized>(depth: usize, key: &T) -> Result<String, SerializeError> {
    match nested(depth, key)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(SerializeError(format!(
            "map key must be a string, number or bool, got {other}"
        ))),
    }
}

fn wrap_variant(variant: &'static str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(variant.to_string(), value);
    Value::Object(map)
}

struct BoundedSerializer {
    depth: usize,
}

impl ser::Serializer for BoundedSerializer {
    type Ok = Value;
    type Error = SerializeError;

    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMapBuilder;

    fn serialize_bool(self, v: bool) -> Result<Value, SerializeError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, SerializeError> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, SerializeError> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, SerializeError> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, SerializeError> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, SerializeError> {
        if let Ok(small) = i64::try_from(v) {
            return Ok(Value::from(small));
        }
        match u64::try_from(v) {
            Ok(small) => Ok(Value::from(small)),
            Err(_) => Ok(Value::String(v.to_string())),
        }
    }

    fn serialize_u8(self, v: u8) -> Result<Value, SerializeError> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, SerializeError> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, SerializeError> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, SerializeError> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, SerializeError> {
        match u64::try_from(v) {
            Ok(small) => Ok(Value::from(small)),
            Err(_) => Ok(Value::String(v.to_string())),
        }
    }

    // Non-finite floats become null, as in serde_json.
    fn serialize_f32(self, v: f32) -> Result<Value, SerializeError> {
        Ok(Value::from(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, SerializeError> {
        Ok(Value::from(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, SerializeError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, SerializeError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, SerializeError> {
        Ok(Value::Array(v.iter().map(|b| Value::from(*b)).collect()))
    }

    fn serialize_none(self) -> Result<Value, SerializeError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, SerializeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, SerializeError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, SerializeError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, SerializeError> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, SerializeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, SerializeError> {
        Ok(wrap_variant(variant, nested(self.depth + 1, value)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, SerializeError> {
        Ok(SeqBuilder {
            depth: self.depth,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, SerializeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, SerializeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSeqBuilder, SerializeError> {
        Ok(VariantSeqBuilder {
            variant,
            seq: SeqBuilder {
                depth: self.depth + 1,
                items: Vec::with_capacity(len),
            },
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, SerializeError> {
        Ok(MapBuilder {
            depth: self.depth,
            map: Map::new(),
            next_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<MapBuilder, SerializeError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantMapBuilder, SerializeError> {
        Ok(VariantMapBuilder {
            variant,
            map: MapBuilder {
                depth: self.depth + 1,
                map: Map::new(),
                next_key: None,
            },
        })
    }
}

struct SeqBuilder {
    depth: usize,
    items: Vec<Value>,
}

impl SeqBuilder {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerializeError> {
        self.items.push(nested(self.depth + 1, value)?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = SerializeError;

    fn serialize_element<T: ?Sized + Serialize>(
        &mut self,
        value: &T,
    ) -> Result<(), SerializeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, SerializeError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = SerializeError;

    fn serialize_element<T: ?Sized + Serialize>(
        &mut self,
        value: &T,
    ) -> Result<(), SerializeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, SerializeError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = SerializeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerializeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, SerializeError> {
        Ok(Value::Array(self.items))
    }
}

struct VariantSeqBuilder {
    variant: &'static str,
    seq: SeqBuilder,
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = Value;
    type Error = SerializeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerializeError> {
        self.seq.push(value)
    }

    fn end(self) -> Result<Value, SerializeError> {
        Ok(wrap_variant(self.variant, Value::Array(self.seq.items)))
    }
}

struct MapBuilder {
    depth: usize,
    map: Map<String, Value>,
    next_key: Option<String>,
}

impl MapBuilder {
    fn insert<T: ?Sized + Serialize>(
        &mut self,
        key: String,
        value: &T,
    ) -> Result<(), SerializeError> {
        let value = nested(self.depth + 1, value)?;
        self.map.insert(key, value);
        Ok(())
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = SerializeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), SerializeError> {
        self.next_key = Some(map_key(self.depth + 1, key)?);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), SerializeError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| SerializeError("map value serialized before its key".to_string()))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Value, SerializeError> {
        Ok(Value::Object(self.map))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = SerializeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), SerializeError> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, SerializeError> {
        Ok(Value::Object(self.map))
    }
}

struct VariantMapBuilder {
    variant: &'static str,
    map: MapBuilder,
}

impl ser::SerializeStructVariant for VariantMapBuilder {
    type Ok = Value;
    type Error = SerializeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), SerializeError> {
        self.map.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, SerializeError> {
        Ok(wrap_variant(self.variant, Value::Object(self.map.map)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::SerializeStruct;
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashMap};
    use std::rc::Rc;

    struct Node {
        name: String,
        next: RefCell<Option<Rc<Node>>>,
    }

    impl Serialize for Node {
        fn serialize<S: ser::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut state = serializer.serialize_struct("Node", 2)?;
            state.serialize_field("name", &self.name)?;
            match &*self.next.borrow() {
                Some(next) => state.serialize_field("next", next.as_ref())?,
                None => state.serialize_field("next", &Option::<()>::None)?,
            }
            state.end()
        }
    }

    #[derive(serde::Serialize)]
    enum Shape {
        Point,
        Circle(f64),
        Line(u8, u8),
        Rect { w: u32, h: u32 },
    }

    #[test]
    fn test_plain_values_match_serde_json() {
        let value = json!({"a": [1, 2.5, "x", null, true], "b": {"c": {}}});
        assert_eq!(to_bounded_value(&value).unwrap(), value);

        let mut map = BTreeMap::new();
        map.insert("k", vec![Some(1u8), None]);
        assert_eq!(to_bounded_value(&map).unwrap(), json!({"k": [1, null]}));
    }

    #[test]
    fn test_enum_representations() {
        let shapes = vec![
            Shape::Point,
            Shape::Circle(1.5),
            Shape::Line(1, 2),
            Shape::Rect { w: 3, h: 4 },
        ];
        assert_eq!(
            to_bounded_value(&shapes).unwrap(),
            serde_json::to_value(&shapes).unwrap()
        );
    }

    #[test]
    fn test_numeric_map_keys_are_stringified() {
        let mut map = HashMap::new();
        map.insert(7u32, "seven");
        assert_eq!(to_bounded_value(&map).unwrap(), json!({"7": "seven"}));
    }

    #[test]
    fn test_composite_map_keys_fail() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");
        assert!(to_bounded_value(&map).is_err());
    }

    #[test]
    fn test_self_reference_terminates() {
        let node = Rc::new(Node {
            name: "loop".into(),
            next: RefCell::new(None),
        });
        *node.next.borrow_mut() = Some(node.clone());

        let value = to_bounded_value(node.as_ref()).unwrap();
        let text = serde_json::to_string(&value).unwrap();
        assert!(text.contains(CIRCULAR_MARKER));

        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["name"], "loop");
        assert_eq!(parsed["next"]["name"], "loop");

        // Break the cycle so the test does not leak.
        node.next.borrow_mut().take();
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert_eq!(to_bounded_value(&f64::NAN).unwrap(), Value::Null);
    }
}
