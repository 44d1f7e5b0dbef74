//! Conversion of arbitrary serializable arguments into plain JSON values.
//!
//! A value's `Serialize` impl is its "plain form" hook. The fast path hands it
//! to `serde_json`; if that fails anywhere in the tree, the value is walked
//! again with a lenient serializer that never fails: a failing leaf becomes
//! `null`, a non-string map key becomes its JSON text, and non-finite floats
//! become `null`.

use std::fmt;

use serde::ser;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::debug;

/// Reduce `value` to primitives, arrays, and ordered maps. Never fails.
pub fn to_native<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(native) => native,
        Err(e) => {
            debug!("Falling back to lenient argument conversion: {}", e);
            lenient(value)
        }
    }
}

fn lenient<T: Serialize + ?Sized>(value: &T) -> Value {
    value.serialize(NativeSerializer).unwrap_or_else(|e| {
        debug!("Dropping unserializable argument value: {}", e);
        Value::Null
    })
}

fn key_text(key: Value) -> String {
    match key {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

#[derive(Debug)]
struct NativeError(String);

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NativeError {}

impl ser::Error for NativeError {
    fn custom<M: fmt::Display>(msg: M) -> Self {
        NativeError(msg.to_string())
    }
}

struct NativeSerializer;

struct SeqBuilder {
    items: Vec<Value>,
}

struct VariantSeqBuilder {
    variant: &'static str,
    items: Vec<Value>,
}

struct MapBuilder {
    map: Map<String, Value>,
    next_key: Option<String>,
}

struct VariantMapBuilder {
    variant: &'static str,
    map: Map<String, Value>,
}

fn tagged(variant: &'static str, inner: Value) -> Value {
    let mut map = Map::new();
    map.insert(variant.to_string(), inner);
    Value::Object(map)
}

impl ser::Serializer for NativeSerializer {
    type Ok = Value;
    type Error = NativeError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantSeqBuilder;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantMapBuilder;

    fn serialize_bool(self, v: bool) -> Result<Value, NativeError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, NativeError> {
        Ok(Value::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, NativeError> {
        Ok(Value::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, NativeError> {
        Ok(Value::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, NativeError> {
        Ok(Value::from(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, NativeError> {
        Ok(i64::try_from(v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, NativeError> {
        Ok(Value::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, NativeError> {
        Ok(Value::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, NativeError> {
        Ok(Value::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, NativeError> {
        Ok(Value::from(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, NativeError> {
        Ok(u64::try_from(v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, NativeError> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, NativeError> {
        Ok(Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null))
    }

    fn serialize_char(self, v: char) -> Result<Value, NativeError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, NativeError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, NativeError> {
        Ok(Value::Array(v.iter().map(|b| Value::from(*b)).collect()))
    }

    fn serialize_none(self) -> Result<Value, NativeError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, NativeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, NativeError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, NativeError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, NativeError> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, NativeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, NativeError> {
        Ok(tagged(variant, lenient(value)))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, NativeError> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, NativeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, NativeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSeqBuilder, NativeError> {
        Ok(VariantSeqBuilder {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, NativeError> {
        Ok(MapBuilder {
            map: Map::new(),
            next_key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, NativeError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<VariantMapBuilder, NativeError> {
        Ok(VariantMapBuilder {
            variant,
            map: Map::new(),
        })
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Value;
    type Error = NativeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NativeError> {
        self.items.push(lenient(value));
        Ok(())
    }

    fn end(self) -> Result<Value, NativeError> {
        Ok(Value::Array(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Value;
    type Error = NativeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NativeError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, NativeError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Value;
    type Error = NativeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NativeError> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, NativeError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleVariant for VariantSeqBuilder {
    type Ok = Value;
    type Error = NativeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NativeError> {
        self.items.push(lenient(value));
        Ok(())
    }

    fn end(self) -> Result<Value, NativeError> {
        Ok(tagged(self.variant, Value::Array(self.items)))
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Value;
    type Error = NativeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), NativeError> {
        self.next_key = Some(key_text(lenient(key)));
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), NativeError> {
        let key = self.next_key.take().unwrap_or_default();
        self.map.insert(key, lenient(value));
        Ok(())
    }

    fn end(self) -> Result<Value, NativeError> {
        Ok(Value::Object(self.map))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Value;
    type Error = NativeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), NativeError> {
        self.map.insert(key.to_string(), lenient(value));
        Ok(())
    }

    fn end(self) -> Result<Value, NativeError> {
        Ok(Value::Object(self.map))
    }
}

impl ser::SerializeStructVariant for VariantMapBuilder {
    type Ok = Value;
    type Error = NativeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), NativeError> {
        self.map.insert(key.to_string(), lenient(value));
        Ok(())
    }

    fn end(self) -> Result<Value, NativeError> {
        Ok(tagged(self.variant, Value::Object(self.map)))
    }
}
