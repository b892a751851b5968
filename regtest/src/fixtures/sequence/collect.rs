//! Serializer that turns caller data into [`Scalar`]s directly.
//!
//! Going through `serde_json::Value` would turn every non-finite float into
//! `null`; collecting here keeps `inf`, `-inf` and `NaN` apart.

use std::fmt;

use serde::ser::{self, Impossible, Serialize};

use super::Scalar;

/// A bare scalar or a flat list of scalars.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Collected {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl Collected {
    pub(super) fn into_values(self) -> Vec<Scalar> {
        match self {
            Collected::Scalar(s) => vec![s],
            Collected::List(values) => values,
        }
    }
}

/// What was found where a scalar was expected, and at which list position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct CollectError {
    pub index: Option<usize>,
    pub found: String,
}

impl CollectError {
    fn found(found: impl Into<String>) -> Self {
        Self {
            index: None,
            found: found.into(),
        }
    }

    /// Position in the top-level list; outer positions replace inner ones.
    fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl fmt::Display for CollectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "unexpected {} at position {i}", self.found),
            None => write!(f, "unexpected {}", self.found),
        }
    }
}

impl std::error::Error for CollectError {}

impl ser::Error for CollectError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::found(msg.to_string())
    }
}

pub(super) fn collect<T: Serialize + ?Sized>(value: &T) -> Result<Collected, CollectError> {
    value.serialize(ScalarSerializer)
}

struct ScalarSerializer;

type Done = Result<Collected, CollectError>;

fn scalar(s: Scalar) -> Done {
    Ok(Collected::Scalar(s))
}

impl ser::Serializer for ScalarSerializer {
    type Ok = Collected;
    type Error = CollectError;

    type SerializeSeq = ListCollector;
    type SerializeTuple = ListCollector;
    type SerializeTupleStruct = ListCollector;
    type SerializeTupleVariant = Impossible<Collected, CollectError>;
    type SerializeMap = Impossible<Collected, CollectError>;
    type SerializeStruct = Impossible<Collected, CollectError>;
    type SerializeStructVariant = Impossible<Collected, CollectError>;

    fn serialize_bool(self, v: bool) -> Done {
        scalar(Scalar::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Done {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Done {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Done {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Done {
        scalar(Scalar::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Done {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Done {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Done {
        scalar(Scalar::Int(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Done {
        match i64::try_from(v) {
            Ok(i) => scalar(Scalar::Int(i)),
            Err(_) => scalar(Scalar::Float(v as f64)),
        }
    }

    fn serialize_f32(self, v: f32) -> Done {
        scalar(Scalar::Float(v.into()))
    }

    fn serialize_f64(self, v: f64) -> Done {
        scalar(Scalar::Float(v))
    }

    fn serialize_char(self, v: char) -> Done {
        scalar(Scalar::Text(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Done {
        scalar(Scalar::Text(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Done {
        Ok(Collected::List(v.iter().map(|&b| Scalar::Int(b.into())).collect()))
    }

    fn serialize_none(self) -> Done {
        scalar(Scalar::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Done {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Done {
        scalar(Scalar::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Done {
        scalar(Scalar::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Done {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Done {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Done {
        Err(CollectError::found("mapping"))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<ListCollector, CollectError> {
        Ok(ListCollector::new(len))
    }

    fn serialize_tuple(self, len: usize) -> Result<ListCollector, CollectError> {
        Ok(ListCollector::new(Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<ListCollector, CollectError> {
        Ok(ListCollector::new(Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, CollectError> {
        Err(CollectError::found("mapping"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, CollectError> {
        Err(CollectError::found("mapping"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, CollectError> {
        Err(CollectError::found("mapping"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, CollectError> {
        Err(CollectError::found("mapping"))
    }
}

/// Elements of a top-level list; nested lists and mappings are rejected.
struct ListCollector {
    values: Vec<Scalar>,
}

impl ListCollector {
    fn new(len: Option<usize>) -> Self {
        Self {
            values: Vec::with_capacity(len.unwrap_or(0)),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CollectError> {
        let index = self.values.len();
        match value.serialize(ScalarSerializer) {
            Ok(Collected::Scalar(s)) => {
                self.values.push(s);
                Ok(())
            }
            Ok(Collected::List(_)) => Err(CollectError::found("list").at(index)),
            Err(e) => Err(e.at(index)),
        }
    }
}

impl ser::SerializeSeq for ListCollector {
    type Ok = Collected;
    type Error = CollectError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CollectError> {
        self.push(value)
    }

    fn end(self) -> Done {
        Ok(Collected::List(self.values))
    }
}

impl ser::SerializeTuple for ListCollector {
    type Ok = Collected;
    type Error = CollectError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CollectError> {
        self.push(value)
    }

    fn end(self) -> Done {
        Ok(Collected::List(self.values))
    }
}

impl ser::SerializeTupleStruct for ListCollector {
    type Ok = Collected;
    type Error = CollectError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), CollectError> {
        self.push(value)
    }

    fn end(self) -> Done {
        Ok(Collected::List(self.values))
    }
}
