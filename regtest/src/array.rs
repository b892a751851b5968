//! Homogeneous n-dimensional arrays.

use std::fmt;

use chrono::{NaiveDateTime, TimeDelta};
use num_complex::Complex64;

use crate::error::{RegressError, Result};
use crate::kind::{format_shape, Kind};
use crate::structural::Structured;

/// Flat, row-major element storage of an [`NdArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    Complex(Vec<Complex64>),
    Text(Vec<String>),
    DateTime(Vec<NaiveDateTime>),
    /// Not supported by array checks.
    TimeDelta(Vec<TimeDelta>),
    /// Byte strings; not supported by array checks.
    Bytes(Vec<Vec<u8>>),
    /// Opaque values; not supported by array checks.
    Object(Vec<serde_json::Value>),
    /// Raw fixed-size records; not supported by array checks.
    Raw(Vec<Vec<u8>>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Bool(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::UInt(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Complex(v) => v.len(),
            ArrayData::Text(v) => v.len(),
            ArrayData::DateTime(v) => v.len(),
            ArrayData::TimeDelta(v) => v.len(),
            ArrayData::Bytes(v) => v.len(),
            ArrayData::Object(v) => v.len(),
            ArrayData::Raw(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> Kind {
        match self {
            ArrayData::Bool(_) => Kind::Bool,
            ArrayData::Int(_) => Kind::Int,
            ArrayData::UInt(_) => Kind::UInt,
            ArrayData::Float(_) => Kind::Float,
            ArrayData::Complex(_) => Kind::Complex,
            ArrayData::Text(_) => Kind::Text,
            ArrayData::DateTime(_) => Kind::DateTime,
            ArrayData::TimeDelta(_) => Kind::TimeDelta,
            ArrayData::Bytes(_) => Kind::Bytes,
            ArrayData::Object(_) => Kind::Object,
            ArrayData::Raw(_) => Kind::Raw,
        }
    }

    /// Element at flat index `i`.
    pub fn get(&self, i: usize) -> Option<Element<'_>> {
        Some(match self {
            ArrayData::Bool(v) => Element::Bool(*v.get(i)?),
            ArrayData::Int(v) => Element::Int(*v.get(i)?),
            ArrayData::UInt(v) => Element::UInt(*v.get(i)?),
            ArrayData::Float(v) => Element::Float(*v.get(i)?),
            ArrayData::Complex(v) => Element::Complex(*v.get(i)?),
            ArrayData::Text(v) => Element::Text(v.get(i)?),
            ArrayData::DateTime(v) => Element::DateTime(*v.get(i)?),
            ArrayData::TimeDelta(_)
            | ArrayData::Bytes(_)
            | ArrayData::Object(_)
            | ArrayData::Raw(_) => {
                if i < self.len() {
                    Element::Opaque
                } else {
                    return None;
                }
            }
        })
    }
}

macro_rules! array_data_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$ty>> for ArrayData {
                fn from(v: Vec<$ty>) -> Self {
                    ArrayData::$variant(v)
                }
            }
        )*
    };
}

array_data_from!(
    bool => Bool,
    i64 => Int,
    u64 => UInt,
    f64 => Float,
    Complex64 => Complex,
    String => Text,
    NaiveDateTime => DateTime,
);

impl From<Vec<i32>> for ArrayData {
    fn from(v: Vec<i32>) -> Self {
        ArrayData::Int(v.into_iter().map(i64::from).collect())
    }
}

impl From<Vec<&str>> for ArrayData {
    fn from(v: Vec<&str>) -> Self {
        ArrayData::Text(v.into_iter().map(str::to_string).collect())
    }
}

/// A borrowed array element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Element<'a> {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Complex(Complex64),
    Text(&'a str),
    DateTime(NaiveDateTime),
    Opaque,
}

impl Element<'_> {
    /// Complex view of a numeric element.
    pub fn as_complex(&self) -> Option<Complex64> {
        match *self {
            Element::Complex(c) => Some(c),
            _ => self.as_f64().map(|re| Complex64::new(re, 0.0)),
        }
    }

    /// Real view of a non-complex numeric element.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Element::Int(v) => Some(v as f64),
            Element::UInt(v) => Some(v as f64),
            Element::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Exact integer view, wide enough for both signed and unsigned 64-bit.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Element::Int(v) => Some(i128::from(v)),
            Element::UInt(v) => Some(i128::from(v)),
            _ => None,
        }
    }
}

impl fmt::Display for Element<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Bool(b) => write!(f, "{}", crate::table::bool_label(*b)),
            Element::Int(v) => write!(f, "{v}"),
            Element::UInt(v) => write!(f, "{v}"),
            Element::Float(v) => write!(f, "{v:?}"),
            Element::Complex(c) => write!(f, "({:?}{:+?}j)", c.re, c.im),
            Element::Text(s) => write!(f, "{s}"),
            Element::DateTime(d) => write!(f, "{}", d.format("%Y-%m-%dT%H:%M:%S%.f")),
            Element::Opaque => write!(f, "?"),
        }
    }
}

/// Array with a shape and row-major data.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    shape: Vec<usize>,
    data: ArrayData,
}

impl NdArray {
    /// The product of `shape` must equal the number of elements.
    pub fn new(shape: Vec<usize>, data: impl Into<ArrayData>) -> Result<Self> {
        let data = data.into();
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(RegressError::validation(
                "shape",
                format!(
                    "shape {} needs {expected} elements, got {}",
                    format_shape(&shape),
                    data.len()
                ),
            ));
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional array.
    pub fn from_vec(data: impl Into<ArrayData>) -> Self {
        let data = data.into();
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Zero-dimensional array holding one element.
    pub fn scalar(data: impl Into<ArrayData>) -> Result<Self> {
        Self::new(Vec::new(), data)
    }

    pub fn reshape(self, shape: Vec<usize>) -> Result<Self> {
        Self::new(shape, self.data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn kind(&self) -> Kind {
        self.data.kind()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Coordinates of flat index `flat` in row-major order.
    pub fn unravel(&self, mut flat: usize) -> Vec<usize> {
        let mut index = vec![0; self.shape.len()];
        for (axis, &dim) in self.shape.iter().enumerate().rev() {
            if dim == 0 {
                continue;
            }
            index[axis] = flat % dim;
            flat /= dim;
        }
        index
    }
}

impl Structured for NdArray {
    fn kind(&self) -> Kind {
        self.data.kind()
    }

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }
}
