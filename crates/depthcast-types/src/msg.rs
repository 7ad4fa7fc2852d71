//! Minimal keyed-field message.
//!
//! [`FieldMsg`] is an ordered list of typed fields addressed through a
//! [`FieldDescriptor`]. Book levels and entries travel as nested vectors of
//! sub-messages. The container has no transport attached: callers hand
//! messages to listeners and take them from writers.
//!
//! Typed readers return `Ok(None)` for an absent field and
//! [`DepthcastError::WrongFieldType`] when the field holds something that
//! cannot be widened to the requested type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{DepthcastError, FieldDescriptor, Result};

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Bool(bool),
    Char(char),
    I8(i8),
    U8(u8),
    U16(u16),
    U32(u32),
    I64(i64),
    U64(u64),
    F64(f64),
    Price(Decimal),
    Str(String),
    Time(DateTime<Utc>),
    VecMsg(Vec<FieldMsg>),
}

impl FieldValue {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Char(_) => "char",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F64(_) => "f64",
            Self::Price(_) => "price",
            Self::Str(_) => "string",
            Self::Time(_) => "time",
            Self::VecMsg(_) => "vector_msg",
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U8(v) => Some(u64::from(v)),
            Self::U16(v) => Some(u64::from(v)),
            Self::U32(v) => Some(u64::from(v)),
            Self::U64(v) => Some(v),
            Self::I8(v) => u64::try_from(v).ok(),
            Self::I64(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match *self {
            Self::Price(d) => Some(d),
            Self::F64(f) => Decimal::try_from(f).ok(),
            Self::I8(v) => Some(Decimal::from(v)),
            Self::I64(v) => Some(Decimal::from(v)),
            _ => self.as_u64().map(Decimal::from),
        }
    }

    fn as_char(&self) -> Option<char> {
        match self {
            Self::Char(c) => Some(*c),
            Self::U8(v) => Some(char::from(*v)),
            Self::I8(v) => u8::try_from(*v).ok().map(char::from),
            Self::Str(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v)
                }
            }
        )*
    };
}

impl_from_value! {
    bool => Bool,
    char => Char,
    i8 => I8,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f64 => F64,
    Decimal => Price,
    String => Str,
    DateTime<Utc> => Time,
    Vec<FieldMsg> => VecMsg,
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

/// One named, tagged field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub fid: u16,
    pub value: FieldValue,
}

/// An ordered collection of fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMsg {
    fields: Vec<Field>,
}

impl FieldMsg {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    fn position(&self, desc: &FieldDescriptor) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| desc.matches(&f.name, f.fid))
    }

    // =================================================================
    // Writing
    // =================================================================

    /// Append a field without checking for an existing one.
    pub fn add(&mut self, desc: &FieldDescriptor, value: impl Into<FieldValue>) {
        self.fields.push(Field {
            name: desc.name.clone(),
            fid: desc.fid,
            value: value.into(),
        });
    }

    /// Replace the value of an existing field, or append it.
    pub fn update(&mut self, desc: &FieldDescriptor, value: impl Into<FieldValue>) {
        match self.position(desc) {
            Some(pos) => self.fields[pos].value = value.into(),
            None => self.add(desc, value),
        }
    }

    pub fn remove(&mut self, desc: &FieldDescriptor) -> Option<FieldValue> {
        let pos = self.position(desc)?;
        Some(self.fields.remove(pos).value)
    }

    /// Drop every field, keeping the allocation.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Copy every field of `other` onto this message, replacing fields that
    /// are already present.
    pub fn merge(&mut self, other: &FieldMsg) {
        for field in &other.fields {
            let existing = self.fields.iter().position(|f| {
                if f.fid != 0 && field.fid != 0 {
                    f.fid == field.fid
                } else {
                    f.name == field.name
                }
            });
            match existing {
                Some(pos) => self.fields[pos].value = field.value.clone(),
                None => self.fields.push(field.clone()),
            }
        }
    }

    /// Move the content into a new, uniquely owned message. `self` is left
    /// empty with its previous capacity.
    #[must_use]
    pub fn detach(&mut self) -> FieldMsg {
        let capacity = self.fields.capacity();
        FieldMsg {
            fields: std::mem::replace(&mut self.fields, Vec::with_capacity(capacity)),
        }
    }

    // =================================================================
    // Reading
    // =================================================================

    #[must_use]
    pub fn get(&self, desc: &FieldDescriptor) -> Option<&FieldValue> {
        self.position(desc).map(|pos| &self.fields[pos].value)
    }

    #[must_use]
    pub fn contains(&self, desc: &FieldDescriptor) -> bool {
        self.position(desc).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn read<'a, T>(
        &'a self,
        desc: &FieldDescriptor,
        expected: &'static str,
        convert: impl FnOnce(&'a FieldValue) -> Option<T>,
    ) -> Result<Option<T>> {
        match self.get(desc) {
            None => Ok(None),
            Some(value) => convert(value).map(Some).ok_or_else(|| {
                DepthcastError::WrongFieldType {
                    field: desc.name.clone(),
                    expected,
                    found: value.type_name(),
                }
            }),
        }
    }

    pub fn try_bool(&self, desc: &FieldDescriptor) -> Result<Option<bool>> {
        self.read(desc, "bool", |v| match v {
            FieldValue::Bool(b) => Some(*b),
            other => other.as_u64().map(|n| n != 0),
        })
    }

    pub fn try_u64(&self, desc: &FieldDescriptor) -> Result<Option<u64>> {
        self.read(desc, "unsigned integer", FieldValue::as_u64)
    }

    pub fn try_u32(&self, desc: &FieldDescriptor) -> Result<Option<u32>> {
        self.read(desc, "u32", |v| v.as_u64().and_then(|n| u32::try_from(n).ok()))
    }

    pub fn try_u16(&self, desc: &FieldDescriptor) -> Result<Option<u16>> {
        self.read(desc, "u16", |v| v.as_u64().and_then(|n| u16::try_from(n).ok()))
    }

    pub fn try_u8(&self, desc: &FieldDescriptor) -> Result<Option<u8>> {
        self.read(desc, "u8", |v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
    }

    pub fn try_char(&self, desc: &FieldDescriptor) -> Result<Option<char>> {
        self.read(desc, "char", FieldValue::as_char)
    }

    pub fn try_decimal(&self, desc: &FieldDescriptor) -> Result<Option<Decimal>> {
        self.read(desc, "decimal", FieldValue::as_decimal)
    }

    pub fn try_str(&self, desc: &FieldDescriptor) -> Result<Option<&str>> {
        self.read(desc, "string", |v| match v {
            FieldValue::Str(s) => Some(s.as_str()),
            _ => None,
        })
    }

    pub fn try_time(&self, desc: &FieldDescriptor) -> Result<Option<DateTime<Utc>>> {
        self.read(desc, "time", |v| match v {
            FieldValue::Time(t) => Some(*t),
            _ => None,
        })
    }

    pub fn try_vec_msg(&self, desc: &FieldDescriptor) -> Result<Option<&[FieldMsg]>> {
        self.read(desc, "vector_msg", |v| match v {
            FieldValue::VecMsg(msgs) => Some(msgs.as_slice()),
            _ => None,
        })
    }
}
