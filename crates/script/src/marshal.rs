//! Type marshalling between native Rust types and interpreter values.
//!
//! [`Transit`] is the capability every type crossing the scripting boundary
//! must provide: conversion to and from [`Value`], a canonical type string
//! for signatures, and a default used to synthesize the first undo of a
//! function that has never been called.
//!
//! Numeric widening between the integer and float families is accepted
//! silently; every other mismatch fails with `InvalidType`. The round-trip
//! law holds for every supported value: `from_value(into_value(v)) == v`.

use std::collections::BTreeMap;

use argus_interp::{TableId, Value};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};

use crate::classes::ClassInstance;
use crate::error::{ScriptError, ScriptResult};

/// A type that can cross the scripting boundary.
pub trait Transit: Sized {
    /// True only for `()`, which marshals to no value at all.
    const IS_VOID: bool = false;

    /// Canonical type string used in signatures.
    fn type_name() -> String;

    /// Default value, used to seed defaults and last-exec vectors.
    fn default_value() -> Self;

    /// Converts into an interpreter value.
    fn into_value(self) -> Value;

    /// Converts back from an interpreter value.
    fn from_value(value: &Value) -> ScriptResult<Self>;

    /// Runtime compatibility check used by the dispatcher's parameter
    /// type checks.
    fn compatible(value: &Value) -> bool {
        Self::from_value(value).is_ok()
    }
}

impl Transit for () {
    const IS_VOID: bool = true;

    fn type_name() -> String {
        "void".to_string()
    }

    fn default_value() -> Self {}

    fn into_value(self) -> Value {
        Value::Nil
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Nil => Ok(()),
            other => Err(ScriptError::invalid_type("void", other.type_name())),
        }
    }
}

impl Transit for bool {
    fn type_name() -> String {
        "bool".to_string()
    }

    fn default_value() -> Self {
        false
    }

    fn into_value(self) -> Value {
        Value::Boolean(self)
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Boolean(b) => Ok(*b),
            other => Err(ScriptError::invalid_type("bool", other.type_name())),
        }
    }
}

macro_rules! impl_transit_int {
    ($($t:ty => $to:ident),* $(,)?) => {
        $(
            impl Transit for $t {
                fn type_name() -> String {
                    stringify!($t).to_string()
                }

                fn default_value() -> Self {
                    0
                }

                fn into_value(self) -> Value {
                    Value::Integer(BigInt::from(self))
                }

                fn from_value(value: &Value) -> ScriptResult<Self> {
                    match value {
                        Value::Integer(i) => i.$to().ok_or_else(|| {
                            ScriptError::invalid_type(
                                stringify!($t),
                                "int (out of range)",
                            )
                        }),
                        // Fractionless floats widen into the integer family.
                        Value::Number(n) if n.fract() == 0.0 => BigInt::from_f64(*n)
                            .and_then(|b| b.$to())
                            .ok_or_else(|| {
                                ScriptError::invalid_type(
                                    stringify!($t),
                                    "number (out of range)",
                                )
                            }),
                        other => Err(ScriptError::invalid_type(
                            stringify!($t),
                            other.type_name(),
                        )),
                    }
                }
            }
        )*
    };
}

impl_transit_int!(
    i8 => to_i8,
    i16 => to_i16,
    i32 => to_i32,
    i64 => to_i64,
    u8 => to_u8,
    u16 => to_u16,
    u32 => to_u32,
    u64 => to_u64,
);

impl Transit for f32 {
    fn type_name() -> String {
        "f32".to_string()
    }

    fn default_value() -> Self {
        0.0
    }

    fn into_value(self) -> Value {
        Value::Number(self as f64)
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Number(n) => Ok(*n as f32),
            Value::Integer(i) => i
                .to_f64()
                .map(|n| n as f32)
                .ok_or_else(|| ScriptError::invalid_type("f32", "int (out of range)")),
            other => Err(ScriptError::invalid_type("f32", other.type_name())),
        }
    }
}

impl Transit for f64 {
    fn type_name() -> String {
        "f64".to_string()
    }

    fn default_value() -> Self {
        0.0
    }

    fn into_value(self) -> Value {
        Value::Number(self)
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Integer(i) => i
                .to_f64()
                .ok_or_else(|| ScriptError::invalid_type("f64", "int (out of range)")),
            other => Err(ScriptError::invalid_type("f64", other.type_name())),
        }
    }
}

impl Transit for String {
    fn type_name() -> String {
        "string".to_string()
    }

    fn default_value() -> Self {
        String::new()
    }

    fn into_value(self) -> Value {
        Value::Text(self)
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            other => Err(ScriptError::invalid_type("string", other.type_name())),
        }
    }
}

/// Raw byte-string transit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bytes(pub Vec<u8>);

impl Transit for Bytes {
    fn type_name() -> String {
        "bytes".to_string()
    }

    fn default_value() -> Self {
        Bytes(Vec::new())
    }

    fn into_value(self) -> Value {
        Value::Bytes(self.0)
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Bytes(b) => Ok(Bytes(b.clone())),
            other => Err(ScriptError::invalid_type("bytes", other.type_name())),
        }
    }
}

/// Fixed-size numeric vectors and matrices.
impl<T: Transit, const N: usize> Transit for [T; N] {
    fn type_name() -> String {
        format!("[{}; {}]", T::type_name(), N)
    }

    fn default_value() -> Self {
        std::array::from_fn(|_| T::default_value())
    }

    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(Transit::into_value).collect())
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        let items = match value {
            Value::Array(a) => a,
            other => {
                return Err(ScriptError::invalid_type(
                    Self::type_name(),
                    other.type_name(),
                ))
            }
        };
        if items.len() != N {
            return Err(ScriptError::invalid_type(
                Self::type_name(),
                format!("array of {}", items.len()),
            ));
        }
        let converted: ScriptResult<Vec<T>> = items.iter().map(T::from_value).collect();
        converted?
            .try_into()
            .map_err(|_| ScriptError::invalid_type(Self::type_name(), "array"))
    }
}

/// Ordered sequences.
impl<T: Transit> Transit for Vec<T> {
    fn type_name() -> String {
        format!("[{}]", T::type_name())
    }

    fn default_value() -> Self {
        Vec::new()
    }

    fn into_value(self) -> Value {
        Value::Array(self.into_iter().map(Transit::into_value).collect())
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            other => Err(ScriptError::invalid_type(
                Self::type_name(),
                other.type_name(),
            )),
        }
    }
}

macro_rules! impl_transit_tuple {
    ($($t:ident),+) => {
        impl<$($t: Transit),+> Transit for ($($t,)+) {
            fn type_name() -> String {
                let names = vec![$($t::type_name()),+];
                format!("({})", names.join(", "))
            }

            fn default_value() -> Self {
                ($($t::default_value(),)+)
            }

            #[allow(non_snake_case)]
            fn into_value(self) -> Value {
                let ($($t,)+) = self;
                Value::Array(vec![$($t.into_value()),+])
            }

            #[allow(non_snake_case)]
            fn from_value(value: &Value) -> ScriptResult<Self> {
                let items = match value {
                    Value::Array(a) => a,
                    other => {
                        return Err(ScriptError::invalid_type(
                            Self::type_name(),
                            other.type_name(),
                        ))
                    }
                };
                let arity = [$(stringify!($t)),+].len();
                if items.len() != arity {
                    return Err(ScriptError::invalid_type(
                        Self::type_name(),
                        format!("array of {}", items.len()),
                    ));
                }
                let mut iter = items.iter();
                $(
                    let $t = $t::from_value(iter.next().ok_or_else(|| {
                        ScriptError::invalid_type(Self::type_name(), "array")
                    })?)?;
                )+
                Ok(($($t,)+))
            }
        }
    };
}

impl_transit_tuple!(A, B);
impl_transit_tuple!(A, B, C);
impl_transit_tuple!(A, B, C, D);

/// Named structured record.
///
/// Records transit as named-field tables; missing optional fields default
/// per-type through [`Record::field_or_default`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(pub BTreeMap<String, Value>);

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Record(BTreeMap::new())
    }

    /// Stores a typed field.
    pub fn insert<T: Transit>(&mut self, name: &str, value: T) {
        self.0.insert(name.to_string(), value.into_value());
    }

    /// Reads a typed field; fails when missing.
    pub fn field<T: Transit>(&self, name: &str) -> ScriptResult<T> {
        match self.0.get(name) {
            Some(v) => T::from_value(v),
            None => Err(ScriptError::runtime(format!("missing record field {name}"))),
        }
    }

    /// Reads a typed field; missing fields yield the type's default.
    pub fn field_or_default<T: Transit>(&self, name: &str) -> ScriptResult<T> {
        match self.0.get(name) {
            Some(v) => T::from_value(v),
            None => Ok(T::default_value()),
        }
    }
}

impl Transit for Record {
    fn type_name() -> String {
        "record".to_string()
    }

    fn default_value() -> Self {
        Record::new()
    }

    fn into_value(self) -> Value {
        Value::Record(self.0)
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Record(fields) => Ok(Record(fields.clone())),
            other => Err(ScriptError::invalid_type("record", other.type_name())),
        }
    }
}

impl Transit for ClassInstance {
    fn type_name() -> String {
        "instance".to_string()
    }

    fn default_value() -> Self {
        ClassInstance::invalid()
    }

    fn into_value(self) -> Value {
        Value::Instance(self.id())
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Instance(id) => Ok(ClassInstance::from_id(*id)),
            other => Err(ScriptError::invalid_type("instance", other.type_name())),
        }
    }
}

/// Caller-visible table reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableRef(pub Option<TableId>);

impl Transit for TableRef {
    fn type_name() -> String {
        "table".to_string()
    }

    fn default_value() -> Self {
        TableRef(None)
    }

    fn into_value(self) -> Value {
        match self.0 {
            Some(id) => Value::Table(id),
            None => Value::Nil,
        }
    }

    fn from_value(value: &Value) -> ScriptResult<Self> {
        match value {
            Value::Table(id) => Ok(TableRef(Some(*id))),
            Value::Nil => Ok(TableRef(None)),
            other => Err(ScriptError::invalid_type("table", other.type_name())),
        }
    }
}
