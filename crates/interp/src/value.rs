//! Dynamically-typed values transported across the interpreter boundary.
//!
//! `Value` is the closed set of transit representations: everything that can
//! appear on the evaluation stack, inside a table, or in a provenance
//! parameter vector is one of these variants.

use std::collections::BTreeMap;
use std::fmt;

use derive_more::From;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::error::{InterpError, InterpResult};

/// Handle to a table in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Opaque handle to an engine-registered callable.
///
/// The interpreter stores these inside tables; only the owning engine can
/// resolve one back to a function record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncKey(pub u32);

impl fmt::Display for FuncKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// A value in the interpreter.
#[derive(Debug, Clone, PartialEq, From)]
pub enum Value {
    /// The absent value.
    #[from(ignore)]
    Nil,

    /// A boolean.
    Boolean(bool),

    /// An integer of arbitrary width (covers the whole i8..u64 transit range).
    Integer(BigInt),

    /// A floating point number. Both 32- and 64-bit floats transit here.
    Number(f64),

    /// A UTF-8 string.
    Text(String),

    /// A raw byte string.
    Bytes(Vec<u8>),

    /// An ordered sequence. Fixed vectors, matrices and tuples transit here.
    Array(Vec<Value>),

    /// A named-field structured record.
    Record(BTreeMap<String, Value>),

    /// Reference to an arena table.
    Table(TableId),

    /// Handle to an engine-registered callable.
    Function(FuncKey),

    /// A class-instance handle, transported by its global instance id.
    #[from(ignore)]
    Instance(i64),
}

impl Value {
    /// Creates a boolean value.
    pub fn from_bool(value: bool) -> Self {
        Value::Boolean(value)
    }

    /// Creates an integer value.
    pub fn from_int<T: Into<BigInt>>(value: T) -> Self {
        Value::Integer(value.into())
    }

    /// Creates a floating point value.
    pub fn from_number(value: f64) -> Self {
        Value::Number(value)
    }

    /// Creates a string value.
    pub fn from_text<S: Into<String>>(value: S) -> Self {
        Value::Text(value.into())
    }

    /// Creates an instance handle value.
    pub fn from_instance(id: i64) -> Self {
        Value::Instance(id)
    }

    /// Returns the dynamic type tag of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "bool",
            Value::Integer(_) => "int",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
            Value::Table(_) => "table",
            Value::Function(_) => "function",
            Value::Instance(_) => "instance",
        }
    }

    /// Returns true if this value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns true if this value is numeric (integer or float).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Number(_))
    }

    /// Extracts a boolean.
    pub fn as_bool(&self) -> InterpResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(InterpError::type_mismatch("bool", other.type_name())),
        }
    }

    /// Extracts the integer payload.
    pub fn as_int(&self) -> InterpResult<&BigInt> {
        match self {
            Value::Integer(i) => Ok(i),
            other => Err(InterpError::type_mismatch("int", other.type_name())),
        }
    }

    /// Extracts an i64, accepting any integer that fits.
    pub fn as_i64(&self) -> InterpResult<i64> {
        match self {
            Value::Integer(i) => i
                .to_i64()
                .ok_or_else(|| InterpError::type_mismatch("int", "int (out of range)")),
            other => Err(InterpError::type_mismatch("int", other.type_name())),
        }
    }

    /// Extracts an f64, widening integers.
    pub fn as_f64(&self) -> InterpResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Integer(i) => i
                .to_f64()
                .ok_or_else(|| InterpError::type_mismatch("number", "int (out of range)")),
            other => Err(InterpError::type_mismatch("number", other.type_name())),
        }
    }

    /// Extracts a string slice.
    pub fn as_text(&self) -> InterpResult<&str> {
        match self {
            Value::Text(s) => Ok(s),
            other => Err(InterpError::type_mismatch("string", other.type_name())),
        }
    }

    /// Extracts a byte string.
    pub fn as_bytes(&self) -> InterpResult<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b),
            other => Err(InterpError::type_mismatch("bytes", other.type_name())),
        }
    }

    /// Extracts an array.
    pub fn as_array(&self) -> InterpResult<&[Value]> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(InterpError::type_mismatch("array", other.type_name())),
        }
    }

    /// Extracts a record.
    pub fn as_record(&self) -> InterpResult<&BTreeMap<String, Value>> {
        match self {
            Value::Record(r) => Ok(r),
            other => Err(InterpError::type_mismatch("record", other.type_name())),
        }
    }

    /// Extracts a table handle.
    pub fn as_table(&self) -> InterpResult<TableId> {
        match self {
            Value::Table(id) => Ok(*id),
            other => Err(InterpError::type_mismatch("table", other.type_name())),
        }
    }

    /// Extracts a function handle.
    pub fn as_function(&self) -> InterpResult<FuncKey> {
        match self {
            Value::Function(key) => Ok(*key),
            other => Err(InterpError::type_mismatch("function", other.type_name())),
        }
    }

    /// Extracts an instance id.
    pub fn as_instance(&self) -> InterpResult<i64> {
        match self {
            Value::Instance(id) => Ok(*id),
            other => Err(InterpError::type_mismatch("instance", other.type_name())),
        }
    }
}

/// Renders the value the way the provenance log prints call parameters.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => write!(f, "\"{s}\""),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
            Value::Record(fields) => {
                write!(f, "{{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name} = {value}")?;
                }
                write!(f, "}}")
            }
            Value::Table(id) => write!(f, "<table {id}>"),
            Value::Function(key) => write!(f, "<function {key}>"),
            Value::Instance(id) => write!(f, "<instance {id}>"),
        }
    }
}
