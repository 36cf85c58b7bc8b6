//! Reply values and command argument conversion.

use bytes::Bytes;
use std::fmt;

use crate::error::{Error, Result};

/// A value returned from the store.
///
/// Maps the RESP2 reply types. A top-level error reply surfaces as
/// [`Error::Server`]; an error nested in an array, such as one failed command
/// in an EXEC reply, stays in place as [`Value::Error`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A bulk string.
    String(Bytes),

    /// An integer reply.
    Integer(i64),

    /// An array of values.
    Array(Vec<Value>),

    /// A null bulk string or null array.
    Nil,

    /// A simple string such as `+OK` or `+QUEUED`.
    Status(String),

    /// An error reply nested inside an array.
    Error(String),
}

impl Value {
    /// Returns the value as a string slice, if it is valid UTF-8 text.
    ///
    /// # Examples
    /// ```
    /// # use ferrite_facade::Value;
    /// let val = Value::String(bytes::Bytes::from("hello"));
    /// assert_eq!(val.as_str(), Some("hello"));
    /// ```
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(b) => std::str::from_utf8(b).ok(),
            Value::Status(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns `true` if the value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Converts the value into a `String`.
    pub fn into_string(self) -> Result<String> {
        match self {
            Value::String(b) => String::from_utf8(b.to_vec())
                .map_err(|e| Error::Protocol(format!("invalid UTF-8 in string value: {}", e))),
            Value::Status(s) => Ok(s),
            Value::Integer(n) => Ok(n.to_string()),
            Value::Error(msg) => Err(Error::Server(msg)),
            other => Err(Error::UnexpectedResponse {
                expected: "string",
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// Converts the value into a `String`, mapping nil to `None`.
    pub fn into_opt_string(self) -> Result<Option<String>> {
        match self {
            Value::Nil => Ok(None),
            other => other.into_string().map(Some),
        }
    }

    /// Converts the value into raw bytes, mapping nil to `None`.
    pub fn into_opt_bytes(self) -> Result<Option<Bytes>> {
        match self {
            Value::Nil => Ok(None),
            Value::String(b) => Ok(Some(b)),
            Value::Status(s) => Ok(Some(Bytes::from(s))),
            Value::Error(msg) => Err(Error::Server(msg)),
            other => Err(Error::UnexpectedResponse {
                expected: "bulk string",
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// Converts the value into an `i64`.
    ///
    /// Bulk strings holding a decimal integer are accepted as well, since
    /// scripts and `GET` return numbers that way.
    pub fn into_integer(self) -> Result<i64> {
        match self {
            Value::Integer(n) => Ok(n),
            Value::String(ref b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::UnexpectedResponse {
                    expected: "integer",
                    actual: format!("string {}", self),
                }),
            Value::Error(msg) => Err(Error::Server(msg)),
            other => Err(Error::UnexpectedResponse {
                expected: "integer",
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// Converts an integer reply into a boolean (`1` is true).
    pub fn into_bool(self) -> Result<bool> {
        self.into_integer().map(|n| n == 1)
    }

    /// Converts a bulk string holding a float into `f64`, nil to `None`.
    pub fn into_opt_f64(self) -> Result<Option<f64>> {
        match self {
            Value::Nil => Ok(None),
            Value::Integer(n) => Ok(Some(n as f64)),
            other => {
                let s = other.into_string()?;
                s.parse::<f64>()
                    .map(Some)
                    .map_err(|_| Error::Protocol(format!("invalid float: {}", s)))
            }
        }
    }

    /// Converts the value into a `Vec<Value>`. Nil becomes an empty vector.
    pub fn into_array(self) -> Result<Vec<Value>> {
        match self {
            Value::Array(arr) => Ok(arr),
            Value::Nil => Ok(vec![]),
            Value::Error(msg) => Err(Error::Server(msg)),
            other => Err(Error::UnexpectedResponse {
                expected: "array",
                actual: other.type_name().to_string(),
            }),
        }
    }

    /// Converts an array of strings into `Vec<String>`.
    pub fn into_strings(self) -> Result<Vec<String>> {
        self.into_array()?
            .into_iter()
            .map(Value::into_string)
            .collect()
    }

    /// Converts an array whose entries may be nil into `Vec<Option<String>>`.
    pub fn into_opt_strings(self) -> Result<Vec<Option<String>>> {
        self.into_array()?
            .into_iter()
            .map(Value::into_opt_string)
            .collect()
    }

    /// Returns a human-readable type name for this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Array(_) => "array",
            Value::Nil => "nil",
            Value::Status(_) => "status",
            Value::Error(_) => "error",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(b) => match std::str::from_utf8(b) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "<binary {} bytes>", b.len()),
            },
            Value::Integer(n) => write!(f, "(integer) {}", n),
            Value::Array(arr) => {
                for (i, val) in arr.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    write!(f, "{}) {}", i + 1, val)?;
                }
                Ok(())
            }
            Value::Nil => write!(f, "(nil)"),
            Value::Status(s) => write!(f, "{}", s),
            Value::Error(msg) => write!(f, "(error) {}", msg),
        }
    }
}

/// Trait for types that can be converted into command arguments.
pub trait ToArg {
    /// Encode this value as a RESP bulk string argument.
    fn to_arg(&self) -> Bytes;
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Bytes {
        (**self).to_arg()
    }
}

impl ToArg for str {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl ToArg for [u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

macro_rules! impl_to_arg_display {
    ($($t:ty),*) => {
        $(
            impl ToArg for $t {
                fn to_arg(&self) -> Bytes {
                    Bytes::from(self.to_string())
                }
            }
        )*
    };
}

impl_to_arg_display!(i64, u64, i32, u32, usize, f64);
