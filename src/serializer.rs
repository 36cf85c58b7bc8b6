//! Encoding of string lists into a single stored field.

use crate::error::{Error, Result};

/// Turns a list of strings into one storable string and back.
///
/// Used by the `*_list` hash operations on
/// [`CommandFacade`](crate::CommandFacade).
pub trait Serializer: Send + Sync {
    /// Encode `values` as one string.
    fn encode(&self, values: &[String]) -> Result<String>;

    /// Decode a string produced by [`encode`](Self::encode).
    fn decode(&self, encoded: &str) -> Result<Vec<String>>;
}

/// Stores lists as JSON arrays.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn encode(&self, values: &[String]) -> Result<String> {
        serde_json::to_string(values).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn decode(&self, encoded: &str) -> Result<Vec<String>> {
        serde_json::from_str(encoded).map_err(|e| Error::Serialization(e.to_string()))
    }
}
