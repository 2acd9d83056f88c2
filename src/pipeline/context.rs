use std::time::Duration;

/// An event flowing through the pipeline - either an opaque raw record or decoded structured data
#[derive(Debug, Clone, PartialEq)]
pub enum RecordData {
    /// Raw record text, passed through without interpretation
    Raw(String),
    /// Decoded structured data (usually a JSON object)
    Structured(serde_json::Value),
}

impl RecordData {
    /// Create a raw record
    pub fn raw(content: impl Into<String>) -> Self {
        RecordData::Raw(content.into())
    }

    /// Create a structured record
    pub fn structured(data: serde_json::Value) -> Self {
        RecordData::Structured(data)
    }

    /// Get structured data if this is a structured record
    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            RecordData::Structured(data) => Some(data),
            _ => None,
        }
    }

    /// Get the key/value map if this is a structured object
    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        self.as_structured().and_then(|data| data.as_object())
    }
}

/// Per-record metadata available to every stage
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    /// 1-based position of the record in the stream
    pub record_number: usize,
    /// The record exactly as the source delivered it
    pub raw: &'a str,
}

/// Runtime statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub records_read: usize,
    pub records_output: usize,
    pub parse_failures: usize,
    pub transform_failures: usize,
    pub render_failures: usize,
    pub processing_time: Duration,
}
