use crate::error::ProcessingError;
use crate::pipeline::context::RecordData;

/// How raw records are interpreted before they enter the transformer chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputFormat {
    /// Decode each record as a JSON document
    Json,
    /// Pass records through untouched
    Raw,
}

pub trait RecordParser {
    fn parse_record(&self, raw: &str) -> Result<RecordData, ProcessingError>;
    fn name(&self) -> &str;
}

#[derive(Debug, Default)]
pub struct JsonParser;

#[derive(Debug, Default)]
pub struct RawParser;

impl JsonParser {
    pub fn new() -> Self {
        Self
    }
}

impl RecordParser for JsonParser {
    fn parse_record(&self, raw: &str) -> Result<RecordData, ProcessingError> {
        serde_json::from_str(raw.trim())
            .map(RecordData::Structured)
            .map_err(|e| ProcessingError::MalformedRecord {
                reason: format!("Failed to parse JSON: {}", e),
            })
    }

    fn name(&self) -> &str {
        "json"
    }
}

impl RawParser {
    pub fn new() -> Self {
        Self
    }
}

impl RecordParser for RawParser {
    fn parse_record(&self, raw: &str) -> Result<RecordData, ProcessingError> {
        Ok(RecordData::raw(raw))
    }

    fn name(&self) -> &str {
        "raw"
    }
}

/// Build the parser for an input format
pub fn create_parser(format: InputFormat) -> Box<dyn RecordParser> {
    match format {
        InputFormat::Json => Box::new(JsonParser::new()),
        InputFormat::Raw => Box::new(RawParser::new()),
    }
}
