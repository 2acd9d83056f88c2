use crate::error::ProcessingError;
use crate::pipeline::context::{RecordContext, RecordData};

/// Renders one event to a single self-delimited unit of text (without the trailing newline)
pub trait RecordFormatter {
    fn format_record(
        &self,
        record: &RecordData,
        ctx: &RecordContext,
    ) -> Result<String, ProcessingError>;
    fn name(&self) -> &str;
}

pub mod json;
pub mod line;
pub mod raw;

/// Render a JSON value as the plain text used inside a line
pub(crate) fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
