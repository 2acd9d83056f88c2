use crate::error::ProcessingError;
use crate::formatters::RecordFormatter;
use crate::pipeline::context::{RecordContext, RecordData};

/// Compact single-line JSON, keys in insertion order
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormatter for JsonFormatter {
    fn format_record(
        &self,
        record: &RecordData,
        _ctx: &RecordContext,
    ) -> Result<String, ProcessingError> {
        let encoded = match record {
            RecordData::Structured(data) => serde_json::to_string(data),
            RecordData::Raw(text) => serde_json::to_string(text),
        };
        encoded.map_err(|e| ProcessingError::RenderFailure {
            formatter: self.name().to_string(),
            reason: format!("JSON encoding error: {}", e),
        })
    }

    fn name(&self) -> &str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RecordContext<'static> {
        RecordContext {
            record_number: 1,
            raw: "",
        }
    }

    #[test]
    fn test_single_line_in_insertion_order() {
        let record = RecordData::structured(json!({
            "state": "done",
            "pc": 2,
            "args": [{"var": "X_1"}]
        }));
        let out = JsonFormatter::new().format_record(&record, &ctx()).unwrap();
        assert_eq!(out, r#"{"state":"done","pc":2,"args":[{"var":"X_1"}]}"#);
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_multiline_strings_stay_on_one_line() {
        let record = RecordData::structured(json!({"stmt": "line one\nline two"}));
        let out = JsonFormatter::new().format_record(&record, &ctx()).unwrap();
        assert_eq!(out, r#"{"stmt":"line one\nline two"}"#);
    }

    #[test]
    fn test_raw_record_encoded_as_string() {
        let out = JsonFormatter::new()
            .format_record(&RecordData::raw("a \"b\""), &ctx())
            .unwrap();
        assert_eq!(out, r#""a \"b\"""#);
    }
}
