use crate::colors::ColorScheme;
use crate::error::ProcessingError;
use crate::formatters::{value_to_text, RecordFormatter};
use crate::pipeline::context::{RecordContext, RecordData};
use serde_json::{Map, Value};

/// Human-readable `key=value` line, fields in insertion order
pub struct LineFormatter {
    colors: ColorScheme,
    state_keys: Vec<&'static str>,
}

impl LineFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self {
            colors: ColorScheme::new(use_colors),
            state_keys: vec!["state", "status"],
        }
    }

    /// Format all fields of an object as space-separated key=value pairs
    pub fn format_fields(&self, obj: &Map<String, Value>) -> String {
        obj.iter()
            .map(|(key, value)| self.format_key_value_pair(key, value))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Format a single key=value pair with appropriate colors
    pub fn format_key_value_pair(&self, key: &str, value: &Value) -> String {
        format!(
            "{}{}{}",
            self.paint(self.colors.key, key),
            self.paint(self.colors.equals, "="),
            self.format_value(key, value)
        )
    }

    fn format_value(&self, key: &str, value: &Value) -> String {
        let text = value_to_text(value);
        let quoted = if self.needs_quoting(&text) {
            format!("\"{}\"", self.escape(&text))
        } else {
            text.clone()
        };

        let color = if self.state_keys.iter().any(|&sk| sk == key) {
            self.state_color(&text)
        } else {
            match value {
                Value::Number(_) => self.colors.number,
                Value::Bool(_) => self.colors.boolean,
                _ => self.colors.string,
            }
        };
        self.paint(color, &quoted)
    }

    fn state_color(&self, state: &str) -> &'static str {
        match state.to_lowercase().as_str() {
            "start" => self.colors.state_start,
            "done" => self.colors.state_done,
            _ => "",
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if color.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", color, text, self.colors.reset)
        }
    }

    /// Values with whitespace, quotes or equals signs are quoted, as are empty values
    fn needs_quoting(&self, value: &str) -> bool {
        value.is_empty()
            || value.contains(' ')
            || value.contains('\t')
            || value.contains('\n')
            || value.contains('\r')
            || value.contains('"')
            || value.contains('=')
    }

    fn escape(&self, value: &str) -> String {
        value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }
}

impl RecordFormatter for LineFormatter {
    fn format_record(
        &self,
        record: &RecordData,
        _ctx: &RecordContext,
    ) -> Result<String, ProcessingError> {
        let line = match record {
            RecordData::Raw(text) => text.clone(),
            RecordData::Structured(Value::Object(obj)) => self.format_fields(obj),
            RecordData::Structured(other) => value_to_text(other),
        };
        Ok(line)
    }

    fn name(&self) -> &str {
        "line"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn format(formatter: &LineFormatter, data: Value) -> String {
        let ctx = RecordContext {
            record_number: 1,
            raw: "",
        };
        formatter
            .format_record(&RecordData::structured(data), &ctx)
            .unwrap()
    }

    #[test]
    fn test_insertion_order() {
        let formatter = LineFormatter::new(false);
        let out = format(&formatter, json!({"state": "done", "pc": 4, "usec": 120}));
        assert_eq!(out, "state=done pc=4 usec=120");
    }

    #[test]
    fn test_quoting_behavior() {
        let formatter = LineFormatter::new(false);
        let out = format(
            &formatter,
            json!({
                "simple": "value",
                "spaced": "has spaces",
                "empty": "",
                "quoted": "has\"quotes",
                "none": null
            }),
        );
        assert!(out.contains("simple=value"));
        assert!(out.contains("spaced=\"has spaces\""));
        assert!(out.contains("empty=\"\""));
        assert!(out.contains("quoted=\"has\\\"quotes\""));
        assert!(out.ends_with("none=\"\""));
    }

    #[test]
    fn test_nested_values_as_compact_json() {
        let formatter = LineFormatter::new(false);
        let out = format(&formatter, json!({"args": [1, 2], "ok": true}));
        assert_eq!(out, "args=[1,2] ok=true");
    }

    #[test]
    fn test_output_is_single_line() {
        let formatter = LineFormatter::new(false);
        let out = format(&formatter, json!({"stmt": "a\nb"}));
        assert_eq!(out, "stmt=\"a\\nb\"");
    }

    #[test]
    fn test_colored_vs_plain_output() {
        let colored = format(&LineFormatter::new(true), json!({"state": "done"}));
        let plain = format(&LineFormatter::new(false), json!({"state": "done"}));
        assert!(colored.contains("\x1b["));
        assert!(colored.contains("state"));
        assert!(colored.contains("done"));
        assert_eq!(plain, "state=done");
    }

    #[test]
    fn test_colored_strings_stay_plain() {
        let colored = format(&LineFormatter::new(true), json!({"module": "sql", "pc": 3}));
        assert!(colored.contains("\x1b[0msql "));
        assert!(colored.ends_with("\x1b[33m3\x1b[0m"));
    }

    #[test]
    fn test_non_object_records() {
        let formatter = LineFormatter::new(false);
        assert_eq!(format(&formatter, json!("hello")), "hello");
        assert_eq!(format(&formatter, json!([1, "a"])), "[1,\"a\"]");

        let ctx = RecordContext {
            record_number: 1,
            raw: "x",
        };
        let raw = formatter
            .format_record(&RecordData::raw("plain text"), &ctx)
            .unwrap();
        assert_eq!(raw, "plain text");
    }
}
