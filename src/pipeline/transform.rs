use crate::pipeline::context::{RecordContext, RecordData};
use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Value};

/// A transformer could not handle the event's shape. Carries the event back
/// so the pipeline can pass it on unmodified.
#[derive(Debug)]
pub struct TransformFailure {
    pub record: RecordData,
    pub reason: String,
}

impl TransformFailure {
    pub fn new(record: RecordData, reason: impl Into<String>) -> Self {
        TransformFailure {
            record,
            reason: reason.into(),
        }
    }
}

/// One step of the transformer chain
pub trait RecordTransformer: Send {
    fn apply(
        &mut self,
        record: RecordData,
        ctx: &RecordContext,
    ) -> Result<RecordData, TransformFailure>;
    fn name(&self) -> &str;
    fn reset(&mut self) {} // Called between runs
}

/// Transformers selectable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformerKind {
    Identity,
    Statement,
    Timestamp,
    Dummy,
}

impl TransformerKind {
    /// Resolve a configured name. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "identity" => Some(TransformerKind::Identity),
            "statement" | "stmt" => Some(TransformerKind::Statement),
            "timestamp" | "time" => Some(TransformerKind::Timestamp),
            "dummy" => Some(TransformerKind::Dummy),
            _ => None,
        }
    }

    pub fn create(self) -> Box<dyn RecordTransformer> {
        match self {
            TransformerKind::Identity => Box::new(IdentityTransformer),
            TransformerKind::Statement => Box::new(StatementTransformer::new()),
            TransformerKind::Timestamp => Box::new(TimestampTransformer::new()),
            TransformerKind::Dummy => Box::new(DummyTransformer),
        }
    }
}

pub struct IdentityTransformer;

impl RecordTransformer for IdentityTransformer {
    fn apply(&mut self, record: RecordData, _ctx: &RecordContext) -> Result<RecordData, TransformFailure> {
        Ok(record)
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Placeholder step used to exercise chain composition
pub struct DummyTransformer;

impl RecordTransformer for DummyTransformer {
    fn apply(&mut self, record: RecordData, _ctx: &RecordContext) -> Result<RecordData, TransformFailure> {
        Ok(record)
    }

    fn name(&self) -> &str {
        "dummy"
    }
}

/// Renders the executed instruction as a readable `stmt` field.
///
/// Profiler events describe an instruction through `module`, `function` (or
/// `operator`) and an `args` list whose entries carry either a `ret` or an
/// `arg` index plus a variable name and, for constants, a value. The result
/// looks like `X_3 := algebra.projection(X_1, X_2);`.
///
/// Events without those keys fall back to an existing `short` field, and are
/// otherwise returned unchanged.
pub struct StatementTransformer {
    target_key: String,
}

impl StatementTransformer {
    pub fn new() -> Self {
        StatementTransformer {
            target_key: "stmt".to_string(),
        }
    }

    fn build_statement(obj: &Map<String, Value>) -> Option<String> {
        let module = obj.get("module")?.as_str()?;
        let function = obj
            .get("function")
            .or_else(|| obj.get("operator"))?
            .as_str()?;

        let mut returns = Vec::new();
        let mut arguments = Vec::new();
        if let Some(args) = obj.get("args").and_then(Value::as_array) {
            for arg in args.iter().filter_map(Value::as_object) {
                let rendered = Self::render_argument(arg);
                if arg.contains_key("ret") {
                    returns.push(rendered);
                } else {
                    arguments.push(rendered);
                }
            }
        }

        let call = format!("{}.{}({});", module, function, arguments.join(", "));
        let statement = match returns.len() {
            0 => call,
            1 => format!("{} := {}", returns[0], call),
            _ => format!("({}) := {}", returns.join(", "), call),
        };
        Some(statement)
    }

    fn render_argument(arg: &Map<String, Value>) -> String {
        let name = arg
            .get("var")
            .or_else(|| arg.get("name"))
            .and_then(Value::as_str);
        let is_constant = match arg.get("const") {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        };

        match (name, arg.get("value")) {
            (Some(name), _) if !is_constant => name.to_string(),
            (_, Some(Value::String(s))) => format!("{:?}", s),
            (_, Some(value)) => value.to_string(),
            (Some(name), None) => name.to_string(),
            (None, None) => "?".to_string(),
        }
    }
}

impl Default for StatementTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordTransformer for StatementTransformer {
    fn apply(&mut self, record: RecordData, _ctx: &RecordContext) -> Result<RecordData, TransformFailure> {
        let mut obj = match record {
            RecordData::Structured(Value::Object(obj)) => obj,
            other => {
                return Err(TransformFailure::new(
                    other,
                    "statement transformer requires an object event",
                ))
            }
        };

        if let Some(statement) = Self::build_statement(&obj) {
            obj.insert(self.target_key.clone(), Value::String(statement));
        } else if let Some(short) = obj.get("short").and_then(Value::as_str) {
            let short = short.to_string();
            obj.insert(self.target_key.clone(), Value::String(short));
        }

        Ok(RecordData::Structured(Value::Object(obj)))
    }

    fn name(&self) -> &str {
        "statement"
    }
}

/// Adds an RFC 3339 `time` field derived from the `clk` key (microseconds since the epoch)
pub struct TimestampTransformer {
    source_key: String,
    target_key: String,
}

impl TimestampTransformer {
    pub fn new() -> Self {
        TimestampTransformer {
            source_key: "clk".to_string(),
            target_key: "time".to_string(),
        }
    }

    fn render(micros: i64) -> Option<String> {
        DateTime::from_timestamp_micros(micros)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
    }
}

impl Default for TimestampTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordTransformer for TimestampTransformer {
    fn apply(&mut self, record: RecordData, _ctx: &RecordContext) -> Result<RecordData, TransformFailure> {
        let mut obj = match record {
            RecordData::Structured(Value::Object(obj)) => obj,
            other => {
                return Err(TransformFailure::new(
                    other,
                    "timestamp transformer requires an object event",
                ))
            }
        };

        let micros = match obj.get(&self.source_key) {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };

        if let Some(time) = micros.and_then(Self::render) {
            obj.insert(self.target_key.clone(), Value::String(time));
        }

        Ok(RecordData::Structured(Value::Object(obj)))
    }

    fn name(&self) -> &str {
        "timestamp"
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
    fn test_from_name() {
        assert_eq!(TransformerKind::from_name("statement"), Some(TransformerKind::Statement));
        assert_eq!(TransformerKind::from_name("Dummy"), Some(TransformerKind::Dummy));
        assert_eq!(TransformerKind::from_name("nope"), None);
    }

    #[test]
    fn test_statement_from_instruction() {
        let event = json!({
            "pc": 7,
            "module": "algebra",
            "function": "projection",
            "args": [
                {"ret": 0, "var": "X_3", "type": "bat[:int]"},
                {"arg": 1, "var": "X_1", "type": "bat[:oid]"},
                {"arg": 2, "var": "X_2", "type": "bat[:int]"}
            ]
        });
        let out = StatementTransformer::new()
            .apply(RecordData::structured(event), &ctx())
            .unwrap();
        let obj = out.as_object().unwrap();
        assert_eq!(obj["stmt"], "X_3 := algebra.projection(X_1, X_2);");
        assert_eq!(obj["pc"], 7);
    }

    #[test]
    fn test_statement_renders_constants() {
        let event = json!({
            "module": "sql",
            "operator": "bind",
            "args": [
                {"ret": 0, "var": "X_5"},
                {"arg": 1, "var": "X_0"},
                {"arg": 2, "var": "C_2", "value": "sys", "const": 1},
                {"arg": 3, "value": 0}
            ]
        });
        let out = StatementTransformer::new()
            .apply(RecordData::structured(event), &ctx())
            .unwrap();
        assert_eq!(
            out.as_object().unwrap()["stmt"],
            r#"X_5 := sql.bind(X_0, "sys", 0);"#
        );
    }

    #[test]
    fn test_statement_multiple_returns() {
        let event = json!({
            "module": "group",
            "function": "group",
            "args": [
                {"ret": 0, "var": "X_7"},
                {"ret": 1, "var": "X_8"},
                {"arg": 2, "var": "X_4"}
            ]
        });
        let out = StatementTransformer::new()
            .apply(RecordData::structured(event), &ctx())
            .unwrap();
        assert_eq!(out.as_object().unwrap()["stmt"], "(X_7, X_8) := group.group(X_4);");
    }

    #[test]
    fn test_statement_falls_back_to_short() {
        let event = json!({"short": "X_1 := sql.mvc();", "pc": 1});
        let out = StatementTransformer::new()
            .apply(RecordData::structured(event), &ctx())
            .unwrap();
        assert_eq!(out.as_object().unwrap()["stmt"], "X_1 := sql.mvc();");
    }

    #[test]
    fn test_statement_missing_keys_unchanged() {
        let event = RecordData::structured(json!({"pc": 1, "state": "start"}));
        let out = StatementTransformer::new().apply(event.clone(), &ctx()).unwrap();
        assert_eq!(out, event);
    }

    #[test]
    fn test_statement_rejects_non_object() {
        let failure = StatementTransformer::new()
            .apply(RecordData::raw("text"), &ctx())
            .unwrap_err();
        assert_eq!(failure.record, RecordData::raw("text"));
    }

    #[test]
    fn test_timestamp_from_clk() {
        let event = RecordData::structured(json!({"clk": 1_700_000_000_123_456i64}));
        let out = TimestampTransformer::new().apply(event, &ctx()).unwrap();
        assert_eq!(
            out.as_object().unwrap()["time"],
            "2023-11-14T22:13:20.123456Z"
        );
    }

    #[test]
    fn test_timestamp_missing_clk_unchanged() {
        let event = RecordData::structured(json!({"pc": 1}));
        let out = TimestampTransformer::new().apply(event.clone(), &ctx()).unwrap();
        assert_eq!(out, event);
    }
}
