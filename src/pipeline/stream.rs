use std::io::{ErrorKind, Write};
use std::time::Instant;

use crate::diagnostics::{Diagnostics, RecordFailure, Stage};
use crate::error::{PipelineError, ProcessingError};
use crate::formatters::RecordFormatter;
use crate::input_format::{create_parser, RecordParser};
use crate::output_format::create_formatter;
use crate::pipeline::config::ResolvedPipeline;
use crate::pipeline::context::{ProcessingStats, RecordContext, RecordData};
use crate::pipeline::filter::FilterRule;
use crate::pipeline::transform::RecordTransformer;
use crate::source::EventSource;

/// Reads, parses, transforms, filters and formats one record at a time.
///
/// A record that fails to parse or render is reported to the diagnostics and
/// skipped; a transformer that cannot handle a record passes it on unchanged.
/// Only source and sink failures end a run.
pub struct StreamPipeline<D: Diagnostics> {
    parser: Box<dyn RecordParser>,
    transformers: Vec<Box<dyn RecordTransformer>>,
    filter: FilterRule,
    formatter: Box<dyn RecordFormatter>,
    max_record_length: usize,
    diagnostics: D,
    stats: ProcessingStats,
}

impl<D: Diagnostics> StreamPipeline<D> {
    pub fn new(
        parser: Box<dyn RecordParser>,
        formatter: Box<dyn RecordFormatter>,
        diagnostics: D,
    ) -> Self {
        StreamPipeline {
            parser,
            transformers: Vec::new(),
            filter: FilterRule::Identity,
            formatter,
            max_record_length: usize::MAX,
            diagnostics,
            stats: ProcessingStats::default(),
        }
    }

    /// Build every stage from a resolved configuration
    pub fn from_resolved(resolved: &ResolvedPipeline, use_colors: bool, diagnostics: D) -> Self {
        let mut pipeline = Self::new(
            create_parser(resolved.parser),
            create_formatter(resolved.formatter, use_colors),
            diagnostics,
        );
        for kind in &resolved.transformers {
            pipeline.add_transformer(kind.create());
        }
        pipeline.set_filter(resolved.filter.clone());
        pipeline.set_max_record_length(resolved.max_record_length);
        pipeline
    }

    /// Append a transformer; transformers run in the order they were added
    pub fn add_transformer(&mut self, transformer: Box<dyn RecordTransformer>) {
        self.transformers.push(transformer);
    }

    pub fn set_filter(&mut self, filter: FilterRule) {
        self.filter = filter;
    }

    pub fn set_max_record_length(&mut self, max_record_length: usize) {
        self.max_record_length = max_record_length;
    }

    pub fn transformer_names(&self) -> Vec<&str> {
        self.transformers.iter().map(|t| t.name()).collect()
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> D {
        self.diagnostics
    }

    /// Stats of the current or last run
    pub fn get_stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Run until the source is exhausted or a source/sink error occurs
    pub fn run<S, W>(&mut self, source: &mut S, output: &mut W) -> Result<ProcessingStats, PipelineError>
    where
        S: EventSource + ?Sized,
        W: Write + ?Sized,
    {
        let start_time = Instant::now();
        self.stats = ProcessingStats::default();

        // Transformer state lives for one run
        for transformer in &mut self.transformers {
            transformer.reset();
        }

        let result = loop {
            let raw = match source.read_record() {
                Ok(Some(raw)) => raw,
                Ok(None) => break Ok(()),
                Err(e) => break Err(PipelineError::Source(e)),
            };

            self.stats.records_read += 1;
            let ctx = RecordContext {
                record_number: self.stats.records_read,
                raw: &raw,
            };

            let Some(rendered) = self.process_record(&ctx) else {
                continue;
            };

            match write_unit(output, &rendered) {
                Ok(()) => self.stats.records_output += 1,
                // Downstream consumer went away
                Err(e) if e.kind() == ErrorKind::BrokenPipe => break Ok(()),
                Err(e) => break Err(PipelineError::Sink(e)),
            }
        };

        self.stats.processing_time = start_time.elapsed();
        result.map(|()| self.stats.clone())
    }

    /// Parse, transform, filter and render one record.
    /// Returns `None` when the record failed and must produce no output.
    pub fn process_record(&mut self, ctx: &RecordContext) -> Option<String> {
        if ctx.raw.len() > self.max_record_length {
            let error = ProcessingError::RecordTooLong {
                length: ctx.raw.len(),
                max_length: self.max_record_length,
            };
            self.stats.parse_failures += 1;
            self.report(ctx, Stage::Parse, &error);
            return None;
        }

        let mut record = match self.parser.parse_record(ctx.raw) {
            Ok(record) => record,
            Err(error) => {
                self.stats.parse_failures += 1;
                self.report(ctx, Stage::Parse, &error);
                return None;
            }
        };

        record = self.apply_transformers(record, ctx);
        record = self.filter.apply(record);

        match self.formatter.format_record(&record, ctx) {
            Ok(rendered) => Some(rendered),
            Err(error) => {
                self.stats.render_failures += 1;
                self.report(ctx, Stage::Format, &error);
                None
            }
        }
    }

    fn apply_transformers(&mut self, mut record: RecordData, ctx: &RecordContext) -> RecordData {
        for transformer in &mut self.transformers {
            record = match transformer.apply(record, ctx) {
                Ok(transformed) => transformed,
                Err(failure) => {
                    let name = transformer.name().to_string();
                    let error = ProcessingError::TransformFailure {
                        transformer: name.clone(),
                        reason: failure.reason,
                    };
                    self.stats.transform_failures += 1;
                    self.diagnostics.record_failed(&RecordFailure {
                        record_number: ctx.record_number,
                        stage: Stage::Transform(name),
                        raw: ctx.raw,
                        error: &error,
                    });
                    failure.record
                }
            };
        }
        record
    }

    fn report(&mut self, ctx: &RecordContext, stage: Stage, error: &ProcessingError) {
        self.diagnostics.record_failed(&RecordFailure {
            record_number: ctx.record_number,
            stage,
            raw: ctx.raw,
            error,
        });
    }
}

/// Write one rendered unit followed by a newline, then flush
fn write_unit<W: Write + ?Sized>(output: &mut W, rendered: &str) -> std::io::Result<()> {
    output.write_all(rendered.as_bytes())?;
    output.write_all(b"\n")?;
    output.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingDiagnostics, Diagnostic};
    use crate::error::SourceError;
    use crate::formatters::json::JsonFormatter;
    use crate::input_format::JsonParser;
    use crate::pipeline::transform::TransformFailure;
    use crate::source::IterSource;

    fn source(records: &[&str]) -> IterSource<std::vec::IntoIter<Result<String, SourceError>>> {
        IterSource::new(
            records
                .iter()
                .map(|r| Ok(r.to_string()))
                .collect::<Vec<_>>()
                .into_iter(),
        )
    }

    fn json_pipeline() -> StreamPipeline<CollectingDiagnostics> {
        StreamPipeline::new(
            Box::new(JsonParser::new()),
            Box::new(JsonFormatter::new()),
            CollectingDiagnostics::new(),
        )
    }

    /// Appends its tag to the `seen` field
    struct Tagger {
        tag: &'static str,
    }

    impl RecordTransformer for Tagger {
        fn apply(&mut self, record: RecordData, _ctx: &RecordContext) -> Result<RecordData, TransformFailure> {
            match record {
                RecordData::Structured(serde_json::Value::Object(mut obj)) => {
                    let seen = obj
                        .get("seen")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    obj.insert("seen".into(), format!("{}{}", seen, self.tag).into());
                    Ok(RecordData::Structured(obj.into()))
                }
                other => Err(TransformFailure::new(other, "not an object")),
            }
        }

        fn name(&self) -> &str {
            self.tag
        }
    }

    #[test]
    fn test_malformed_record_does_not_stop_run() {
        let mut pipeline = json_pipeline();
        let mut output = Vec::new();
        let stats = pipeline
            .run(&mut source(&[r#"{"a":1}"#, r#"{"a":"#, r#"{"a":2}"#]), &mut output)
            .unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "{\"a\":1}\n{\"a\":2}\n");
        assert_eq!(stats.records_read, 3);
        assert_eq!(stats.records_output, 2);
        assert_eq!(stats.parse_failures, 1);

        let failures = pipeline.diagnostics().failures();
        assert_eq!(failures.len(), 1);
        match failures[0] {
            Diagnostic::RecordFailed {
                record_number,
                stage,
                raw,
                ..
            } => {
                assert_eq!(*record_number, 2);
                assert_eq!(*stage, Stage::Parse);
                assert_eq!(raw, r#"{"a":"#);
            }
            other => panic!("unexpected diagnostic {:?}", other),
        }
    }

    #[test]
    fn test_transformer_order() {
        let mut pipeline = json_pipeline();
        pipeline.add_transformer(Box::new(Tagger { tag: "1" }));
        pipeline.add_transformer(Box::new(Tagger { tag: "2" }));
        assert_eq!(pipeline.transformer_names(), vec!["1", "2"]);

        let mut output = Vec::new();
        pipeline.run(&mut source(&[r#"{"x":0}"#]), &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "{\"x\":0,\"seen\":\"12\"}\n");
    }

    #[test]
    fn test_transform_failure_passes_event_through() {
        let mut pipeline = json_pipeline();
        pipeline.add_transformer(Box::new(Tagger { tag: "t" }));

        let mut output = Vec::new();
        let stats = pipeline.run(&mut source(&["[1,2]"]), &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "[1,2]\n");
        assert_eq!(stats.transform_failures, 1);
        assert_eq!(stats.records_output, 1);
    }

    #[test]
    fn test_filter_applied_after_transformers() {
        let mut pipeline = json_pipeline();
        pipeline.add_transformer(Box::new(Tagger { tag: "t" }));
        pipeline.set_filter(FilterRule::Include(["seen".to_string()].into_iter().collect()));

        let mut output = Vec::new();
        pipeline.run(&mut source(&[r#"{"a":1}"#]), &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "{\"seen\":\"t\"}\n");
    }

    #[test]
    fn test_record_too_long() {
        let mut pipeline = json_pipeline();
        pipeline.set_max_record_length(8);

        let mut output = Vec::new();
        let stats = pipeline
            .run(&mut source(&[r#"{"long":"value"}"#, r#"{"a":1}"#]), &mut output)
            .unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "{\"a\":1}\n");
        assert_eq!(stats.parse_failures, 1);
    }

    #[test]
    fn test_source_error_is_fatal() {
        let mut pipeline = json_pipeline();
        let mut failing = IterSource::new(
            vec![
                Ok(r#"{"a":1}"#.to_string()),
                Err(SourceError::Io(std::io::Error::new(
                    ErrorKind::ConnectionReset,
                    "connection reset",
                ))),
                Ok(r#"{"a":2}"#.to_string()),
            ]
            .into_iter(),
        );

        let mut output = Vec::new();
        let err = pipeline.run(&mut failing, &mut output).unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
        assert_eq!(String::from_utf8(output).unwrap(), "{\"a\":1}\n");
    }

    struct FailingSink {
        kind: ErrorKind,
    }

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(self.kind, "sink failed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_error_is_fatal() {
        let mut pipeline = json_pipeline();
        let mut sink = FailingSink {
            kind: ErrorKind::PermissionDenied,
        };
        let err = pipeline
            .run(&mut source(&[r#"{"a":1}"#]), &mut sink)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Sink(_)));
    }

    #[test]
    fn test_broken_pipe_ends_run_cleanly() {
        let mut pipeline = json_pipeline();
        let mut sink = FailingSink {
            kind: ErrorKind::BrokenPipe,
        };
        let stats = pipeline
            .run(&mut source(&[r#"{"a":1}"#, r#"{"a":2}"#]), &mut sink)
            .unwrap();
        assert_eq!(stats.records_read, 1);
        assert_eq!(stats.records_output, 0);
    }

    #[test]
    fn test_stats_reset_between_runs() {
        let mut pipeline = json_pipeline();

        let mut output = Vec::new();
        pipeline
            .run(&mut source(&[r#"{"a":1}"#, r#"{"a":2}"#]), &mut output)
            .unwrap();
        let stats = pipeline.run(&mut source(&[r#"{"a":3}"#]), &mut output).unwrap();
        assert_eq!(stats.records_read, 1);
    }
}
