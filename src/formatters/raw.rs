use crate::error::ProcessingError;
use crate::formatters::RecordFormatter;
use crate::pipeline::context::{RecordContext, RecordData};

/// Writes the record exactly as the source delivered it
#[derive(Debug, Default)]
pub struct RawFormatter;

impl RawFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl RecordFormatter for RawFormatter {
    fn format_record(
        &self,
        _record: &RecordData,
        ctx: &RecordContext,
    ) -> Result<String, ProcessingError> {
        Ok(ctx.raw.to_string())
    }

    fn name(&self) -> &str {
        "raw"
    }
}
