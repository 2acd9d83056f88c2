use crate::formatters::json::JsonFormatter;
use crate::formatters::line::LineFormatter;
use crate::formatters::raw::RawFormatter;
use crate::formatters::RecordFormatter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[value(name = "line", help = "One key=value line per event")]
    Line,
    #[default]
    #[value(name = "json", help = "One compact JSON document per event")]
    Json,
    #[value(name = "raw", help = "Records exactly as received")]
    Raw,
}

impl OutputFormat {
    pub fn name(self) -> &'static str {
        match self {
            OutputFormat::Line => "line",
            OutputFormat::Json => "json",
            OutputFormat::Raw => "raw",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the formatter for an output format
pub fn create_formatter(format: OutputFormat, use_colors: bool) -> Box<dyn RecordFormatter> {
    match format {
        OutputFormat::Line => Box::new(LineFormatter::new(use_colors)),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
        OutputFormat::Raw => Box::new(RawFormatter::new()),
    }
}
