// src/lib.rs
pub mod colors;
pub mod diagnostics;
pub mod error;
pub mod formatters;
pub mod input_format;
pub mod output_format;
pub mod pipeline;
pub mod source;

pub use error::*;
pub use pipeline::*;

pub use diagnostics::{CollectingDiagnostics, Diagnostic, Diagnostics, Stage, TracingDiagnostics};
pub use input_format::{InputFormat, JsonParser, RawParser, RecordParser};
pub use output_format::OutputFormat;
pub use pipeline::config::{ConfigFile, PipelineConfig, ResolvedPipeline};
pub use pipeline::context::{ProcessingStats, RecordContext, RecordData};
pub use pipeline::filter::{parse_key_list, FilterRule};
pub use pipeline::stream::StreamPipeline;
pub use pipeline::transform::{RecordTransformer, TransformFailure, TransformerKind};
pub use source::{open_source, EventSource, Framing, IterSource, ReaderSource, SourceLocation, SourceOptions};
