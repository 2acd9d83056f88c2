use anyhow::Context;
use clap::{ArgAction, Parser};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use stethoscope::colors::should_use_colors;
use stethoscope::{
    open_source, parse_key_list, ConfigFile, Diagnostics, Framing, OutputFormat, PipelineConfig,
    SourceLocation, SourceOptions, StreamPipeline, TracingDiagnostics,
};

#[derive(Parser, Debug)]
#[command(name = "stethoscope")]
#[command(about = "A flexible tool to manipulate database profiler streams")]
#[command(version)]
struct Args {
    /// Event source: '-' for stdin (default), a file path, or tcp://host:port
    #[arg(value_name = "SOURCE")]
    source: Option<String>,

    /// Comma separated list of keys to keep; all other keys are removed
    #[arg(short = 'i', long = "include-keys", value_name = "KEYS")]
    include_keys: Option<String>,

    /// Comma separated list of keys to remove
    #[arg(short = 'e', long = "exclude-keys", value_name = "KEYS")]
    exclude_keys: Option<String>,

    /// Copy records to the output exactly as received. Overrides keys, transformers and formatter
    #[arg(short = 'r', long)]
    raw: bool,

    /// Output formatter
    #[arg(short = 'f', long = "formatter", value_enum)]
    formatter: Option<OutputFormat>,

    /// Transformer to apply (statement, timestamp, dummy); repeat to chain in order
    #[arg(short = 't', long = "transformer", value_name = "NAME", action = ArgAction::Append)]
    transformers: Vec<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// How the input is split into records
    #[arg(long, value_enum)]
    framing: Option<Framing>,

    /// Read timeout for network sources, e.g. "30s" or "2m"
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Maximum record length in bytes
    #[arg(long, value_name = "BYTES")]
    max_record_length: Option<usize>,

    /// YAML config file; command-line options take precedence
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Force colored line output
    #[arg(long, conflicts_with = "no_color")]
    color: bool,

    /// Disable colored line output
    #[arg(long)]
    no_color: bool,

    /// Debug mode - show configuration and statistics
    #[arg(long, conflicts_with = "quiet")]
    debug: bool,

    /// Only report fatal errors
    #[arg(short = 'q', long)]
    quiet: bool,
}

/// Effective settings after merging the config file and the command line
struct Settings {
    location: SourceLocation,
    output: Option<PathBuf>,
    source_options: SourceOptions,
    pipeline: PipelineConfig,
    color: Option<bool>,
}

impl Settings {
    fn merge(args: Args, file: ConfigFile) -> anyhow::Result<Self> {
        let source = args
            .source
            .or_else(|| file.source.clone())
            .unwrap_or_else(|| "-".to_string());
        let location = SourceLocation::parse(&source)?;

        let include_keys = match args.include_keys {
            Some(list) => Some(parse_key_list(&list)?),
            None => file.include_keys.clone(),
        };
        let exclude_keys = match args.exclude_keys {
            Some(list) => Some(parse_key_list(&list)?),
            None => file.exclude_keys.clone(),
        };
        let transformers = if args.transformers.is_empty() {
            file.transformers.clone().unwrap_or_default()
        } else {
            args.transformers
        };

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            raw: args.raw || file.raw.unwrap_or(false),
            include_keys,
            exclude_keys,
            transformers,
            formatter: args.formatter.or(file.formatter),
            max_record_length: args
                .max_record_length
                .or(file.max_record_length)
                .unwrap_or(defaults.max_record_length),
        };

        let read_timeout = match args.timeout {
            Some(timeout) => Some(timeout),
            None => file
                .read_timeout()
                .map_err(|reason| anyhow::anyhow!("Invalid config file: {}", reason))?,
        };
        let source_options = SourceOptions {
            framing: args.framing.or(file.framing).unwrap_or_default(),
            read_timeout,
            max_record_length: pipeline.max_record_length,
        };

        let color = if args.color {
            Some(true)
        } else if args.no_color {
            Some(false)
        } else {
            file.color
        };

        Ok(Settings {
            location,
            output: args.output.or(file.output),
            source_options,
            pipeline,
            color,
        })
    }
}

fn init_logging(args: &Args) {
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else if args.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    let mut diagnostics = TracingDiagnostics;
    if let Err(e) = run(args, diagnostics) {
        diagnostics.fatal(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(args: Args, mut diagnostics: TracingDiagnostics) -> anyhow::Result<()> {
    let file = match &args.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let settings = Settings::merge(args, file)?;

    tracing::debug!("Input arguments");
    tracing::debug!("  Source: {:?}", settings.location);
    tracing::debug!("  Transformers: {:?}", settings.pipeline.transformers);
    tracing::debug!("  Include keys: {:?}", settings.pipeline.include_keys);
    tracing::debug!("  Exclude keys: {:?}", settings.pipeline.exclude_keys);
    tracing::debug!("  Formatter: {:?}", settings.pipeline.formatter);
    tracing::debug!("  Raw: {}", settings.pipeline.raw);
    tracing::debug!("  Framing: {:?}", settings.source_options.framing);
    tracing::debug!("  Output: {:?}", settings.output);

    let resolved = settings.pipeline.resolve(&mut diagnostics)?;
    tracing::debug!(
        formatter = %resolved.formatter,
        filter = resolved.filter.name(),
        transformers = resolved.transformers.len(),
        "Pipeline configured"
    );

    let mut source = open_source(&settings.location, settings.source_options)
        .context("Failed to open event source")?;

    let mut output: Box<dyn Write> = match &settings.output {
        Some(path) => {
            let file = File::create(path).with_context(|| {
                format!("Failed to create output file '{}'", path.display())
            })?;
            Box::new(io::BufWriter::new(file))
        }
        None => Box::new(io::stdout()),
    };

    let use_colors = settings
        .color
        .unwrap_or_else(|| settings.output.is_none() && should_use_colors());

    let mut pipeline = StreamPipeline::from_resolved(&resolved, use_colors, diagnostics);
    let stats = pipeline
        .run(&mut source, &mut output)
        .context("Processing failed")?;

    tracing::info!(
        records_read = stats.records_read,
        records_output = stats.records_output,
        parse_failures = stats.parse_failures,
        transform_failures = stats.transform_failures,
        render_failures = stats.render_failures,
        elapsed = ?stats.processing_time,
        "Stream finished"
    );

    if stats.records_read > 0 {
        let rate = stats.records_read as f64 / stats.processing_time.as_secs_f64().max(1e-9);
        tracing::debug!("Processing rate: {:.0} records/second", rate);
    }

    Ok(())
}
