use crate::diagnostics::Diagnostics;
use crate::error::ConfigError;
use crate::input_format::InputFormat;
use crate::output_format::OutputFormat;
use crate::pipeline::filter::{clean_keys, FilterRule};
use crate::pipeline::transform::TransformerKind;
use crate::source::Framing;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration surface consumed by the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Copy records to the output without parsing
    pub raw: bool,
    pub include_keys: Option<Vec<String>>,
    pub exclude_keys: Option<Vec<String>>,
    /// Transformer names, applied in this order
    pub transformers: Vec<String>,
    /// Requested formatter; `None` means the default
    pub formatter: Option<OutputFormat>,
    pub max_record_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            raw: false,
            include_keys: None,
            exclude_keys: None,
            transformers: Vec::new(),
            formatter: None,
            max_record_length: 1048576, // 1MB
        }
    }
}

/// Stage selection after validation and precedence rules
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPipeline {
    pub parser: InputFormat,
    pub transformers: Vec<TransformerKind>,
    pub filter: FilterRule,
    pub formatter: OutputFormat,
    pub max_record_length: usize,
}

impl PipelineConfig {
    /// Validate the configuration and pick the concrete stages.
    ///
    /// Raw mode wins over every other option: the parser and formatter are
    /// forced to raw and no filtering or transforming happens. Each ignored
    /// option is reported as a warning.
    pub fn resolve(
        &self,
        diagnostics: &mut dyn Diagnostics,
    ) -> Result<ResolvedPipeline, ConfigError> {
        let include = self
            .include_keys
            .as_ref()
            .map(|keys| clean_keys(keys.iter().map(String::as_str)))
            .transpose()?;
        let exclude = self
            .exclude_keys
            .as_ref()
            .map(|keys| clean_keys(keys.iter().map(String::as_str)))
            .transpose()?;
        let filter = FilterRule::from_keys(include.as_deref(), exclude.as_deref())?;

        if self.raw {
            if include.is_some() {
                diagnostics.warning("Ignoring include keys because --raw was specified");
            }
            if exclude.is_some() {
                diagnostics.warning("Ignoring exclude keys because --raw was specified");
            }
            if !self.transformers.is_empty() {
                diagnostics.warning(&format!(
                    "Ignoring transformers {} because --raw was specified",
                    self.transformers.join(",")
                ));
            }
            if let Some(format) = self.formatter.filter(|f| *f != OutputFormat::Raw) {
                diagnostics.warning(&format!(
                    "Ignoring formatter {} because --raw was specified",
                    format
                ));
            }

            return Ok(ResolvedPipeline {
                parser: InputFormat::Raw,
                transformers: Vec::new(),
                filter: FilterRule::Identity,
                formatter: OutputFormat::Raw,
                max_record_length: self.max_record_length,
            });
        }

        let transformers = self
            .transformers
            .iter()
            .map(|name| {
                TransformerKind::from_name(name).unwrap_or_else(|| {
                    diagnostics.warning(&format!(
                        "Unknown transformer '{}', using identity",
                        name
                    ));
                    TransformerKind::Identity
                })
            })
            .collect();

        Ok(ResolvedPipeline {
            parser: InputFormat::Json,
            transformers,
            filter,
            formatter: self.formatter.unwrap_or_default(),
            max_record_length: self.max_record_length,
        })
    }
}

/// YAML config file. Every field is optional; command-line options take precedence.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub source: Option<String>,
    pub output: Option<PathBuf>,
    pub raw: Option<bool>,
    pub include_keys: Option<Vec<String>>,
    pub exclude_keys: Option<Vec<String>>,
    pub transformers: Option<Vec<String>>,
    pub formatter: Option<OutputFormat>,
    pub framing: Option<Framing>,
    /// Read timeout for network sources, e.g. "30s"
    pub timeout: Option<String>,
    pub max_record_length: Option<usize>,
    pub color: Option<bool>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_yaml(&content).map_err(|reason| ConfigError::FileParse {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    }

    pub fn read_timeout(&self) -> Result<Option<Duration>, String> {
        self.timeout
            .as_deref()
            .map(|t| humantime::parse_duration(t).map_err(|e| format!("timeout '{}': {}", t, e)))
            .transpose()
    }
}
