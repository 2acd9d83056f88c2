//! Diagnostic channel for warnings and per-record failures.
//!
//! The pipeline never logs through global state; it reports to the
//! [`Diagnostics`] implementation it was constructed with. The binary uses
//! [`TracingDiagnostics`], tests and embedders can use [`CollectingDiagnostics`].

use crate::error::ProcessingError;
use std::fmt;

/// Pipeline stage a per-record failure is attributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Parse,
    Transform(String),
    Format,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Parse => f.write_str("parse"),
            Stage::Transform(name) => write!(f, "transform:{}", name),
            Stage::Format => f.write_str("format"),
        }
    }
}

/// A single record that failed in one stage
#[derive(Debug)]
pub struct RecordFailure<'a> {
    pub record_number: usize,
    pub stage: Stage,
    pub raw: &'a str,
    pub error: &'a ProcessingError,
}

pub trait Diagnostics {
    /// Configuration or operational warning
    fn warning(&mut self, message: &str);
    /// A record failed in some stage and was skipped or passed through
    fn record_failed(&mut self, failure: &RecordFailure);
    /// The run ended with an unrecoverable error
    fn fatal(&mut self, message: &str);
}

/// Forwards diagnostics to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn warning(&mut self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn record_failed(&mut self, failure: &RecordFailure) {
        match failure.stage {
            // Transform failures pass the event through, so they are not worth a warning
            Stage::Transform(_) => tracing::debug!(
                record = failure.record_number,
                stage = %failure.stage,
                raw = failure.raw,
                "{}",
                failure.error
            ),
            _ => tracing::warn!(
                record = failure.record_number,
                stage = %failure.stage,
                raw = failure.raw,
                "Failed operating on record: {}",
                failure.error
            ),
        }
    }

    fn fatal(&mut self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// An entry recorded by [`CollectingDiagnostics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Warning(String),
    RecordFailed {
        record_number: usize,
        stage: Stage,
        raw: String,
        error: String,
    },
    Fatal(String),
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default, Clone)]
pub struct CollectingDiagnostics {
    pub entries: Vec<Diagnostic>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warnings(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                Diagnostic::Warning(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, Diagnostic::RecordFailed { .. }))
            .collect()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn warning(&mut self, message: &str) {
        self.entries.push(Diagnostic::Warning(message.to_string()));
    }

    fn record_failed(&mut self, failure: &RecordFailure) {
        self.entries.push(Diagnostic::RecordFailed {
            record_number: failure.record_number,
            stage: failure.stage.clone(),
            raw: failure.raw.to_string(),
            error: failure.error.to_string(),
        });
    }

    fn fatal(&mut self, message: &str) {
        self.entries.push(Diagnostic::Fatal(message.to_string()));
    }
}
