//! Structured error family shared by the sweep crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SweepError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, exit codes, run indices).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

/// Canonical error type for sweep planning and execution.
///
/// `TemplateLoad` and `InvalidPlan` abort a sweep before any run is
/// dispatched. `MissingField`, `ArtifactWrite` and `ExternalProcess` are
/// scoped to a single run and normally end up in the sweep report instead of
/// being returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail", rename_all = "kebab-case")]
pub enum SweepError {
    /// Template unreadable or not well-formed XML.
    #[error("template load error: {0}")]
    TemplateLoad(ErrorInfo),
    /// A field path did not resolve inside the template.
    #[error("missing field: {0}")]
    MissingField(ErrorInfo),
    /// The derived configuration could not be written.
    #[error("artifact write error: {0}")]
    ArtifactWrite(ErrorInfo),
    /// The simulator failed to launch, exited nonzero or timed out.
    #[error("external process error: {0}")]
    ExternalProcess(ErrorInfo),
    /// The post-sweep collaborator failed.
    #[error("post-processing error: {0}")]
    PostProcessing(ErrorInfo),
    /// The plan is inconsistent (unknown axes, name collisions, bad paths).
    #[error("invalid plan: {0}")]
    InvalidPlan(ErrorInfo),
    /// Serialization of plans or reports failed.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// The sweep was cancelled before or during the run.
    #[error("cancelled: {0}")]
    Cancelled(ErrorInfo),
}

impl SweepError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SweepError::TemplateLoad(info)
            | SweepError::MissingField(info)
            | SweepError::ArtifactWrite(info)
            | SweepError::ExternalProcess(info)
            | SweepError::PostProcessing(info)
            | SweepError::InvalidPlan(info)
            | SweepError::Serde(info)
            | SweepError::Cancelled(info) => info,
        }
    }

    /// Stable kebab-case family name, matching the serialized tag.
    pub fn family(&self) -> &'static str {
        match self {
            SweepError::TemplateLoad(_) => "template-load",
            SweepError::MissingField(_) => "missing-field",
            SweepError::ArtifactWrite(_) => "artifact-write",
            SweepError::ExternalProcess(_) => "external-process",
            SweepError::PostProcessing(_) => "post-processing",
            SweepError::InvalidPlan(_) => "invalid-plan",
            SweepError::Serde(_) => "serde",
            SweepError::Cancelled(_) => "cancelled",
        }
    }

    /// Whether the error is scoped to one run rather than the whole sweep.
    pub fn is_run_scoped(&self) -> bool {
        matches!(
            self,
            SweepError::MissingField(_)
                | SweepError::ArtifactWrite(_)
                | SweepError::ExternalProcess(_)
        )
    }
}
