use std::fmt::{self, Display};
use std::str::FromStr;

use phago_core::errors::{ErrorInfo, SweepError};

/// Address of an element inside a template, relative to the root element.
///
/// Accepted spellings for the same field:
/// `Simulation/Fragment/numFrags`, `./Simulation/Fragment/numFrags` and the
/// anchored `/params/Simulation/Fragment/numFrags`. The anchored form only
/// resolves when the document root is named `params`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    root: Option<String>,
    segments: Vec<String>,
}

impl FieldPath {
    /// Parses a path, rejecting empty segments and wildcards.
    pub fn parse(raw: &str) -> Result<Self, SweepError> {
        let invalid = |message: &str| {
            SweepError::InvalidPlan(
                ErrorInfo::new("field_path", message).with_context("path", raw.to_string()),
            )
        };
        let trimmed = raw.trim();
        let (anchored, rest) = if let Some(rest) = trimmed.strip_prefix("./") {
            (false, rest)
        } else if let Some(rest) = trimmed.strip_prefix('/') {
            (true, rest)
        } else {
            (false, trimmed)
        };
        let mut parts: Vec<String> = rest.split('/').map(str::to_string).collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(invalid("field path contains an empty segment"));
        }
        if parts
            .iter()
            .any(|part| part == "." || part == ".." || part.contains(['*', '[', ']', '@']))
        {
            return Err(invalid("field paths address plain element names only"));
        }
        let root = if anchored {
            Some(parts.remove(0))
        } else {
            None
        };
        if parts.is_empty() {
            return Err(invalid("field path must name an element below the root"));
        }
        Ok(Self {
            root,
            segments: parts,
        })
    }

    /// Element names below the root, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Root element name required by an anchored path.
    pub fn anchored_root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Leaf element name.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl FromStr for FieldPath {
    type Err = SweepError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(root) = &self.root {
            write!(f, "/{root}/")?;
        }
        write!(f, "{}", self.segments.join("/"))
    }
}
