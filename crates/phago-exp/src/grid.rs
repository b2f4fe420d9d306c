use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::AxisValue;

/// One varying dimension of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis identifier, referenced by the plan's field map.
    pub name: String,
    /// Values to visit, in order. Not sorted or deduplicated.
    pub values: Vec<AxisValue>,
    /// Unit suffix appended to the value in output directory segments.
    #[serde(default)]
    pub suffix: String,
    /// Short label used in artifact filenames. Defaults to the axis name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Whether the axis contributes to run names. Only single-valued axes may
    /// opt out.
    #[serde(default = "Axis::default_encode")]
    pub encode: bool,
}

impl Axis {
    const fn default_encode() -> bool {
        true
    }

    /// Creates an encoded axis without a unit suffix.
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AxisValue>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            suffix: String::new(),
            tag: None,
            encode: true,
        }
    }

    /// Sets the directory unit suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Sets the filename tag.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Label used in artifact filenames.
    pub fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or(&self.name)
    }
}

/// One point of the Cartesian product, with values keyed by axis name in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunPoint {
    /// Zero-based position in enumeration order.
    pub index: usize,
    /// Axis values for this point.
    pub values: IndexMap<String, AxisValue>,
}

/// Number of points in the product of `axes`.
pub fn cardinality(axes: &[Axis]) -> usize {
    axes.iter().map(|axis| axis.values.len()).product()
}

/// Enumerates the Cartesian product with the first axis outermost.
pub fn expand(axes: &[Axis]) -> Vec<RunPoint> {
    let mut outputs = Vec::with_capacity(cardinality(axes));
    expand_into(axes, 0, IndexMap::new(), &mut outputs);
    outputs
}

fn expand_into(
    axes: &[Axis],
    idx: usize,
    current: IndexMap<String, AxisValue>,
    outputs: &mut Vec<RunPoint>,
) {
    if idx == axes.len() {
        outputs.push(RunPoint {
            index: outputs.len(),
            values: current,
        });
        return;
    }
    let axis = &axes[idx];
    for value in &axis.values {
        let mut next = current.clone();
        next.insert(axis.name.clone(), value.clone());
        expand_into(axes, idx + 1, next, outputs);
    }
}
