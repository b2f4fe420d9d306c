use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use phago_core::errors::{ErrorInfo, SweepError};
use phago_template::FieldPath;
use serde::{Deserialize, Serialize};

use crate::grid::Axis;
use crate::hash::stable_hash_string;
use crate::serde::{from_yaml_slice, to_yaml_string};
use crate::value::AxisValue;

fn invalid(code: &str, message: impl Into<String>) -> SweepError {
    SweepError::InvalidPlan(ErrorInfo::new(code, message))
}

/// How the simulator is launched for each run.
///
/// The command line is `program [args...] <config_flag> <artifact>
/// <output_flag> <output_dir>`, followed by `<seed_flag> <seed>` when both a
/// seed flag and a plan seed are present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Executable to launch. Looked up on `PATH` unless it contains a path
    /// separator, in which case it is resolved against the plan workdir.
    pub program: String,
    /// Leading arguments, e.g. `["-jar", "wkSimulationTBM.jar"]`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Flag preceding the parameter file path.
    #[serde(default = "Invocation::default_config_flag")]
    pub config_flag: String,
    /// Flag preceding the output directory.
    #[serde(default = "Invocation::default_output_flag")]
    pub output_flag: String,
    /// Flag preceding the per-run seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_flag: Option<String>,
}

impl Invocation {
    fn default_config_flag() -> String {
        "-p".to_string()
    }

    fn default_output_flag() -> String {
        "-o".to_string()
    }

    /// Invocation of `program` with the simulator's default flags.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            config_flag: Self::default_config_flag(),
            output_flag: Self::default_output_flag(),
            seed_flag: None,
        }
    }
}

/// Collaborator invoked once, without arguments, after a complete sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostProcess {
    /// Script or executable to run, resolved like [`Invocation::program`].
    pub program: String,
}

/// Declarative description of one experiment sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepPlan {
    /// Experiment name, used in logs and the report.
    pub name: String,
    /// Directory that relative paths resolve against and that the simulator
    /// runs in. Relative to the plan file.
    #[serde(default = "SweepPlan::default_workdir")]
    pub workdir: PathBuf,
    /// Parameter template.
    pub template: PathBuf,
    /// Root of the per-run output directory tree.
    pub output_root: PathBuf,
    /// Directory receiving the generated parameter files.
    #[serde(default = "SweepPlan::default_parameters_dir")]
    pub parameters_dir: PathBuf,
    /// Leading component of generated parameter filenames.
    #[serde(default = "SweepPlan::default_artifact_prefix")]
    pub artifact_prefix: String,
    /// Grid axes, outermost first.
    pub axes: Vec<Axis>,
    /// Axis name to template field path.
    #[serde(default)]
    pub fields: IndexMap<String, String>,
    /// Template field path to a value written into every run.
    #[serde(default)]
    pub fixed: IndexMap<String, AxisValue>,
    /// Simulator command line.
    pub invocation: Invocation,
    /// Optional collaborator run after the sweep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_process: Option<PostProcess>,
    /// Master seed for per-run simulator seeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Directory containing the plan on disk (ignored when serializing).
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl SweepPlan {
    fn default_workdir() -> PathBuf {
        PathBuf::from(".")
    }

    fn default_parameters_dir() -> PathBuf {
        PathBuf::from("parameters")
    }

    fn default_artifact_prefix() -> String {
        "abm".to_string()
    }

    /// Creates a plan with no axes, default directories and no
    /// post-processing.
    pub fn new(
        name: impl Into<String>,
        template: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        invocation: Invocation,
    ) -> Self {
        Self {
            name: name.into(),
            workdir: Self::default_workdir(),
            template: template.into(),
            output_root: output_root.into(),
            parameters_dir: Self::default_parameters_dir(),
            artifact_prefix: Self::default_artifact_prefix(),
            axes: Vec::new(),
            fields: IndexMap::new(),
            fixed: IndexMap::new(),
            invocation,
            post_process: None,
            seed: None,
            base_dir: PathBuf::new(),
        }
    }

    /// Appends an axis, optionally mapped onto a template field.
    pub fn with_axis(mut self, axis: Axis, field: Option<&str>) -> Self {
        if let Some(field) = field {
            self.fields.insert(axis.name.clone(), field.to_string());
        }
        self.axes.push(axis);
        self
    }

    /// Adds a field written with the same value in every run.
    pub fn with_fixed(mut self, field: &str, value: impl Into<AxisValue>) -> Self {
        self.fixed.insert(field.to_string(), value.into());
        self
    }

    /// Returns the deterministic hash of the plan contents.
    pub fn plan_hash(&self) -> Result<String, SweepError> {
        stable_hash_string(self)
    }

    /// Produces a YAML representation of the plan.
    pub fn to_yaml_string(&self) -> Result<String, SweepError> {
        to_yaml_string(self)
    }

    /// Directory relative paths resolve against.
    pub fn workdir_path(&self) -> PathBuf {
        resolve(&self.base_dir, &self.workdir)
    }

    /// Resolved template path.
    pub fn template_path(&self) -> PathBuf {
        resolve(&self.workdir_path(), &self.template)
    }

    /// Resolved output root.
    pub fn output_root_path(&self) -> PathBuf {
        resolve(&self.workdir_path(), &self.output_root)
    }

    /// Resolved parameter file directory.
    pub fn parameters_dir_path(&self) -> PathBuf {
        resolve(&self.workdir_path(), &self.parameters_dir)
    }

    /// Resolves a program name: bare names stay as-is for `PATH` lookup.
    pub fn program_path(&self, program: &str) -> PathBuf {
        let candidate = Path::new(program);
        if candidate.components().count() > 1 {
            resolve(&self.workdir_path(), candidate)
        } else {
            candidate.to_path_buf()
        }
    }

    /// Checks internal consistency and returns the parsed field bindings.
    ///
    /// Name collisions across the grid are checked separately when the runs
    /// are named, see [`crate::naming::name_runs`].
    pub fn validate(&self) -> Result<FieldBindings, SweepError> {
        if self.axes.is_empty() {
            return Err(invalid("plan_axes", "plan declares no axes"));
        }
        let mut names = BTreeSet::new();
        for axis in &self.axes {
            if axis.name.trim().is_empty() {
                return Err(invalid("axis_name", "axis names must not be empty"));
            }
            if !names.insert(axis.name.as_str()) {
                return Err(SweepError::InvalidPlan(
                    ErrorInfo::new("axis_duplicate", "axis declared twice")
                        .with_context("axis", axis.name.clone()),
                ));
            }
            if !axis.encode && axis.values.len() > 1 {
                return Err(SweepError::InvalidPlan(
                    ErrorInfo::new("axis_unencoded", "axis varies but is excluded from run names")
                        .with_context("axis", axis.name.clone())
                        .with_hint("set `encode: true` so runs stay distinguishable"),
                ));
            }
            if let Some(value) = axis.values.iter().find(|value| !value.is_finite()) {
                return Err(SweepError::InvalidPlan(
                    ErrorInfo::new("axis_value", "axis values must be finite")
                        .with_context("axis", axis.name.clone())
                        .with_context("value", value.render()),
                ));
            }
        }

        let mut targets = BTreeSet::new();
        let mut fixed = Vec::with_capacity(self.fixed.len());
        for (raw, value) in &self.fixed {
            let path = FieldPath::parse(raw)?;
            if !value.is_finite() {
                return Err(SweepError::InvalidPlan(
                    ErrorInfo::new("fixed_value", "fixed values must be finite")
                        .with_context("path", raw.clone()),
                ));
            }
            targets.insert(path.segments().to_vec());
            fixed.push((path, value.render()));
        }

        let mut mapped = Vec::with_capacity(self.fields.len());
        for (axis, raw) in &self.fields {
            if !names.contains(axis.as_str()) {
                return Err(SweepError::InvalidPlan(
                    ErrorInfo::new("field_axis", "field map names an undeclared axis")
                        .with_context("axis", axis.clone()),
                ));
            }
            let path = FieldPath::parse(raw)?;
            if !targets.insert(path.segments().to_vec()) {
                return Err(SweepError::InvalidPlan(
                    ErrorInfo::new("field_conflict", "template field is written twice")
                        .with_context("path", raw.clone()),
                ));
            }
            mapped.push((axis.clone(), path));
        }

        if self.artifact_prefix.contains(['/', '\\']) {
            return Err(invalid(
                "artifact_prefix",
                "artifact prefix must not contain path separators",
            ));
        }
        if self.invocation.program.trim().is_empty() {
            return Err(invalid("invocation_program", "invocation program is empty"));
        }
        Ok(FieldBindings { fixed, mapped })
    }
}

/// Parsed template writes derived from a validated plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBindings {
    /// Constant writes, applied first, in plan order.
    pub fixed: Vec<(FieldPath, String)>,
    /// Axis name to target path, in plan order.
    pub mapped: Vec<(String, FieldPath)>,
}

/// Loads a plan from YAML, recording its directory for path resolution.
pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<SweepPlan, SweepError> {
    let plan_path = path.as_ref();
    let bytes = fs::read(plan_path).map_err(|err| {
        SweepError::InvalidPlan(
            ErrorInfo::new("plan_read", err.to_string())
                .with_context("path", plan_path.display().to_string()),
        )
    })?;
    let mut plan: SweepPlan = from_yaml_slice(&bytes).map_err(|err| match err {
        SweepError::InvalidPlan(info) => SweepError::InvalidPlan(
            info.with_context("path", plan_path.display().to_string()),
        ),
        other => other,
    })?;
    let parent = plan_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    plan.base_dir = fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
    Ok(plan)
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let mut resolved = base.to_path_buf();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir if resolved.file_name().is_some() => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    resolved
}
