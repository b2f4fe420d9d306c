use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use phago_exp::{load_plan, plan_runs, to_canonical_json_bytes};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Path to the sweep plan YAML file.
    #[arg(long)]
    pub plan: PathBuf,
    /// Emit canonical JSON instead of tab-separated lines.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct RunRow {
    index: usize,
    params: BTreeMap<String, String>,
    artifact: String,
    output_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

pub fn run(args: &ExpandArgs) -> Result<(), Box<dyn Error>> {
    let plan = load_plan(&args.plan)?;
    let runs = plan_runs(&plan)?;

    if args.json {
        let rows: Vec<RunRow> = runs
            .iter()
            .map(|run| RunRow {
                index: run.point.index,
                params: run.params().into_iter().collect(),
                artifact: run.naming.artifact.display().to_string(),
                output_dir: run.naming.output_dir.display().to_string(),
                seed: run.seed,
            })
            .collect();
        println!("{}", String::from_utf8(to_canonical_json_bytes(&rows)?)?);
        return Ok(());
    }

    for run in &runs {
        let params: Vec<String> = run
            .params()
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        let mut line = format!(
            "{}\t{}\t{}\t{}",
            run.point.index,
            params.join(","),
            run.naming.artifact.display(),
            run.naming.output_dir.display()
        );
        if let Some(seed) = run.seed {
            line.push_str(&format!("\t{seed}"));
        }
        println!("{line}");
    }
    Ok(())
}
