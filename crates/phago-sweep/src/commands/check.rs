use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use phago_exp::{check_plan, load_plan};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the sweep plan YAML file.
    #[arg(long)]
    pub plan: PathBuf,
}

pub fn run(args: &CheckArgs) -> Result<(), Box<dyn Error>> {
    let plan = load_plan(&args.plan)?;
    let check = check_plan(&plan)?;
    println!(
        "{}: {} run(s), {} field(s) in <{}> template {} ({})",
        plan.name,
        check.runs,
        check.fields,
        check.template_root,
        plan.template_path().display(),
        &check.template_hash[..12],
    );
    Ok(())
}
