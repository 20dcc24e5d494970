use anyhow::{Context, Result};
use fwstate::normalize::normalize;
use fwstate::reconcile::Fetched;
use fwstate::store::fetched_from_node;
use fwstate::value::Observed;
use xml_object_core::parse_file;

use crate::cli::NormalizeArgs;
use crate::resolve;

pub fn run_normalize(args: NormalizeArgs) -> Result<()> {
    let schema = resolve::schema(&args.schema)?;
    let node = parse_file(&args.file)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    let fetched = fetched_from_node(&node)
        .with_context(|| format!("failed to read object from {}", args.file.display()))?;
    let observed = match fetched {
        Fetched::Found(raw) => normalize(&raw, &schema).with_context(|| {
            format!(
                "{} does not match schema '{}'",
                args.file.display(),
                schema.name()
            )
        })?,
        Fetched::NotFound => Observed::Absent,
    };

    println!("{}", serde_json::to_string_pretty(&observed)?);
    Ok(())
}
