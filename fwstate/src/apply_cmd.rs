use anyhow::{Context, Result};
use fwstate::reconcile::{reconcile, ReconcileOptions, ResourceKey};
use fwstate::report::render_report;
use fwstate::store::FileStore;

use crate::cli::{ApplyArgs, OutputFormat};
use crate::resolve;

pub fn run_apply(args: ApplyArgs) -> Result<()> {
    let ApplyArgs { plan: args, check } = args;
    let schema = resolve::schema(&args.schema)?;
    let declared = resolve::declared(&args.declared, &schema)?;
    let store = FileStore::new(&args.store);
    let key = ResourceKey::new(args.key);

    let options = ReconcileOptions {
        strategy: args.strategy.map(Into::into),
        check_mode: check,
    };
    let report = reconcile(&key, &declared, &store, &store, &schema, &options)
        .with_context(|| format!("failed to reconcile {} {key}", schema.name()))?;

    match args.format {
        OutputFormat::Text => {
            println!("{}", render_report(&report));
            println!("changed={}", report.changed);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
