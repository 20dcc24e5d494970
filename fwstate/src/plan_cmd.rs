use anyhow::{Context, Result};
use fwstate::payload::redact;
use fwstate::reconcile::{plan, ResourceKey};
use fwstate::value::Observed;
use fwstate::report::render_plan;
use fwstate::store::FileStore;
use serde_json::json;

use crate::cli::{OutputFormat, PlanArgs};
use crate::resolve;

pub fn run_plan(args: PlanArgs) -> Result<()> {
    let schema = resolve::schema(&args.schema)?;
    let declared = resolve::declared(&args.declared, &schema)?;
    let store = FileStore::new(&args.store);
    let key = ResourceKey::new(args.key);

    let plan = plan(
        &key,
        &declared,
        &store,
        &schema,
        args.strategy.map(Into::into),
    )
    .with_context(|| format!("failed to plan {} {key}", schema.name()))?;

    match args.format {
        OutputFormat::Text => println!("{}", render_plan(key.as_str(), &plan)),
        OutputFormat::Json => {
            let observed = match &plan.observed {
                Observed::Present(record) => Observed::Present(redact(record, &schema)),
                Observed::Absent => Observed::Absent,
            };
            let resolved = plan.resolved.as_ref().map(|record| redact(record, &schema));
            let out = json!({
                "key": key,
                "outcome": plan.change_set.outcome,
                "changed": plan.change_set.has_changes(),
                "changes": plan.change_set.changes,
                "observed": observed,
                "resolved": resolved,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
