use std::path::Path;

use anyhow::{bail, Context, Result};
use fwstate::declared::DeclaredState;
use fwstate::schema::{load_schema_file, resolve_schema, ResourceSchema};
use log::info;

use crate::cli::SchemaArgs;

/// Load the schema selected on the command line.
pub fn schema(args: &SchemaArgs) -> Result<ResourceSchema> {
    let (schema, source) = match (&args.schema, &args.resource) {
        (Some(path), _) => {
            let schema = load_schema_file(path)
                .with_context(|| format!("failed to load schema {}", path.display()))?;
            (schema, format!("file:{}", path.display()))
        }
        (None, Some(name)) => resolve_schema(name, args.schemas_dir.as_deref())
            .with_context(|| format!("failed to resolve schema for resource '{name}'"))?,
        (None, None) => bail!("either --resource or --schema is required"),
    };
    info!("Using schema: {source}");
    Ok(schema)
}

pub fn declared(path: &Path, schema: &ResourceSchema) -> Result<DeclaredState> {
    DeclaredState::load(path, schema)
        .with_context(|| format!("invalid declared state in {}", path.display()))
}
