//! Schema command implementation.

use ledgergraph_storage::{EntityTypeId, PropertyKind, SchemaRegistry};
use std::error::Error;
use std::fmt::Write;

/// Renders every entity type and its properties.
pub fn describe(registry: &SchemaRegistry) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    for schema in registry.entities() {
        writeln!(out, "{} ({})", schema.name(), schema.id())?;
        for property in schema.properties() {
            let kind = match &property.kind {
                PropertyKind::Scalar {
                    value_type,
                    default,
                } => format!("{value_type} = {default}"),
                PropertyKind::Reference { target } => {
                    format!("-> {}", entity_name(registry, *target))
                }
                PropertyKind::List { member } => format!("[{}]", entity_name(registry, *member)),
            };
            writeln!(out, "  {:<16} {}", property.name, kind)?;
        }
    }
    Ok(out)
}

fn entity_name(registry: &SchemaRegistry, id: EntityTypeId) -> String {
    registry
        .schema_for(id)
        .map(|schema| schema.name().to_string())
        .unwrap_or_else(|_| id.to_string())
}

/// Runs the schema command.
pub fn run() -> Result<(), Box<dyn Error>> {
    let registry = ledgergraph_model::registry()?;
    print!("{}", describe(&registry)?);
    Ok(())
}
