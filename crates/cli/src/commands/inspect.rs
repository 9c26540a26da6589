//! `peticiona inspect`: what a template expects.

use peticiona_config::AppConfig;
use peticiona_document::{Template, inspect};
use peticiona_rules::RuleEngine;
use std::path::Path;
use tracing::warn;

pub fn run(config: &AppConfig, template_path: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let template = Template::open(template_path)?;
    let inspection = inspect(&template);

    if json {
        println!("{}", serde_json::to_string_pretty(&inspection)?);
        return Ok(());
    }

    println!("📄 Template: {}", template_path.display());
    for part in &inspection.parts {
        println!();
        println!("   {}", part.part);
        for placeholder in &part.placeholders {
            let split = if placeholder.split_occurrences > 0 {
                format!(" ({} split across runs)", placeholder.split_occurrences)
            } else {
                String::new()
            };
            println!("      {{{{{}}}}} ×{}{split}", placeholder.name, placeholder.occurrences);
        }
        for section in &part.sections {
            let indent = "  ".repeat(section.depth);
            let inline = if section.inline { " inline" } else { "" };
            println!("      {indent}§ {}{inline}", section.id);
        }
        if let Some(error) = &part.marker_error {
            println!("      ❌ {error}");
        }
    }

    // Cross-check against the schema when one can be loaded.
    match RuleEngine::load(&config.schema) {
        Ok((schema, engine)) => {
            let unknown = inspection.unknown_placeholders(|name| schema.field_by_name(name).is_some());
            let ungoverned: Vec<&str> = inspection
                .section_ids()
                .into_iter()
                .filter(|id| !engine.has_rule(id))
                .collect();

            println!();
            if unknown.is_empty() && ungoverned.is_empty() {
                println!("   ✅ Every placeholder and section is known to the schema");
            }
            for name in unknown {
                println!("   ⚠️  Placeholder not in schema: {name}");
            }
            for id in ungoverned {
                println!("   ⚠️  Section without activation rule: {id}");
            }
        }
        Err(e) => warn!(error = %e, "Schema unavailable, skipping cross-check"),
    }

    if inspection.has_marker_errors() {
        return Err("Template has unbalanced section markers".into());
    }
    Ok(())
}
