//! `peticiona schema`: the loaded field schema and its rules.

use peticiona_config::AppConfig;
use peticiona_rules::RuleEngine;
use peticiona_schema::FieldDefinition;
use std::collections::BTreeSet;

pub fn run(config: &AppConfig, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (schema, engine) = RuleEngine::load(&config.schema)?;

    if json {
        let value = serde_json::json!({
            "source": schema.source().to_string(),
            "categories": schema.categories(),
            "fields": schema.fields(),
            "data_types": schema.data_types(),
            "rules": schema.rules(),
            "derived_order": engine.derived_order(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("📚 Schema: {}", schema.source());
    println!();

    let mut listed = BTreeSet::new();
    for category in schema.categories() {
        let fields = schema.fields_in_category(&category.name);
        if fields.is_empty() {
            continue;
        }
        println!("   {}", category.name);
        for field in fields {
            print_field(&schema, field);
            listed.insert(field.name.as_str());
        }
    }

    let uncategorized: Vec<&FieldDefinition> = schema
        .fields()
        .iter()
        .filter(|f| !listed.contains(f.name.as_str()))
        .collect();
    if !uncategorized.is_empty() {
        println!("   Sem categoria");
        for field in uncategorized {
            print_field(&schema, field);
        }
    }

    println!();
    println!("   Rules:");
    for rule in schema.rules() {
        let condition = if rule.condition.trim().is_empty() {
            "(always)"
        } else {
            rule.condition.as_str()
        };
        println!("      § {} ⇐ {condition}", rule.section_id);
        if !rule.required_fields.is_empty() {
            println!("        requires: {}", rule.required_fields.join(", "));
        }
    }

    let derived = engine.derived_order();
    if !derived.is_empty() {
        println!();
        println!("   Derived: {}", derived.join(" → "));
    }
    Ok(())
}

fn print_field(schema: &peticiona_schema::Schema, field: &FieldDefinition) {
    let mut flags = Vec::new();
    if field.required_when_active {
        flags.push("required");
    }
    if field.is_derived() {
        flags.push("derived");
    }
    if schema.is_rule_bound(&field.name) {
        flags.push("rule-bound");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    println!(
        "      {:<28} {}{flags}",
        field.name,
        schema.value_kind_of(&field.name).label()
    );
}
