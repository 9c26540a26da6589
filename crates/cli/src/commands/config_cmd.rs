//! `peticiona config`: configuration management commands.

use peticiona_config::AppConfig;

pub fn show(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

/// The config already passed `AppConfig::validate` when loaded; this adds
/// checks against the file system.
pub fn validate(config: &AppConfig) {
    println!("🔍 Validating configuration...");
    println!("   ✅ Config parsed successfully");

    let mut warnings = Vec::new();

    let legacy = config.schema.legacy_path();
    let fields = config.schema.table_path(&config.schema.fields_table);
    if !config.schema.dir.is_dir() {
        warnings.push(format!("Schema directory {} does not exist", config.schema.dir.display()));
    } else if !fields.is_file() && !legacy.is_file() {
        warnings.push(format!(
            "Neither {} nor {} found",
            config.schema.fields_table, config.schema.legacy_mapping
        ));
    }

    if config.output.dir.exists() && !config.output.dir.is_dir() {
        warnings.push(format!("Output path {} is not a directory", config.output.dir.display()));
    }

    if config.processing.workers > 64 {
        warnings.push(format!("{} workers is more than any batch needs", config.processing.workers));
    }

    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    println!();
    println!("   Schema:   {}", config.schema.dir.display());
    println!("   Output:   {}", config.output.dir.display());
    println!("   Currency: {}", config.formatting.currency_symbol);
    println!("   Dates:    {}", config.formatting.date_format);
    println!("   Strict:   {}", config.processing.strict);
    println!("   Workers:  {}", config.processing.workers);
}

pub fn init() {
    print!("{}", AppConfig::default_toml());
}
