//! Config and schema CLI commands

use super::util::{has_flag, parse_option, write_file};
use remodel::*;
use std::path::Path;

pub fn cmd_init(args: &[String]) -> Result<()> {
    let package = parse_option(args, &["--package", "-p"])
        .ok_or_else(|| Error::from("Usage: remodel init --package <name> [--force]"))?;
    let package = JavaPackage::try_from(package.to_string()).map_err(|e| Error::Config(e.to_string()))?;

    let path = Path::new(CONFIG_FILE);
    if path.exists() && !has_flag(args, "--force") {
        return Err(format!("{} already exists (use --force to overwrite)", CONFIG_FILE).into());
    }
    let yaml = serde_norway::to_string(&EngineConfig::new(package))?;
    write_file(path, &yaml)?;
    eprintln!("Written to: {}", path.display());
    Ok(())
}

pub fn cmd_schema(args: &[String]) -> Result<()> {
    let schema_name = args.first().map(|s| s.as_str()).unwrap_or("list");

    match schema_name {
        "list" => {
            println!("Available schemas: config, catalog");
            Ok(())
        }
        "config" => print_schema::<EngineConfig>(),
        "catalog" => print_schema::<MarkerCatalog>(),
        _ => Err(format!("Unknown schema: {}", schema_name).into()),
    }
}

fn print_schema<T: schemars::JsonSchema>() -> Result<()> {
    let schema = schemars::schema_for!(T);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
