//! `remodel registry`

use super::util::{has_flag, load_settings, positional, read_sources};
use remodel::*;

pub fn cmd_registry(args: &[String]) -> Result<()> {
    let paths = positional(args);
    if paths.is_empty() {
        return Err("Usage: remodel registry <beans.xml>... [--settings <file>] [--json]".into());
    }
    // Overrides come from the settings when there are any
    let overrides = match load_settings(args) {
        Ok(settings) => settings.namespace_overrides(),
        Err(_) => NamespaceOverrides::spring_context(),
    };
    let sources = read_sources(&paths)?;
    let registry = ingest(&sources, &XmlConfigParser, &overrides)?;

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string_pretty(&registry)?);
        return Ok(());
    }
    for definition in registry.iter() {
        println!("{} [{}] {}", definition.name, definition.kind, definition.source_location);
        if !definition.aliases.is_empty() {
            println!("    aka {}", definition.aliases.join(", "));
        }
        for (key, value) in &definition.raw_attributes {
            println!("    {} = {}", key, value);
        }
        for property in &definition.properties {
            match &property.value {
                PropertyValue::Literal(v) => println!("    .{} = \"{}\"", property.name, v),
                PropertyValue::Reference(r) => println!("    .{} -> {}", property.name, r),
                PropertyValue::Unsupported(tag) => println!("    .{} <{}>", property.name, tag),
            }
        }
    }
    println!("\n{} definition(s), fingerprint {}", registry.len(), registry.fingerprint());
    Ok(())
}
