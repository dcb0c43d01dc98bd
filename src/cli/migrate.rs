//! `remodel migrate`

use super::util::{has_flag, load_settings, parse_multi_option, parse_option, read_sources, resolve, write_file};
use remodel::*;
use std::path::Path;

pub fn cmd_migrate(args: &[String]) -> Result<()> {
    let usage = "Usage: remodel migrate --source <dir> --config <beans.xml>... [--package <name>] [--write] [--json]";
    let source_root = parse_option(args, &["--source", "-s"]).ok_or_else(|| Error::from(usage))?;
    let config_paths = parse_multi_option(args, "--config");
    if config_paths.is_empty() {
        return Err(usage.into());
    }
    let write = has_flag(args, "--write");
    let json_output = has_flag(args, "--json");

    let settings = load_settings(args)?;
    let sources = read_sources(&config_paths)?;
    let migration = Migration::new(settings, &sources)?;

    let root = Path::new(source_root);
    let units = load_source_tree(root)?;
    let report = migration.run(&units, root)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
    } else {
        for unit in report.changed_units() {
            println!("M {}", unit.path);
        }
        for output in &report.outputs {
            println!("A {}", output.path.display());
        }
        for diagnostic in &report.diagnostics {
            println!("! {}", diagnostic);
        }
        let summary = report.summary();
        println!(
            "\n{} changed, {} unchanged, {} generated, {} diagnostic(s)",
            summary.changed.len(),
            summary.unchanged,
            summary.generated.len(),
            summary.diagnostics.len()
        );
    }

    if !write {
        eprintln!("Dry run; pass --write to apply.");
        return Ok(());
    }

    for unit in report.changed_units() {
        write_file(&resolve(root, &unit.path), &render_java(unit)?)?;
    }
    for output in &report.outputs {
        write_file(&output.path, &render_java(&output.unit)?)?;
    }
    eprintln!("Written to: {}", root.display());
    Ok(())
}
