//! CLI utility helpers

use remodel::{ConfigSource, EngineConfig, Error, JavaPackage, Result, CONFIG_FILE};
use std::fs;
use std::path::{Path, PathBuf};

/// Whether a bare flag such as `--write` is present
pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Value following the first of `names`
pub fn parse_option<'a>(args: &'a [String], names: &[&str]) -> Option<&'a str> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Every value following `name`, up to the next option:
/// `--config a.xml b.xml --config c.xml` gives all three
pub fn parse_multi_option(args: &[String], name: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut collecting = false;
    for arg in args {
        if arg.starts_with("--") {
            collecting = arg == name;
        } else if collecting {
            values.push(arg.clone());
        }
    }
    values
}

/// Arguments before the first option
pub fn positional(args: &[String]) -> Vec<String> {
    args.iter().take_while(|a| !a.starts_with("--")).cloned().collect()
}

pub fn read_sources(paths: &[String]) -> Result<Vec<ConfigSource>> {
    paths.iter().map(|p| ConfigSource::from_path(Path::new(p))).collect()
}

/// Settings from `--settings`, else `./remodel.yaml`, else defaults for
/// `--package`. A `--package` always wins over the file.
pub fn load_settings(args: &[String]) -> Result<EngineConfig> {
    let package = parse_option(args, &["--package", "-p"])
        .map(|p| JavaPackage::try_from(p.to_string()))
        .transpose()
        .map_err(|e| Error::Config(e.to_string()))?;

    let loaded = match parse_option(args, &["--settings"]) {
        Some(path) => Some(EngineConfig::load(Path::new(path))?),
        None => {
            let current_dir = std::env::current_dir().map_err(Error::Io)?;
            EngineConfig::load_from_dir(&current_dir)?
        }
    };

    match (loaded, package) {
        (Some(mut config), Some(package)) => {
            config.target_package = package;
            Ok(config)
        }
        (Some(config), None) => Ok(config),
        (None, Some(package)) => Ok(EngineConfig::new(package)),
        (None, None) => Err(Error::Config(format!(
            "no {} found; pass --package or --settings",
            CONFIG_FILE
        ))),
    }
}

/// Write a file, creating parent directories
pub fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    fs::write(path, content).map_err(Error::Io)
}

pub fn resolve(root: &Path, relative: &str) -> PathBuf {
    root.join(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_multi_option_collects_across_repeats() {
        let a = args(&["--source", "src", "--config", "a.xml", "b.xml", "--write", "--config", "c.xml"]);
        assert_eq!(parse_multi_option(&a, "--config"), vec!["a.xml", "b.xml", "c.xml"]);
        assert_eq!(parse_option(&a, &["--source"]), Some("src"));
        assert!(has_flag(&a, "--write"));
        assert!(!has_flag(&a, "--json"));
    }

    #[test]
    fn test_positional_stops_at_first_option() {
        let a = args(&["a.xml", "b.xml", "--settings", "x.yaml"]);
        assert_eq!(positional(&a), vec!["a.xml", "b.xml"]);
    }
}
