//! remodel CLI - Command-line interface
//!
//! Commands:
//!   migrate   - Rewrite a Java source tree against XML bean configuration
//!   registry  - Show what the XML configuration ingests to
//!   init      - Write a starter remodel.yaml
//!   schema    - Print JSON schemas for remodel.yaml and marker catalogs

mod cli;

use remodel::VERSION;
use std::process::ExitCode;

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("remodel=debug")
        } else {
            EnvFilter::new("remodel=info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let verbose = args.iter().any(|a| a == "--verbose" || a == "-V");
    setup_tracing(verbose);

    let rest: Vec<String> = args[2..]
        .iter()
        .filter(|a| *a != "--verbose" && *a != "-V")
        .cloned()
        .collect();

    let result = match args[1].as_str() {
        "migrate" => cli::cmd_migrate(&rest),
        "registry" => cli::cmd_registry(&rest),
        "init" => cli::cmd_init(&rest),
        "schema" => cli::cmd_schema(&rest),
        "version" | "--version" | "-v" => {
            println!("remodel {}", VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            Err("Unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

fn print_usage() {
    println!(
        r#"
remodel - migrate XML bean configuration to annotation-driven Java

USAGE:
    remodel <COMMAND> [OPTIONS]

COMMANDS:
    migrate --source <dir> --config <beans.xml>...   Rewrite sources (dry run)
    registry <beans.xml>...                          Print ingested definitions
    init --package <name>                            Write a starter remodel.yaml
    schema [config|catalog]                          Print a JSON schema
    version                                          Show version
    help                                             Show this help

MIGRATE OPTIONS:
    --package <name>       Package of the generated configuration class
    --settings <file>      Engine settings (default: ./remodel.yaml)
    --write                Write rewritten and generated files
    --json                 Print the report as JSON

GLOBAL OPTIONS:
    --verbose, -V          Debug logging (RUST_LOG overrides)
"#
    );
}
