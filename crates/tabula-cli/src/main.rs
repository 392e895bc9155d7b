// Copyright 2026 Tabula contributors
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use runtime::Command;
use std::env;
use std::path::PathBuf;
use tabula_model::TableKind;
use tabula_store::Store;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `tabula --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = match &options.db_path {
        Some(path) => path.clone(),
        None => config.db_path()?,
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let Some(command) = options.command else {
        print_help();
        return Ok(());
    };

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or TABULA_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    runtime::execute(command, &store)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    db_path: Option<PathBuf>,
    command: Option<Command>,
    print_db_path: bool,
    print_example: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        db_path: None,
        command: None,
        print_db_path: false,
        print_example: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--db" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--db requires a file path"))?;
                options.db_path = Some(PathBuf::from(value.as_ref()));
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            "init" => {
                options.command = Some(Command::Init);
            }
            "seed" => {
                options.command = Some(Command::Seed);
            }
            "classes" => {
                options.command = Some(Command::Classes);
            }
            "show" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("show requires a table kind"))?;
                let kind = TableKind::parse(value.as_ref()).ok_or_else(|| {
                    anyhow!(
                        "unknown table kind {:?}; expected one of {}",
                        value.as_ref(),
                        TableKind::ALL
                            .iter()
                            .map(|kind| kind.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                })?;
                options.command = Some(Command::Show(kind));
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("tabula");
    println!("  init                     Create or validate the database schema");
    println!("  seed                     Populate the demo catalog");
    println!("  classes                  List object and relationship classes");
    println!("  show <kind>              Print one parameter table");
    println!("  --config <path>          Use a specific config path");
    println!("  --db <path>              Use a specific database path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use crate::runtime::Command;
    use anyhow::Result;
    use std::path::PathBuf;
    use tabula_model::TableKind;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/tabula-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                db_path: None,
                command: None,
                print_db_path: false,
                print_example: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_reads_show_kind() -> Result<()> {
        let options = parse_cli_args(
            vec!["show", "object_parameter_value"],
            default_options_path(),
        )?;
        assert_eq!(
            options.command,
            Some(Command::Show(TableKind::ObjectParameterValue))
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_rejects_unknown_kind() {
        let error = parse_cli_args(vec!["show", "pivot"], default_options_path())
            .expect_err("unknown kind should fail");
        assert!(error.to_string().contains("unknown table kind"));
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_reads_db_override_and_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--db", "/tmp/x.db", "--print-path", "init"],
            default_options_path(),
        )?;
        assert_eq!(options.db_path, Some(PathBuf::from("/tmp/x.db")));
        assert!(options.print_db_path);
        assert_eq!(options.command, Some(Command::Init));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }
}
