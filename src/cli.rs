// src/cli.rs
use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::{env, path::PathBuf};

use crate::infra::t;

pub mod commands;

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// It looks for a `--lang <VALUE>` argument.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    let pos = args.iter().position(|arg| arg == "--lang")?;
    args.get(pos + 1).cloned()
}

fn suite_arg(locale: &str) -> Arg {
    Arg::new("suite")
        .short('s')
        .long("suite")
        .help(t!("arg_suite", locale = locale).to_string())
        .value_name("SUITE")
        .default_value("suite.toml")
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

fn build_cli(locale: &str) -> Command {
    Command::new("matrix-harness")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli_about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cmd_run_about", locale = locale).to_string())
                .arg(suite_arg(locale))
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help(t!("arg_seed", locale = locale).to_string())
                        .value_name("SEED")
                        .value_parser(clap::value_parser!(u64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("filter")
                        .short('f')
                        .long("filter")
                        .help(t!("arg_filter", locale = locale).to_string())
                        .value_name("TEXT")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("timeout-ms")
                        .long("timeout-ms")
                        .help(t!("arg_timeout_ms", locale = locale).to_string())
                        .value_name("MILLISECONDS")
                        .value_parser(clap::value_parser!(u64))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("param")
                        .short('p')
                        .long("param")
                        .help(t!("arg_param", locale = locale).to_string())
                        .value_name("KEY=VALUE")
                        .action(ArgAction::Append),
                ),
        )
        .subcommand(
            Command::new("list")
                .about(t!("cmd_list_about", locale = locale).to_string())
                .arg(suite_arg(locale)),
        )
}

pub async fn run() -> Result<()> {
    // Pre-parse language and initialize i18n first.
    let explicit_language = pre_parse_language();
    let language = explicit_language
        .clone()
        .unwrap_or_else(|| sys_locale::get_locale().unwrap_or_else(|| "en".to_string()));
    let language = crate::resolve_locale(&language).to_string();
    rust_i18n::set_locale(&language);

    let matches = build_cli(&language).get_matches();

    if explicit_language.is_none() && matches.subcommand().is_some() {
        println!(
            "{}",
            t!("system_language_detected", locale = &language, lang = &language)
        );
    }

    match matches.subcommand() {
        Some(("run", run_matches)) => {
            let options = commands::run::RunOptions {
                suite: run_matches
                    .get_one::<PathBuf>("suite")
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from("suite.toml")),
                seed: run_matches.get_one::<u64>("seed").copied(),
                filter: run_matches.get_one::<String>("filter").cloned(),
                timeout_ms: run_matches.get_one::<u64>("timeout-ms").copied(),
                params: run_matches
                    .get_many::<String>("param")
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default(),
                language: explicit_language,
            };
            commands::run::execute(options).await?;
        }
        Some(("list", list_matches)) => {
            let suite = list_matches
                .get_one::<PathBuf>("suite")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("suite.toml"));
            commands::list::execute(&suite, &language)?;
        }
        _ => {
            // Clap has already printed help.
        }
    }
    Ok(())
}
