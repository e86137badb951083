mod cli;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;

use cli::{Cli, Command, GrammarArgs};
use grammaton::compiler::{compile_file, AugmentOrder};
use grammaton::error_handling::render_errors;
use grammaton::generator::{sample, Outcome};
use grammaton::*;

#[derive(Debug, Error)]
enum RunError {
    #[error("{}", render_errors(.0))]
    Syntax(grammaton::parser::GrammarSyntaxErrors),
    #[error("{0}")]
    Compile(CompileError),
    #[error("could not read `{}`: {source}", .path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("`{}` is not a table description: {source}", .path.display())]
    Tables { path: PathBuf, source: serde_json::Error },
    #[error("{0}")]
    Derivation(#[from] DerivationError),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

fn read(path: &Path) -> Result<String, RunError> {
    fs::read_to_string(path).map_err(|source| RunError::Read { path: path.to_path_buf(), source })
}

fn load(args: &GrammarArgs) -> Result<CompiledGrammar, RunError> {
    let tables = match &args.tables {
        Some(path) => {
            let tables: NameTables = serde_json::from_str(&read(path)?)
                .map_err(|source| RunError::Tables { path: path.clone(), source })?;
            Some(tables)
        }
        None => None,
    };
    let literals = LiteralAugmentation {
        strings: args.strings.clone(),
        numbers: args.numbers.clone(),
        order: if args.sorted { AugmentOrder::Sorted } else { AugmentOrder::AsGiven },
    };
    let config = GrammarConfig {
        start_symbol: args.start.clone(),
        default_numbers: if args.default_numbers { GrammarConfig::sql().default_numbers } else { Vec::new() },
        ..GrammarConfig::default()
    };

    let compiled = compile_file(&args.file, tables.as_ref(), Some(&literals), &config).map_err(|error| match error {
        CompileError::Syntax(errors) => RunError::Syntax(errors),
        other => RunError::Compile(other),
    })?;
    info!(
        "`{}` compiled: {} rules, {} actions",
        args.file.display(),
        compiled.grammar().len(),
        compiled.actions().len()
    );
    Ok(compiled)
}

#[derive(Serialize)]
struct Conversion<'a> {
    text: &'a str,
    actions: Option<Vec<&'a str>>,
    error: Option<String>,
}

fn run(cli: Cli) -> Result<(), RunError> {
    match cli.command {
        Command::Actions { grammar, json } => {
            let compiled = load(&grammar)?;
            let map = compiled.actions().to_map();
            if json {
                println!("{}", serde_json::to_string_pretty(&map)?);
                return Ok(());
            }
            for (nonterminal, actions) in map {
                println!("{}:", nonterminal);
                for action in actions {
                    println!("    {}", action);
                }
            }
        }
        Command::Convert { grammar, texts, json } => {
            let compiled = load(&grammar)?;
            for text in &texts {
                let converted = to_action_sequence(&compiled, text);
                if json {
                    let conversion = match &converted {
                        Ok(actions) => Conversion {
                            text,
                            actions: Some(actions.iter().map(Action::as_str).collect()),
                            error: None,
                        },
                        Err(error) => Conversion { text, actions: None, error: Some(error.to_string()) },
                    };
                    println!("{}", serde_json::to_string(&conversion)?);
                    continue;
                }
                match converted {
                    Ok(actions) => {
                        println!("{}", text);
                        for action in actions {
                            println!("    {}", action);
                        }
                    }
                    Err(error) => println!("{}\n    no supervision: {}", text, error),
                }
            }
        }
        Command::Sample { grammar, amount, max_steps, seed } => {
            let compiled = load(&grammar)?;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            for _ in 0..amount.unwrap_or(1) {
                let start = DerivationState::for_grammar(&compiled);
                let sampled = sample(start, compiled.actions(), &LinkingTable::new(), &mut rng, max_steps)?;
                match &sampled.outcome {
                    Outcome::Complete => println!("{}", sampled.text()),
                    Outcome::Stuck(symbol) => println!("{}    (stuck at `{}`)", sampled.text(), symbol),
                    Outcome::AwaitingLiterals(symbol) => {
                        println!("{}    (no `{}` values, pass some with --{})", sampled.text(), symbol, symbol)
                    }
                    Outcome::BudgetExhausted => println!("{}    (gave up after {} steps)", sampled.text(), max_steps),
                }
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env().format_timestamp(None).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{}", error);
            ExitCode::FAILURE
        }
    }
}
