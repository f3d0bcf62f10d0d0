use dmpl_rust::{compile, json, Error};

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dmpl")]
#[command(version)]
#[command(about = "Compile DMPL dialogue scripts to JSON IR")]
struct Cli {
    /// Source file to compile (reads stdin when omitted)
    file: Option<PathBuf>,

    /// Print single-line JSON instead of indented JSON
    #[arg(long)]
    compact: bool,

    /// Report failures as a JSON object on stdout
    #[arg(long)]
    json_errors: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let input = match &cli.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            input
        }
    };

    match compile(&input) {
        Ok(ir) => {
            if cli.compact {
                println!("{}", json::to_json(&ir));
            } else {
                println!("{}", json::to_json_pretty(&ir));
            }
            Ok(())
        }
        Err(err) => {
            if cli.json_errors {
                println!("{}", json::to_json(&json::error_to_json(&err)));
            } else {
                report(&input, &err);
            }
            std::process::exit(1);
        }
    }
}

fn report(input: &str, err: &Error) {
    match err {
        Error::Parse(parse) => {
            let line_num = parse.position.line;
            let line_text = input.lines().nth(line_num.saturating_sub(1)).unwrap_or("");

            eprintln!("ERROR AT LINE {}:", line_num);
            eprintln!("{}", line_text);
            eprintln!("{}^", " ".repeat(parse.position.column));
            eprintln!("{}", parse.message);
        }
        Error::Compile(compile) => {
            eprintln!("ERROR: {}", compile);
        }
    }
}
