//! stylescript CLI entry point.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use stylescript_runtime::{Repl, init_tracing, serialize};

/// CLI configuration parsed from arguments.
#[derive(Default)]
struct CliConfig {
    files: Vec<PathBuf>,
    features: Option<PathBuf>,
    zoom: Option<i32>,
    batch_mode: bool,
    show_help: bool,
    show_version: bool,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: Vec<String>) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut config = CliConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => config.show_help = true,
            "-V" | "--version" => config.show_version = true,
            "-b" | "--batch" => config.batch_mode = true,
            "-f" | "--features" => {
                i += 1;
                let path = args.get(i).ok_or("--features requires a file")?;
                config.features = Some(PathBuf::from(path));
            }
            "-z" | "--zoom" => {
                i += 1;
                let value = args.get(i).ok_or("--zoom requires a value")?;
                config.zoom = Some(
                    value
                        .parse()
                        .map_err(|_| format!("invalid --zoom value: {value}"))?,
                );
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}").into());
            }
            path => config.files.push(PathBuf::from(path)),
        }
        i += 1;
    }

    Ok(config)
}

fn run(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = parse_args(args)?;

    if config.show_help {
        print_help();
        return Ok(());
    }

    if config.show_version {
        println!("stylescript {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Surface compile and runtime failures unless RUST_LOG says otherwise
    init_tracing(Some("warn"));

    let mut repl = Repl::new()?;

    if let Some(path) = &config.features {
        let features = serialize::load_from_file(path)?;
        repl.session_mut().set_features(features);
    }
    if let Some(zoom) = config.zoom {
        repl.session_mut().set_zoom(zoom);
    }

    for file in &config.files {
        if !repl.eval_file(file)? {
            return Ok(());
        }
    }

    if config.batch_mode {
        return Ok(());
    }

    if !config.files.is_empty() || config.features.is_some() {
        repl = repl.without_banner();
    }

    repl.run()?;
    Ok(())
}

fn print_help() {
    println!(
        "\x1b[1mstylescript\x1b[0m - Evaluate map style functions against features

\x1b[1mUSAGE:\x1b[0m
    stylescript [OPTIONS] [FILES...]

\x1b[1mARGUMENTS:\x1b[0m
    [FILES...]    Scripts to run before starting the REPL

\x1b[1mOPTIONS:\x1b[0m
    -h, --help              Print help information
    -V, --version           Print version information
    -b, --batch             Run files and exit (no REPL)
    -f, --features <FILE>   Load a MessagePack feature set
    -z, --zoom <N>          Set the initial $zoom

\x1b[1mEXAMPLES:\x1b[0m
    stylescript                              Start interactive REPL
    stylescript -f roads.mpk                 Load features, then start REPL
    stylescript -b -f roads.mpk styles.ss    Run styles.ss against roads.mpk and exit

\x1b[1mREPL COMMANDS:\x1b[0m
    :fn <i> <source>     Register a style function
    :eval <i>            Evaluate a function against the active feature
    :bool <i>            Evaluate a function as a filter
    :prop <key> [value]  Set a property of the active feature
    :feature [n]         Select or show a feature
    :zoom <n>            Set $zoom
    :geometry <kind>     Set $geometry (point, line, polygon)
    :load / :save <file> Load or save the feature set
    Ctrl+D               Exit REPL
    Ctrl+C               Cancel current input

Set RUST_LOG (e.g. RUST_LOG=stylescript_bridge=debug) to control logging."
    );
}
