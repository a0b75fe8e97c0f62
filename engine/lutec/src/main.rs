//! Lute command-line runner.
//!
//! Parses and runs a script one top-level unit at a time, printing each
//! unit's non-null result. A syntax error abandons only the offending
//! unit; the run continues at the next one and the process exits
//! nonzero at the end.

use std::io::{BufReader, Read};

use lute_diagnostic::DiagConfig;
use lute_eval::{stdlib, Interpreter};
use lute_parse::Parser;
use lute_value::Value;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut path: Option<&str> = None;
    let mut verbosity: u8 = 1;
    let mut max_trace_frames: usize = 8;
    let mut force_trace = false;

    for arg in args.iter().skip(1) {
        if arg == "--verbose" || arg == "-v" {
            verbosity = 3;
        } else if arg == "--quiet" || arg == "-q" {
            verbosity = 0;
        } else if arg == "--trace" {
            force_trace = true;
        } else if let Some(frames) = arg.strip_prefix("--frames=") {
            match frames.parse() {
                Ok(n) => max_trace_frames = n,
                Err(_) => {
                    eprintln!("error: invalid --frames value `{frames}`");
                    std::process::exit(2);
                }
            }
        } else if arg == "--help" || arg == "-h" {
            print_usage();
            return;
        } else if arg == "-" || !arg.starts_with('-') {
            if path.is_none() {
                path = Some(arg.as_str());
            }
        } else {
            eprintln!("error: unknown option `{arg}`");
            print_usage();
            std::process::exit(2);
        }
    }

    let Some(path) = path else {
        print_usage();
        std::process::exit(2);
    };

    init_tracing(force_trace);

    let config = DiagConfig {
        verbosity,
        max_trace_frames,
    };
    let mut interp = Interpreter::new(config);
    stdlib::install(&mut interp);
    let sigs = interp.native_sigs();

    let mut parser = if path == "-" {
        Parser::from_reader(Box::new(BufReader::new(std::io::stdin())), &sigs)
    } else {
        let source = match read_source(path) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("error: cannot read `{path}`: {err}");
                std::process::exit(2);
            }
        };
        Parser::from_str(&source, &sigs)
    };

    let mut had_parse_error = false;
    loop {
        match parser.parse_unit() {
            Ok(Some(buffer)) => {
                let code = interp.load_unit(buffer);
                if let Some(value) = interp.run(code) {
                    if value != Value::Null {
                        println!("{}", interp.heap().display(value));
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                if verbosity > 0 {
                    eprintln!("{err}");
                }
                had_parse_error = true;
            }
        }
    }

    if had_parse_error {
        std::process::exit(1);
    }
}

fn read_source(path: &str) -> std::io::Result<String> {
    let mut source = String::new();
    std::fs::File::open(path)?.read_to_string(&mut source)?;
    Ok(source)
}

/// `--trace` forces full tracing; otherwise honor `RUST_LOG` if set.
fn init_tracing(force: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if force {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::new("trace"))
            .init();
    } else if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn print_usage() {
    eprintln!("Usage: lute <file.lt> [options]");
    eprintln!("       lute -              read the script from stdin");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -v, --verbose       Report warnings and notes too");
    eprintln!("  -q, --quiet         Suppress diagnostics");
    eprintln!("  --frames=<n>        Call frames to print per runtime error (default 8)");
    eprintln!("  --trace             Full execution tracing to stderr");
    eprintln!("  -h, --help          Show this help");
}
