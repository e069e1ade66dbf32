use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{info, Level};

use cminus::{codegen, Error, Listing, ListingOptions};

#[derive(Debug, clap::Parser)]
#[command(author, version, about = "C-Minus to Java compiler")]
struct Args {
    /// Source file (".cm" is appended when it has no extension)
    input: PathBuf,

    /// Output file [default: the source path with a ".java" extension]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Echo each source line to the listing
    #[arg(long)]
    echo_source: bool,

    /// Print every scanned token to the listing
    #[arg(long)]
    trace_scan: bool,

    /// Print the syntax tree and analysis phases to the listing
    #[arg(long)]
    trace_parse: bool,

    /// Log to stderr; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let source = cminus::source_path_for(&args.input);
    let file = File::open(&source).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => Error::SourceNotFound(source.clone()),
        _ => Error::Io(err),
    })?;

    let mut listing = Listing::stdout(ListingOptions {
        echo_source: args.echo_source,
        trace_scan: args.trace_scan,
        trace_parse: args.trace_parse,
    });
    listing.banner(&source.display().to_string());

    let program = cminus::compile(BufReader::new(file), &mut listing)
        .with_context(|| format!("reading {}", source.display()))?;
    let Some(program) = program else {
        listing.summary();
        return Ok(ExitCode::FAILURE);
    };

    let output = args
        .output
        .unwrap_or_else(|| cminus::output_path_for(&source));
    codegen::write_output(&program, &output)?;
    info!(source = %source.display(), output = %output.display(), "compiled");

    listing.note(format_args!(
        "Code generation finished. Output: {}",
        output.display()
    ));
    listing.summary();
    Ok(ExitCode::SUCCESS)
}
