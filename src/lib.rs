pub mod analyzer;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod listing;
pub mod parser;

use std::io::BufRead;
use std::path::{Path, PathBuf};

use tracing::debug;

use codegen::Codegen;
use parser::{Parser, Program};

pub use error::{Diagnostic, Error};
pub use listing::{Listing, ListingOptions};

/// Extension tried when the source path has none.
pub const SOURCE_EXTENSION: &str = "cm";
/// Extension of generated files.
pub const OUTPUT_EXTENSION: &str = "java";

/// Parses and analyzes one source, reporting into `listing`.
///
/// Returns the type-annotated tree when no diagnostic was reported, `None`
/// otherwise. Analysis is skipped when parsing already failed. Only a failed
/// read of the source is an `Err`.
pub fn compile<R: BufRead>(reader: R, listing: &mut Listing) -> Result<Option<Program>, Error> {
    let mut parser = Parser::new(reader, listing);
    let mut program = parser.parse();
    if let Some(err) = parser.take_io_error() {
        return Err(Error::Io(err));
    }
    if listing.has_errors() {
        return Ok(None);
    }

    listing.syntax_tree(&program);

    let globals = analyzer::analyze(&mut program, listing);
    debug!(globals = globals.len(), "global symbols");
    if listing.has_errors() {
        return Ok(None);
    }

    Ok(Some(program))
}

/// Compiles an in-memory source straight to Java text.
pub fn transpile(src: &str, class_name: &str) -> Result<String, Vec<Diagnostic>> {
    let mut listing = Listing::quiet();
    match compile(src.as_bytes(), &mut listing).ok().flatten() {
        Some(program) => {
            let file_name = format!("{}.{}", class_name, OUTPUT_EXTENSION);
            Ok(Codegen::new(class_name, &file_name).generate(&program))
        }
        None => Err(listing.take_diagnostics()),
    }
}

/// `prog` becomes `prog.cm`; paths with an extension are kept.
pub fn source_path_for(path: &Path) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(SOURCE_EXTENSION)
    }
}

/// `dir/prog.cm` becomes `dir/prog.java`. A source that already ends in
/// `.java` gets `_out` appended to its stem so it is never overwritten.
pub fn output_path_for(source: &Path) -> PathBuf {
    let is_java = source
        .extension()
        .is_some_and(|ext| ext == OUTPUT_EXTENSION);
    if !is_java {
        return source.with_extension(OUTPUT_EXTENSION);
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{}_out.{}", stem, OUTPUT_EXTENSION))
}
