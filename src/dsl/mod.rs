#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod ast;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod error;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod lexer;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod preprocess;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::cast_possible_truncation,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod parser;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::single_match_else,
    clippy::module_name_repetitions,
)]
pub mod builtins;
#[allow(clippy::wildcard_imports, clippy::module_name_repetitions)]
pub mod catalog;
#[allow(
    clippy::indexing_slicing,
    clippy::module_name_repetitions,
)]
pub mod symbols;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod typeck;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
    clippy::float_cmp,
)]
pub mod optimize;
#[allow(
    clippy::indexing_slicing,
    clippy::cast_possible_truncation,
    clippy::module_name_repetitions,
)]
pub mod image;
#[allow(
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::single_match_else,
    clippy::needless_pass_by_value,
    clippy::module_name_repetitions,
)]
pub mod compiler;

use std::io::BufRead;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, instrument};

use builtins::Catalog;
use compiler::BlockGraph;
use error::{Diagnostic, Severity};
use self::image::{FileImageLoader, ImageLoader};
use symbols::Definitions;
use typeck::AnalyzeOptions;

/// Knobs for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Predefined macros, `NAME` or `NAME=VALUE`.
    pub defines: Vec<String>,
    pub analyze: AnalyzeOptions,
    pub warnings_as_errors: bool,
}

/// A successfully compiled file: the block graph plus the symbol tables
/// packaging needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Compilation {
    pub blocks: BlockGraph,
    pub definitions: Definitions,
    pub warnings: Vec<Diagnostic>,
    /// Source lines, for rendering the warnings.
    #[serde(skip)]
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("compilation failed with {} error(s)", .errors.len())]
pub struct CompileFailure {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub lines: Vec<String>,
}

/// Collects diagnostics across stages and decides when to stop.
struct Collected {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Collected {
    fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            match diagnostic.severity {
                Severity::Error => self.errors.push(diagnostic),
                Severity::Warning => self.warnings.push(diagnostic),
            }
        }
    }

    fn failed(&self) -> bool {
        !self.errors.is_empty()
    }

    fn into_failure(self, path: &Path, lines: Vec<String>) -> CompileFailure {
        CompileFailure {
            errors: stamp(self.errors, path),
            warnings: stamp(self.warnings, path),
            lines,
        }
    }
}

fn stamp(diagnostics: Vec<Diagnostic>, path: &Path) -> Vec<Diagnostic> {
    diagnostics.into_iter().map(|d| d.with_path(path)).collect()
}

/// Run the whole pipeline on one source file:
/// scan → preprocess → parse → analyze → fold → generate.
///
/// Every stage reports all the problems it finds; the first stage that
/// reports an error is the last one to run.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn compile<R: BufRead>(
    reader: R,
    path: &Path,
    catalog: &Catalog,
    images: &dyn ImageLoader,
    options: &CompileOptions,
) -> Result<Compilation, CompileFailure> {
    let scanned = lexer::scan(reader, path);
    let lines = scanned.lines;
    let mut collected = Collected { errors: Vec::new(), warnings: Vec::new() };
    if let Some(error) = scanned.error {
        collected.extend([error]);
        return Err(collected.into_failure(path, lines));
    }
    debug!(tokens = scanned.tokens.len(), lines = lines.len(), "scanned");

    let predefined = match preprocess::predefined_macros(&options.defines) {
        Ok(macros) => macros,
        Err(error) => {
            collected.extend([error]);
            return Err(collected.into_failure(path, lines));
        }
    };
    let preprocessed = preprocess::preprocess(scanned.tokens, predefined);
    collected.extend(preprocessed.diagnostics);
    debug!(macros = preprocessed.macros.len(), "preprocessed");

    let (program, parse_errors) = parser::parse(preprocessed.tokens);
    collected.extend(parse_errors);
    if collected.failed() {
        return Err(collected.into_failure(path, lines));
    }

    let (program, analysis) = typeck::analyze(program, catalog, options.analyze);
    collected.extend(analysis.warnings);
    collected.extend(analysis.errors);
    if collected.failed() {
        return Err(collected.into_failure(path, lines));
    }

    let mut definitions = analysis.definitions;
    let (program, fold_errors) =
        optimize::fold_constants(program, &mut definitions, &analysis.types, catalog, images);
    collected.extend(fold_errors);
    if collected.failed() {
        return Err(collected.into_failure(path, lines));
    }

    let (blocks, generate_errors) = compiler::generate(&program, &definitions, &analysis.types, catalog);
    collected.extend(generate_errors);
    if options.warnings_as_errors && !collected.warnings.is_empty() {
        let promoted: Vec<Diagnostic> = collected
            .warnings
            .drain(..)
            .map(|mut w| {
                w.severity = Severity::Error;
                w
            })
            .collect();
        collected.errors.extend(promoted);
    }
    if collected.failed() {
        return Err(collected.into_failure(path, lines));
    }

    info!(blocks = blocks.len(), warnings = collected.warnings.len(), "compiled");
    Ok(Compilation {
        blocks,
        definitions,
        warnings: stamp(collected.warnings, path),
        lines,
    })
}

/// Compile a source string with the robot catalog and default options.
/// Image paths resolve against the working directory.
pub fn compile_source(source: &str) -> Result<Compilation, CompileFailure> {
    compile(
        source.as_bytes(),
        Path::new("<input>"),
        &Catalog::robot(),
        &FileImageLoader::default(),
        &CompileOptions::default(),
    )
}
