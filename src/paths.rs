//! Centralized file names and path-building functions.
//!
//! No other module should hard-code these strings.

use std::path::{Path, PathBuf};

// ── Leaf filenames ───────────────────────────────────────────────

pub const CONFIG_FILE: &str = "blockc.json";
/// Appended to the source file stem: `main.bot` → `main.blocks.json`.
pub const OUTPUT_SUFFIX: &str = "blocks.json";

// ── Path functions ───────────────────────────────────────────────

/// Directory holding `source`, `.` for a bare file name.
pub fn source_dir(source: &Path) -> &Path {
    match source.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Where the compiled graph of `source` goes: `out_dir` when given,
/// otherwise next to the source.
pub fn output_path(source: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = source.file_stem().map_or_else(|| "out".into(), |s| s.to_string_lossy());
    let dir = out_dir.unwrap_or_else(|| source_dir(source));
    dir.join(format!("{stem}.{OUTPUT_SUFFIX}"))
}
