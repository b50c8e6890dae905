//! Writing compiled graphs to disk in the shape the packager reads.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use crate::dsl::ast::Value;
use crate::dsl::compiler::BlockGraph;
use crate::dsl::Compilation;
use crate::error::AppError;

/// One compiled file: entity tables keyed by id, plus the blocks.
#[derive(Debug, Serialize)]
pub struct Target<'a> {
    /// id → (name, initial value)
    pub variables: IndexMap<&'a str, (&'a str, Value)>,
    /// id → (name, initial items)
    pub lists: IndexMap<&'a str, (&'a str, &'a [Value])>,
    /// id → event name
    pub broadcasts: IndexMap<&'a str, &'a str>,
    pub blocks: &'a BlockGraph,
}

impl<'a> Target<'a> {
    pub fn new(compilation: &'a Compilation) -> Self {
        let defs = &compilation.definitions;
        Self {
            variables: defs
                .variables
                .values()
                .map(|v| {
                    let initial = v.data_type.default_value().unwrap_or(Value::Str(String::new()));
                    (v.id.as_str(), (v.name.as_str(), initial))
                })
                .collect(),
            lists: defs
                .lists
                .values()
                .map(|l| (l.id.as_str(), (l.name.as_str(), l.values.as_slice())))
                .collect(),
            broadcasts: defs.events.values().map(|e| (e.id.as_str(), e.name.as_str())).collect(),
            blocks: &compilation.blocks,
        }
    }
}

/// Write the compiled target for one file.
pub fn write_target(path: &Path, compilation: &Compilation) -> Result<(), AppError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    write_json(path, &Target::new(compilation))?;
    info!(path = %path.display(), blocks = compilation.blocks.len(), "wrote target");
    Ok(())
}

/// Replace `path` with `data` in a single rename, so the IDE never loads a
/// half-written graph. The staging file is removed if the rename fails.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    let mut staging = path.as_os_str().to_owned();
    staging.push(".partial");
    let staging = PathBuf::from(staging);

    let mut file = fs::File::create(&staging)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&staging, path).map_err(|e| {
        let _ = fs::remove_file(&staging);
        AppError::Io(e)
    })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, json.as_bytes())
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let data = fs::read_to_string(path).map_err(|e| AppError::read(path, e))?;
    Ok(serde_json::from_str(&data)?)
}
