//! On-disk layout of a backup directory.
//!
//! ```text
//! <root>/definitions/<group>_<kind>.<ext>
//! <root>/entities/<group>_<version>_<namespace>_<kind>_<name>.<ext>
//! <root>/relations/relations.<ext>
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Serialize, de::DeserializeOwned};

pub const DEFINITIONS_DIR: &str = "definitions";
pub const ENTITIES_DIR: &str = "entities";
pub const RELATIONS_DIR: &str = "relations";
pub const RELATIONS_FILE_STEM: &str = "relations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum BackupFormat {
    Json,
    #[default]
    Yaml,
}

impl BackupFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            BackupFormat::Json => "json",
            BackupFormat::Yaml => "yaml",
        }
    }

    /// Format of an existing record file, `None` for unrecognized files.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(BackupFormat::Json),
            "yaml" | "yml" => Some(BackupFormat::Yaml),
            _ => None,
        }
    }

    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        match self {
            BackupFormat::Json => {
                serde_json::to_string_pretty(value).context("Failed to encode JSON")
            }
            BackupFormat::Yaml => serde_yaml::to_string(value).context("Failed to encode YAML"),
        }
    }

    pub fn deserialize<T: DeserializeOwned>(&self, contents: &str) -> Result<T> {
        match self {
            BackupFormat::Json => serde_json::from_str(contents).context("Invalid JSON"),
            BackupFormat::Yaml => serde_yaml::from_str(contents).context("Invalid YAML"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub definitions: PathBuf,
    pub entities: PathBuf,
    pub relations: PathBuf,
}

impl Layout {
    pub fn new(root: &Path) -> Self {
        Self {
            definitions: root.join(DEFINITIONS_DIR),
            entities: root.join(ENTITIES_DIR),
            relations: root.join(RELATIONS_DIR),
        }
    }

    pub fn create(root: &Path) -> Result<Self> {
        let layout = Self::new(root);
        for dir in [&layout.definitions, &layout.entities, &layout.relations] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(layout)
    }
}

/// Path separators in record names would escape the target directory.
fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect()
}

pub fn write_record<T: Serialize + ?Sized>(
    dir: &Path,
    stem: &str,
    value: &T,
    format: BackupFormat,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", sanitize_stem(stem), format.extension()));
    let contents = format.serialize(value)?;
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = BackupFormat::from_path(path)
        .with_context(|| format!("Unrecognized record file {}", path.display()))?;
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    format.deserialize(&contents)
}

/// Recognized record files directly inside `dir`, sorted by name.
/// `Ok(None)` when the directory does not exist.
pub fn list_record_files(dir: &Path) -> Result<Option<Vec<PathBuf>>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read directory {}", dir.display()));
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read directory {}", dir.display()))?;
        let path = entry.path();
        if path.is_file() && BackupFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(Some(files))
}
