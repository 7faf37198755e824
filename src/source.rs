//! Discovery of API description documents on disk.
//!
//! Discovery only looks at file names; nothing is read or parsed until a
//! module is actually selected.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{BuildError, Error};
use crate::naming::normalize_group;
use crate::spec::{parse_document, resolve_refs, ApiDocument};

/// Encoding of an API description document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Lightweight handle to one API description document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// Module the document contributes to.
    pub module: String,
    pub format: Format,
    pub path: PathBuf,
}

impl SourceRef {
    /// Describe `path` as a source, or `None` if it is not a JSON/YAML file.
    ///
    /// The module name is the normalized file name up to its first `.`, so
    /// `compute.json` and `compute.beta.yaml` both feed module `compute`.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let format = Format::from_extension(path.extension()?.to_str()?)?;
        let file_name = path.file_name()?.to_str()?;
        let stem = file_name.split('.').next().unwrap_or(file_name);
        let module = normalize_group(stem);
        if module.is_empty() {
            return None;
        }
        Some(Self {
            module,
            format,
            path,
        })
    }

    /// Read and parse the document.
    pub fn load(&self) -> Result<ApiDocument, Error> {
        debug!(path = %self.path.display(), module = %self.module, "parsing API description");
        self.read().map_err(|source| Error::Build {
            path: self.path.clone(),
            source,
        })
    }

    fn read(&self) -> Result<ApiDocument, BuildError> {
        let text = std::fs::read_to_string(&self.path)?;
        let raw: Value = match self.format {
            Format::Json => serde_json::from_str(&text)?,
            Format::Yaml => serde_yaml::from_str(&text)?,
        };
        Ok(parse_document(&resolve_refs(&raw)?))
    }
}

/// List the API description documents directly inside `dir`, sorted by file
/// name.
pub fn discover(dir: &Path) -> Result<Vec<SourceRef>, Error> {
    let io_err = |source| Error::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    let mut sources = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if !entry.file_type().map_err(io_err)?.is_file() {
            continue;
        }
        if let Some(source) = SourceRef::from_path(entry.path()) {
            sources.push(source);
        }
    }
    sources.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));

    debug!(dir = %dir.display(), count = sources.len(), "discovered API descriptions");
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL_JSON: &str = r#"{"openapi":"3.0.0","info":{"title":"Compute","version":"1.0"},"paths":{}}"#;
    const MINIMAL_YAML: &str = "openapi: 3.0.0\ninfo:\n  title: Storage\n  version: '2.0'\npaths:\n  /buckets:\n    get:\n      tags: [Buckets]\n";

    #[test]
    fn from_path_derives_module_from_stem() {
        let source = SourceRef::from_path("/apis/compute.beta.yaml").unwrap();
        assert_eq!(source.module, "compute");
        assert_eq!(source.format, Format::Yaml);

        let source = SourceRef::from_path("/apis/Block Storage.JSON").unwrap();
        assert_eq!(source.module, "block-storage");
        assert_eq!(source.format, Format::Json);
    }

    #[test]
    fn from_path_ignores_other_files() {
        assert!(SourceRef::from_path("/apis/README.md").is_none());
        assert!(SourceRef::from_path("/apis/noext").is_none());
        assert!(SourceRef::from_path("/apis/.json").is_none());
    }

    #[test]
    fn discover_lists_documents_sorted_without_parsing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("storage.yaml"), MINIMAL_YAML).unwrap();
        fs::write(dir.path().join("compute.json"), "not even json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let sources = discover(dir.path()).unwrap();
        let modules: Vec<&str> = sources.iter().map(|s| s.module.as_str()).collect();
        assert_eq!(modules, ["compute", "storage"]);
    }

    #[test]
    fn discover_reports_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::Discovery { .. }));
    }

    #[test]
    fn load_parses_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("compute.json");
        let yaml_path = dir.path().join("storage.yml");
        fs::write(&json_path, MINIMAL_JSON).unwrap();
        fs::write(&yaml_path, MINIMAL_YAML).unwrap();

        let compute = SourceRef::from_path(json_path).unwrap().load().unwrap();
        assert_eq!(compute.info.title, "Compute");

        let storage = SourceRef::from_path(yaml_path).unwrap().load().unwrap();
        assert_eq!(storage.info.version, "2.0");
        assert_eq!(storage.operations.len(), 1);
        assert_eq!(storage.operations[0].group, "Buckets");
    }

    #[test]
    fn load_inlines_component_refs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pods.json");
        let doc = serde_json::json!({
            "paths": {"/pods/{podId}": {"delete": {
                "tags": ["Pods"],
                "parameters": [{"$ref": "#/components/parameters/PodId"}]
            }}},
            "components": {"parameters": {
                "PodId": {"name": "podId", "in": "path", "schema": {"type": "integer"}}
            }}
        });
        fs::write(&path, doc.to_string()).unwrap();

        let pods = SourceRef::from_path(path).unwrap().load().unwrap();
        let params = &pods.operations[0].path_params;
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].name, "podId");
        assert_eq!(params[0].schema, serde_json::json!({"type": "integer"}));
    }

    #[test]
    fn load_reports_build_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ nope").unwrap();

        let err = SourceRef::from_path(&path).unwrap().load().unwrap_err();
        match err {
            Error::Build { path: failed, source } => {
                assert_eq!(failed, path);
                assert!(matches!(source, BuildError::Json(_)));
            }
            other => panic!("expected build error, got {other:?}"),
        }
    }
}
