//! Reading class sources from disk.
//!
//! The compiler itself never touches the file system; hosts call
//! [`load_sources`] and feed the result to
//! [`CompilationUnitSet::add_class`](uscript_compiler::CompilationUnitSet::add_class).

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// File extension of class sources.
pub const SOURCE_EXTENSION: &str = "uc";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} has no usable class name")]
    BadFileName { path: PathBuf },
}

/// One class source: the class name is the file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub class: String,
    pub path: PathBuf,
    pub text: String,
}

/// Every `*.uc` file directly under `dir`, sorted by file name.
pub fn load_sources(dir: &Path) -> Result<Vec<SourceFile>, LoadError> {
    let io = |path: &Path| {
        let path = path.to_path_buf();
        move |source| LoadError::Io { path, source }
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io(dir))? {
        let path = entry.map_err(io(dir))?.path();
        let is_source = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(SOURCE_EXTENSION));
        if is_source && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let class = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LoadError::BadFileName { path: path.clone() })?
            .to_string();
        let text = fs::read_to_string(&path).map_err(io(&path))?;
        debug!(class = %class, path = %path.display(), bytes = text.len(), "loaded source");
        files.push(SourceFile { class, path, text });
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_load_in_name_order() {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_scripts");
        let files = load_sources(&dir).unwrap();
        assert!(files.iter().any(|f| f.class == "Object"));
        let names: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let err = load_sources(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
