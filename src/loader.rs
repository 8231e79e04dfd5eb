//! Loading templates from base directories

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::error::ParseError;
use crate::template::Template;

/// Errors that can occur when selecting a template
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("template not found: {}", names.join(", "))]
    NotFound { names: Vec<String> },

    /// The name resolves outside its base directory
    #[error("suspicious template name '{name}' for directory '{}'", dir.display())]
    Suspicious { name: String, dir: PathBuf },

    #[error("failed to resolve template directory '{}': {source}", dir.display())]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to compile template '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        /// Source text, kept for error reports
        text: String,
        #[source]
        source: ParseError,
    },
}

/// Resolve `.` and `..` without touching the file system
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn absolute_dir(dir: &Path) -> Result<PathBuf, LoadError> {
    let dir = if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| LoadError::Io {
                dir: dir.to_path_buf(),
                source,
            })?
            .join(dir)
    };
    Ok(normalize(&dir))
}

/// Find the first readable candidate
///
/// Candidates are tried in order, each against every directory in order.
/// Returns the file contents and its absolute path. A name that resolves
/// outside its directory fails immediately, even if a later candidate
/// would have been found.
pub fn find_template<N, D>(names: &[N], dirs: &[D]) -> Result<(String, PathBuf), LoadError>
where
    N: AsRef<str>,
    D: AsRef<Path>,
{
    for name in names {
        let name = name.as_ref();
        for dir in dirs {
            let dir = absolute_dir(dir.as_ref())?;
            let path = normalize(&dir.join(name));
            if !path.starts_with(&dir) {
                return Err(LoadError::Suspicious {
                    name: name.to_string(),
                    dir,
                });
            }
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    tracing::debug!(path = %path.display(), "loaded template");
                    return Ok((text, path));
                }
                Err(err) => {
                    tracing::trace!(path = %path.display(), error = %err, "template candidate skipped");
                }
            }
        }
    }
    Err(LoadError::NotFound {
        names: names.iter().map(|n| n.as_ref().to_string()).collect(),
    })
}

/// Load and compile the first readable candidate
pub fn select_template<N, D>(names: &[N], dirs: &[D]) -> Result<Template, LoadError>
where
    N: AsRef<str>,
    D: AsRef<Path>,
{
    let (text, path) = find_template(names, dirs)?;
    match Template::with_origin(text.as_str(), path.clone()) {
        Ok(template) => Ok(template),
        Err(source) => Err(LoadError::Parse { path, text, source }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/b/../c/./d")), PathBuf::from("/a/c/d"));
        assert_eq!(normalize(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn test_absolute_name_is_suspicious() {
        let err = find_template(&["/etc/passwd"], &["/srv/templates"]).unwrap_err();
        assert!(matches!(err, LoadError::Suspicious { .. }));
    }

    #[test]
    fn test_empty_dirs_is_not_found() {
        let dirs: [&str; 0] = [];
        let err = find_template(&["index.html"], &dirs).unwrap_err();
        assert_eq!(err.to_string(), "template not found: index.html");
    }
}
