//! Template loading from base directories

use std::fs;

use pretty_assertions::assert_eq;
use rattle::{select_template, Context, Library, LoadError};
use tempfile::TempDir;

fn dirs_with(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, text) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, text).unwrap();
    }
    dir
}

#[test]
fn test_first_candidate_found() {
    let dir = dirs_with(&[("page.html", "Hi {{ who }}"), ("other.html", "no")]);
    let template = select_template(&["missing.html", "page.html", "other.html"], &[dir.path()])
        .unwrap();
    let ctx = Context::new().with("who", "you");
    assert_eq!(template.render(&ctx, &Library::new()).unwrap(), "Hi you");
    assert_eq!(template.origin(), Some(dir.path().join("page.html").as_path()));
}

#[test]
fn test_directories_searched_in_order() {
    let first = dirs_with(&[("shared/base.html", "first")]);
    let second = dirs_with(&[("shared/base.html", "second"), ("only.html", "only")]);
    let dirs = [first.path(), second.path()];

    let template = select_template(&["shared/base.html"], &dirs).unwrap();
    assert_eq!(template.source(), "first");

    let template = select_template(&["only.html"], &dirs).unwrap();
    assert_eq!(template.source(), "only");
}

#[test]
fn test_not_found() {
    let dir = dirs_with(&[]);
    let err = select_template(&["a.html", "b.html"], &[dir.path()]).unwrap_err();
    assert!(matches!(err, LoadError::NotFound { .. }));
    insta::assert_snapshot!(err.to_string(), @"template not found: a.html, b.html");
}

#[test]
fn test_escaping_the_directory_is_suspicious() {
    let outer = dirs_with(&[("test.html", "secret")]);
    let inner = outer.path().join("templates");
    fs::create_dir_all(&inner).unwrap();

    let err = select_template(&["../test.html"], &[inner.as_path()]).unwrap_err();
    assert!(matches!(err, LoadError::Suspicious { ref name, .. } if name == "../test.html"));
}

#[test]
fn test_dot_segments_inside_the_directory_are_fine() {
    let dir = dirs_with(&[("a/page.html", "ok")]);
    let template = select_template(&["a/../a/./page.html"], &[dir.path()]).unwrap();
    assert_eq!(template.source(), "ok");
}

#[test]
fn test_compile_error_keeps_the_path() {
    let dir = dirs_with(&[("broken.html", "{% if x %}never closed")]);
    let err = select_template(&["broken.html"], &[dir.path()]).unwrap_err();
    match err {
        LoadError::Parse { path, text, source } => {
            assert_eq!(path, dir.path().join("broken.html"));
            assert_eq!(text, "{% if x %}never closed");
            let report = source.format(&text, "broken.html");
            assert!(report.contains("broken.html"));
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}
