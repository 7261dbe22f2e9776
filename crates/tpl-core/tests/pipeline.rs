//! End-to-end: search path -> archive -> rendered project

use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use tpl_core::{generate, Delimiters, Error, RenderContext, ScaffoldConfig, SourceKind};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
        } else {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
    }
    zip.finish().unwrap();
}

fn config_with_search_path(work: &TempDir, search: &Path) -> ScaffoldConfig {
    ScaffoldConfig::new(work.path().join("cache")).with_search_path(vec![search.to_path_buf()])
}

#[test]
fn test_search_path_zip_renders_project() {
    let work = TempDir::new().unwrap();
    let search = work.path().join("templates");
    fs::create_dir_all(&search).unwrap();
    write_zip(
        &search.join("rust-cli.zip"),
        &[
            ("_Cargo.toml", "[package]\nname = \"{{{ .name }}}\"\n"),
            ("src/", ""),
            ("src/main.rs", "// {{{ .org }}}\nfn main() { println!(\"{{{ .name }}}\"); }\n"),
            ("{{{ .name }}}.md", "# {{{ .name | upper }}}\n"),
        ],
    );

    let target = work.path().join("out");
    let context = RenderContext::new().with_name("demo").with_org("acme");
    let generated = generate(
        &config_with_search_path(&work, &search),
        "rust-cli",
        &target,
        &context,
    )
    .unwrap();

    assert_eq!(generated.kind, SourceKind::SearchPathArchive);
    assert!(generated.location.ends_with("rust-cli.zip"));
    assert_eq!(generated.files.len(), 3);

    assert_eq!(
        fs::read_to_string(target.join("Cargo.toml")).unwrap(),
        "[package]\nname = \"demo\"\n"
    );
    assert_eq!(
        fs::read_to_string(target.join("src/main.rs")).unwrap(),
        "// acme\nfn main() { println!(\"demo\"); }\n"
    );
    assert_eq!(fs::read_to_string(target.join("demo.md")).unwrap(), "# DEMO\n");
    assert!(!target.join("_Cargo.toml").exists());
}

#[test]
fn test_search_path_directory_with_custom_delimiters() {
    let work = TempDir::new().unwrap();
    let search = work.path().join("templates");
    fs::create_dir_all(search.join("plain/docs")).unwrap();
    fs::write(search.join("plain/docs/<<.name>>.txt"), "hi <<.name>> {{ kept }}\n").unwrap();

    let target = work.path().join("out");
    let config = config_with_search_path(&work, &search)
        .with_delimiters(Delimiters::new("<<", ">>").unwrap());
    let generated = generate(
        &config,
        "plain",
        &target,
        &RenderContext::new().with_name("demo"),
    )
    .unwrap();

    assert_eq!(generated.kind, SourceKind::SearchPathEntry);
    assert_eq!(generated.files, vec!["docs/demo.txt"]);
    assert_eq!(
        fs::read_to_string(target.join("docs/demo.txt")).unwrap(),
        "hi demo {{ kept }}\n"
    );
}

#[test]
fn test_missing_local_template_is_not_found() {
    let work = TempDir::new().unwrap();
    let missing = work.path().join("nope");
    let err = generate(
        &ScaffoldConfig::new(work.path().join("cache")),
        missing.to_str().unwrap(),
        &work.path().join("out"),
        &RenderContext::new(),
    )
    .unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }), "{}", err);
    assert!(!work.path().join("out").exists());
}
