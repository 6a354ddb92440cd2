//! Round-trip tests for the artifact packager.

#[path = "common/test_config.rs"]
mod test_config;

use std::collections::BTreeSet;
use std::io::{Cursor, Read};

use camino::Utf8PathBuf;
use liftoff::{SHIM_FILE_NAME, archive_workspace};
use tempfile::TempDir;
use zip::ZipArchive;

use test_config::seed_workspace;

fn workspace() -> (TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    seed_workspace(dir.path());
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp path");
    (dir, root)
}

fn read_entry(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
    let mut entry = archive.by_name(name).expect("entry exists");
    let mut content = String::new();
    entry.read_to_string(&mut content).expect("entry is UTF-8");
    content
}

#[test]
fn every_workspace_file_survives_at_its_relative_path() {
    let (_dir, root) = workspace();
    let bytes = archive_workspace(&root, 3000).expect("packaging succeeds");

    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive parses");
    assert_eq!(
        read_entry(&mut archive, "server"),
        "#!/bin/sh\nexec ./app\n"
    );
    assert_eq!(read_entry(&mut archive, "static/index.html"), "<html></html>");
    assert_eq!(read_entry(&mut archive, "static/css/site.css"), "body {}");
}

#[test]
fn exactly_one_synthetic_entry_is_appended() {
    let (_dir, root) = workspace();
    let bytes = archive_workspace(&root, 3000).expect("packaging succeeds");

    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive parses");
    let names: BTreeSet<String> = (0..archive.len())
        .map(|index| {
            archive
                .by_index(index)
                .expect("entry readable")
                .name()
                .trim_end_matches('/')
                .to_owned()
        })
        .collect();

    let expected: BTreeSet<String> = [
        "server",
        "static",
        "static/css",
        "static/css/site.css",
        "static/index.html",
        SHIM_FILE_NAME,
    ]
    .into_iter()
    .map(str::to_owned)
    .collect();
    assert_eq!(names, expected);
}

#[test]
fn the_shim_entry_embeds_the_configured_port() {
    let (_dir, root) = workspace();
    let bytes = archive_workspace(&root, 4242).expect("packaging succeeds");

    let mut archive = ZipArchive::new(Cursor::new(bytes)).expect("archive parses");
    let shim = read_entry(&mut archive, SHIM_FILE_NAME);
    assert!(shim.contains("port: 4242,"));
    assert!(shim.contains("spawn('./server'"));
}

#[test]
fn identical_workspaces_produce_identical_archives() {
    let (_dir, root) = workspace();
    let first = archive_workspace(&root, 3000).expect("first packaging succeeds");
    let second = archive_workspace(&root, 3000).expect("second packaging succeeds");
    assert_eq!(first, second);
}
