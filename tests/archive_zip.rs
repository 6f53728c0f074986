use std::fs;
use std::io::Read;
use std::path::Path;

use httrack_zip::archive::{archive_dir, ZipArchiver};
use httrack_zip::contract::Archiver;
use httrack_zip::error::ArchiveError;
use tempfile::tempdir;
use walkdir::WalkDir;
use zip::ZipArchive;

fn build_tree(root: &Path) {
    fs::create_dir_all(root.join("example.com/css")).unwrap();
    fs::create_dir_all(root.join("empty")).unwrap();
    fs::write(root.join("index.html"), "<html>".repeat(200)).unwrap();
    fs::write(root.join("example.com/page.html"), "page body").unwrap();
    fs::write(root.join("example.com/css/site.css"), "body { margin: 0 }").unwrap();
}

#[tokio::test]
async fn archive_contains_every_file_with_relative_names() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("mirror");
    build_tree(&source);
    let dest = tmp.path().join("out/mirror.zip");

    let result = ZipArchiver.archive(&source, &dest).await.unwrap();

    assert_eq!(result.archive_path, dest);
    assert_eq!(result.file_count, 3);
    assert_eq!(result.total_size, 1200 + 9 + 18);
    assert_eq!(result.archive_size, fs::metadata(&dest).unwrap().len());
    assert!(result.compression_ratio > 0.0 && result.compression_ratio < 1.0);

    let mut zip = ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
    let names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    assert_eq!(
        names,
        vec!["example.com/css/site.css", "example.com/page.html", "index.html"]
    );

    let mut page = String::new();
    zip.by_name("example.com/page.html")
        .unwrap()
        .read_to_string(&mut page)
        .unwrap();
    assert_eq!(page, "page body");
}

#[test]
fn empty_source_produces_empty_archive() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("empty");
    fs::create_dir_all(&source).unwrap();
    let dest = tmp.path().join("empty.zip");

    let result = archive_dir(&source, &dest).unwrap();

    assert_eq!(result.file_count, 0);
    assert_eq!(result.total_size, 0);
    assert_eq!(result.compression_ratio, 0.0);
    let zip = ZipArchive::new(fs::File::open(&dest).unwrap()).unwrap();
    assert_eq!(zip.len(), 0);
}

#[test]
fn missing_source_is_unreadable_and_writes_nothing() {
    let tmp = tempdir().unwrap();
    let dest = tmp.path().join("out.zip");

    let err = archive_dir(&tmp.path().join("nope"), &dest).unwrap_err();

    assert!(matches!(err, ArchiveError::SourceUnreadable { .. }));
    assert!(!dest.exists());
}

#[test]
fn unwritable_destination_leaves_no_partial_archive() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("mirror");
    build_tree(&source);
    // The destination's parent is a regular file, so nothing can be created there.
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let dest = blocker.join("out.zip");

    let err = archive_dir(&source, &dest).unwrap_err();

    assert!(matches!(err, ArchiveError::WriteFailed { .. }));
    assert!(!dest.exists());
    let leftovers: Vec<_> = fs::read_dir(tmp.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn existing_archive_is_replaced_atomically() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("mirror");
    build_tree(&source);
    let dest = tmp.path().join("mirror.zip");
    fs::write(&dest, "stale").unwrap();

    let result = archive_dir(&source, &dest).unwrap();

    assert_eq!(result.file_count, 3);
    assert!(ZipArchive::new(fs::File::open(&dest).unwrap()).is_ok());
}

#[test]
fn extracting_the_archive_reproduces_every_file_byte_for_byte() {
    let tmp = tempdir().unwrap();
    let source = tmp.path().join("mirror");
    build_tree(&source);
    let binary: Vec<u8> = (0..=255u8).cycle().take(256 * 40).collect();
    fs::create_dir_all(source.join("example.com/img/deep")).unwrap();
    fs::write(source.join("example.com/img/deep/logo.png"), &binary).unwrap();
    fs::write(source.join("example.com/img/invalid-utf8.bin"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
    let dest = tmp.path().join("mirror.zip");

    let result = archive_dir(&source, &dest).unwrap();

    let restored = tempdir().unwrap();
    ZipArchive::new(fs::File::open(&dest).unwrap())
        .unwrap()
        .extract(restored.path())
        .unwrap();

    let mut compared = 0u64;
    for entry in WalkDir::new(&source).sort_by_file_name() {
        let entry = entry.unwrap();
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(&source).unwrap();
        let original = fs::read(entry.path()).unwrap();
        let extracted = fs::read(restored.path().join(relative))
            .unwrap_or_else(|e| panic!("{} not extracted: {e}", relative.display()));
        assert_eq!(original, extracted, "{} differs", relative.display());
        compared += 1;
    }
    assert_eq!(compared, 5);
    assert_eq!(result.file_count, compared);

    let extracted_files = WalkDir::new(restored.path())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count();
    assert_eq!(extracted_files as u64, compared, "no extra entries");
}
