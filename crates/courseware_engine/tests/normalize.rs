mod common;

use std::fs;
use std::path::Path;

use common::zip_bytes;
use courseware_core::{ArchiveDecision, ArchivePolicy};
use courseware_engine::{NormalizeError, Normalizer, DOWNLOAD_EXTENSIONS};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn write(path: &Path, bytes: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, bytes).unwrap();
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn project_archive_is_extracted_into_named_subfolder_and_deleted() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("Lab 3.zip");
    write(
        &archive,
        &zip_bytes(&[("analysis.py", b"print(1)"), ("data.csv", b"a,b")]),
    );

    let report = Normalizer::default()
        .extract_archive(&archive, dir.path())
        .unwrap();

    assert_eq!(report.decision, ArchiveDecision::ExtractNested("Lab 3".into()));
    assert!(report.archive_removed);
    assert!(!archive.exists());
    assert_eq!(
        fs::read_to_string(dir.path().join("Lab 3").join("analysis.py")).unwrap(),
        "print(1)"
    );
    assert!(dir.path().join("Lab 3").join("data.csv").is_file());
}

#[test]
fn plain_archive_is_extracted_flat() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("Week 1.zip");
    write(
        &archive,
        &zip_bytes(&[
            ("slides/", b""),
            ("slides/intro.pdf", b"%PDF"),
            ("reading.html", b"<p>read</p>"),
        ]),
    );

    let report = Normalizer::default()
        .extract_archive(&archive, dir.path())
        .unwrap();

    assert_eq!(report.decision, ArchiveDecision::ExtractFlat);
    assert_eq!(report.extracted.len(), 2);
    assert!(dir.path().join("slides").join("intro.pdf").is_file());
    assert!(dir.path().join("reading.html").is_file());
    assert_eq!(file_names(dir.path()), vec!["reading.html", "slides"]);
}

#[test]
fn member_named_like_the_archive_does_not_overwrite_it() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("Week 1.zip");
    write(
        &archive,
        &zip_bytes(&[("Week 1.zip", b"inner"), ("b.pdf", b"%PDF")]),
    );

    let report = Normalizer::default()
        .extract_archive(&archive, dir.path())
        .unwrap();

    assert_eq!(report.decision, ArchiveDecision::ExtractFlat);
    assert_eq!(report.extracted, vec![dir.path().join("b.pdf")]);
    assert!(report.archive_removed);
    assert_eq!(fs::read(dir.path().join("b.pdf")).unwrap(), b"%PDF");
    assert_eq!(file_names(dir.path()), vec!["b.pdf"]);
}

#[test]
fn oversized_archive_is_left_untouched() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("Everything.zip");
    write(
        &archive,
        &zip_bytes(&[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")]),
    );
    let normalizer = Normalizer::new(
        ArchivePolicy {
            max_members: 2,
            ..ArchivePolicy::default()
        },
        "Table of Contents",
    );

    let report = normalizer.extract_archive(&archive, dir.path()).unwrap();

    assert_eq!(report.decision, ArchiveDecision::Skip);
    assert!(!report.archive_removed);
    assert!(report.extracted.is_empty());
    assert_eq!(file_names(dir.path()), vec!["Everything.zip"]);
}

#[test]
fn malformed_archive_is_reported_and_kept() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("broken.zip");
    write(&archive, b"this is not a zip file");

    let err = Normalizer::default()
        .extract_archive(&archive, dir.path())
        .unwrap_err();

    assert!(matches!(err, NormalizeError::Malformed { .. }));
    assert!(archive.is_file());
}

#[test]
fn missing_archive_is_reported() {
    let dir = tempdir().unwrap();
    let err = Normalizer::default()
        .extract_archive(&dir.path().join("gone.zip"), dir.path())
        .unwrap_err();
    assert!(matches!(err, NormalizeError::Missing(_)));
}

#[test]
fn unsafe_member_paths_are_not_written_outside_the_target() {
    let dir = tempdir().unwrap();
    let unit = dir.path().join("unit");
    let archive = unit.join("notes.zip");
    write(
        &archive,
        &zip_bytes(&[("../escape.md", b"x"), ("notes.md", b"ok")]),
    );

    let report = Normalizer::default().extract_archive(&archive, &unit).unwrap();

    assert_eq!(report.extracted, vec![unit.join("notes.md")]);
    assert!(!dir.path().join("escape.md").exists());
}

#[test]
fn extract_all_handles_each_archive_independently() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.zip"), &zip_bytes(&[("a.pdf", b"a")]));
    write(&dir.path().join("b.zip"), b"garbage");
    write(&dir.path().join("c.zip"), &zip_bytes(&[("c.py", b"c")]));

    let results = Normalizer::default().extract_all(dir.path()).unwrap();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert!(results[2].is_ok());
    assert_eq!(file_names(dir.path()), vec!["a.pdf", "b.zip", "c"]);
}

#[test]
fn move_matching_moves_only_filtered_downloads() {
    let dir = tempdir().unwrap();
    let downloads = dir.path().join("downloads");
    let dest = dir.path().join("Week 2");
    write(&downloads.join("Week 2.zip"), b"zip");
    write(&downloads.join("Week 3.zip"), b"other");
    write(&downloads.join("week_2 notes.html"), b"<p/>");
    write(&downloads.join("Week 2.pdf"), b"pdf");

    let filter = vec!["Week 2".to_string()];
    let moved = Normalizer::default()
        .move_matching(&downloads, &dest, DOWNLOAD_EXTENSIONS, Some(&filter))
        .unwrap();

    assert_eq!(
        moved,
        vec![dest.join("Week 2.zip"), dest.join("week_2 notes.html")]
    );
    assert_eq!(file_names(&downloads), vec!["Week 2.pdf", "Week 3.zip"]);
}

#[test]
fn filter_does_not_take_a_longer_unit_number() {
    let dir = tempdir().unwrap();
    let downloads = dir.path().join("downloads");
    let dest = dir.path().join("Week 1");
    write(&downloads.join("Week 1.zip"), b"zip");
    write(&downloads.join("Week 1 (2).zip"), b"again");
    write(&downloads.join("Week 10.zip"), b"late");

    let filter = vec!["Week 1".to_string()];
    let moved = Normalizer::default()
        .move_matching(&downloads, &dest, DOWNLOAD_EXTENSIONS, Some(&filter))
        .unwrap();

    assert_eq!(
        moved,
        vec![dest.join("Week 1 (2).zip"), dest.join("Week 1.zip")]
    );
    assert_eq!(file_names(&downloads), vec!["Week 10.zip"]);
}

#[test]
fn filter_without_match_moves_nothing() {
    let dir = tempdir().unwrap();
    let downloads = dir.path().join("downloads");
    let dest = dir.path().join("Unit");
    write(&downloads.join("Something else.zip"), b"zip");

    let filter = vec!["Unit 9".to_string()];
    let moved = Normalizer::default()
        .move_matching(&downloads, &dest, DOWNLOAD_EXTENSIONS, Some(&filter))
        .unwrap();

    assert!(moved.is_empty());
    assert!(downloads.join("Something else.zip").is_file());
    assert!(!dest.exists());
}

#[test]
fn move_without_filter_overwrites_existing_files() {
    let dir = tempdir().unwrap();
    let downloads = dir.path().join("downloads");
    let dest = dir.path().join("Unit");
    write(&downloads.join("page.html"), b"new");
    write(&dest.join("page.html"), b"old");

    let moved = Normalizer::default()
        .move_matching(&downloads, &dest, &["html"], None)
        .unwrap();

    assert_eq!(moved, vec![dest.join("page.html")]);
    assert_eq!(fs::read_to_string(dest.join("page.html")).unwrap(), "new");
}

#[test]
fn marker_pages_are_pruned() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("Table of Contents.html"), b"toc");
    write(&dir.path().join("Table of Contents - Week 1.html"), b"toc");
    write(&dir.path().join("Lecture.html"), b"lecture");
    write(&dir.path().join("Table of Contents.pdf"), b"pdf");

    let removed = Normalizer::default()
        .prune_marker_files(dir.path(), &["html"])
        .unwrap();

    assert_eq!(removed.len(), 2);
    assert_eq!(
        file_names(dir.path()),
        vec!["Lecture.html", "Table of Contents.pdf"]
    );
}

#[test]
fn cleanup_is_idempotent_and_tolerates_missing_folder() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("old.zip"), b"zip");
    write(&dir.path().join("old.html"), b"html");
    write(&dir.path().join("keep.pdf"), b"pdf");
    write(&dir.path().join("nested").join("deep.zip"), b"zip");

    let normalizer = Normalizer::default();
    assert_eq!(normalizer.cleanup(dir.path(), DOWNLOAD_EXTENSIONS).unwrap(), 2);
    assert_eq!(normalizer.cleanup(dir.path(), DOWNLOAD_EXTENSIONS).unwrap(), 0);
    assert_eq!(file_names(dir.path()), vec!["keep.pdf", "nested"]);
    assert!(dir.path().join("nested").join("deep.zip").is_file());

    assert_eq!(
        normalizer
            .cleanup(&dir.path().join("absent"), DOWNLOAD_EXTENSIONS)
            .unwrap(),
        0
    );
}
