mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::{instant_driver, instant_navigator, zip_bytes, FakePage, FakeSession, FakeUnit};
use courseware_core::{Course, CourseCatalog};
use courseware_engine::{CourseOutcome, CourseRun, Normalizer, RunSettings, RunSummary};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use url::Url;

const BASE: &str = "https://lms.test/d2l/le/content";

fn settings(save_root: &Path) -> RunSettings {
    RunSettings {
        save_root: save_root.to_path_buf(),
        content_base: Url::parse(BASE).unwrap(),
        navigator: instant_navigator(),
        driver: instant_driver(),
    }
}

fn session(save_root: &Path) -> FakeSession {
    FakeSession::new(save_root.to_path_buf())
        .with_page(
            &format!("{BASE}/101/home"),
            FakePage::framed(vec![
                FakeUnit::with_download(
                    "Week 1",
                    "Week 1.zip",
                    zip_bytes(&[("intro.pdf", b"intro"), ("Table of Contents.html", b"toc")]),
                ),
                FakeUnit::page_only("Announcements", "Exam moved to Friday"),
            ]),
        )
        .failing(&format!("{BASE}/202/home"))
        .with_page(
            "https://lms.test/custom/303",
            FakePage::structural(vec![
                FakeUnit::page_only("Table of Contents", "toc"),
                FakeUnit::with_download(
                    "Project",
                    "Project.zip",
                    zip_bytes(&[("model.py", b"fit()"), ("data.csv", b"x,y")]),
                ),
            ]),
        )
}

fn catalog() -> CourseCatalog {
    CourseCatalog {
        courses: vec![
            Course::with_code("Intro to Statistics", "101"),
            Course::with_code("Broken: Course", "202"),
            Course::with_url("Machine Learning", "https://lms.test/custom/303"),
        ],
    }
}

async fn run(save_root: &Path) -> RunSummary {
    engine_logging::initialize_for_tests();
    let session = session(save_root);
    let settings = settings(save_root);
    let normalizer = Normalizer::default();
    CourseRun::new(&session, &normalizer, &settings)
        .run(&catalog())
        .await
}

/// Every file under `root`, relative and sorted.
fn tree(root: &Path) -> Vec<PathBuf> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

#[tokio::test]
async fn failing_course_does_not_stop_the_batch() {
    let dir = tempdir().unwrap();

    let summary = run(dir.path()).await;

    assert_eq!(summary.courses.len(), 3);
    assert!(matches!(summary.courses[0].outcome, CourseOutcome::Processed(_)));
    assert!(matches!(summary.courses[1].outcome, CourseOutcome::Failed(_)));
    assert!(matches!(summary.courses[2].outcome, CourseOutcome::Processed(_)));
    assert_eq!(summary.failed_courses(), 1);
    assert_eq!(summary.completed_units(), 3);
    assert!(!dir.path().join("Broken_ Course").exists());
}

#[tokio::test]
async fn run_produces_normalized_course_tree() {
    let dir = tempdir().unwrap();

    run(dir.path()).await;

    assert_eq!(
        tree(dir.path()),
        vec![
            PathBuf::from("Intro to Statistics/Announcements/Announcements.html"),
            PathBuf::from("Intro to Statistics/Week 1/intro.pdf"),
            PathBuf::from("Machine Learning/Project/Project/data.csv"),
            PathBuf::from("Machine Learning/Project/Project/model.py"),
        ]
    );
}

#[tokio::test]
async fn rerun_overwrites_instead_of_duplicating() {
    let dir = tempdir().unwrap();

    run(dir.path()).await;
    let first = tree(dir.path());
    run(dir.path()).await;

    assert_eq!(tree(dir.path()), first);
}

#[tokio::test]
async fn leftover_downloads_are_swept_before_the_run() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("Week 1 (old).zip"), b"partial").unwrap();
    fs::write(dir.path().join("stray.html"), b"<p/>").unwrap();

    run(dir.path()).await;

    assert!(!dir.path().join("Week 1 (old).zip").exists());
    assert!(!dir.path().join("stray.html").exists());
}

#[tokio::test]
async fn course_without_units_gets_no_folder() {
    let dir = tempdir().unwrap();
    let session = FakeSession::new(dir.path().to_path_buf());
    let settings = settings(dir.path());
    let normalizer = Normalizer::default();
    let catalog = CourseCatalog {
        courses: vec![Course::with_code("Empty Course", "999")],
    };

    let summary = CourseRun::new(&session, &normalizer, &settings)
        .run(&catalog)
        .await;

    assert_eq!(summary.courses[0].outcome, CourseOutcome::NoContent);
    assert_eq!(summary.courses[0].folder, dir.path().join("Empty Course"));
    assert!(!dir.path().join("Empty Course").exists());
}
