use std::fs;
use std::path::{Path, PathBuf};

use courseware_core::{folder_name, CatalogError, Course, CourseCatalog};
use engine_logging::{engine_error, engine_info, engine_warn, LogContext};
use url::Url;

use crate::browser::{BrowserError, BrowserSession};
use crate::driver::{DriverSettings, UnitDriver, UnitReport};
use crate::navigator::{ContentNavigator, NavigatorSettings};
use crate::normalize::{NormalizeError, Normalizer, DOWNLOAD_EXTENSIONS};

#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Root all course folders are created under. The browser downloads
    /// into it as well.
    pub save_root: PathBuf,
    /// Course content pages live at `<content_base>/<code>/home`.
    pub content_base: Url,
    pub navigator: NavigatorSettings,
    pub driver: DriverSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("cannot create course folder {path}: {source}")]
    Folder {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseOutcome {
    Processed(Vec<UnitReport>),
    /// The content page lists no units; no folder is created.
    NoContent,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseReport {
    pub course_name: String,
    pub folder: PathBuf,
    pub outcome: CourseOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub courses: Vec<CourseReport>,
}

impl RunSummary {
    pub fn failed_courses(&self) -> usize {
        self.courses
            .iter()
            .filter(|c| matches!(c.outcome, CourseOutcome::Failed(_)))
            .count()
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitReport> {
        self.courses.iter().flat_map(|course| match &course.outcome {
            CourseOutcome::Processed(units) => units.as_slice(),
            CourseOutcome::NoContent | CourseOutcome::Failed(_) => &[][..],
        })
    }

    pub fn completed_units(&self) -> usize {
        self.units().filter(|unit| unit.is_completed()).count()
    }
}

/// Runs the whole catalog through one browser session, one course and one
/// unit at a time.
pub struct CourseRun<'a, S> {
    session: &'a S,
    normalizer: &'a Normalizer,
    settings: &'a RunSettings,
}

impl<'a, S: BrowserSession> CourseRun<'a, S> {
    pub fn new(session: &'a S, normalizer: &'a Normalizer, settings: &'a RunSettings) -> Self {
        Self {
            session,
            normalizer,
            settings,
        }
    }

    /// Processes every course in catalog order. A failing course is logged
    /// and recorded; it never stops the batch.
    pub async fn run(&self, catalog: &CourseCatalog) -> RunSummary {
        engine_info!(
            "Saving {} course(s) to {:?}",
            catalog.len(),
            self.settings.save_root
        );
        self.sweep_downloads("pre-run");

        let mut summary = RunSummary::default();
        for course in &catalog.courses {
            let _ctx = LogContext::course(&course.name);
            let folder = self.settings.save_root.join(folder_name(&course.name));
            engine_info!("Attempting to get content");
            let outcome = match self.run_course(course, &folder).await {
                Ok(outcome) => {
                    engine_info!("Finished getting content");
                    outcome
                }
                Err(err) => {
                    engine_error!("Course failed: {}", err);
                    CourseOutcome::Failed(err.to_string())
                }
            };
            summary.courses.push(CourseReport {
                course_name: course.name.clone(),
                folder,
                outcome,
            });
        }

        self.sweep_downloads("post-run");
        engine_info!(
            "Run finished: {} unit(s) completed, {} course(s) failed",
            summary.completed_units(),
            summary.failed_courses()
        );
        summary
    }

    async fn run_course(&self, course: &Course, folder: &Path) -> Result<CourseOutcome, CourseError> {
        let save_root = self.settings.save_root.as_path();
        self.normalizer.cleanup(save_root, DOWNLOAD_EXTENSIONS)?;

        let url = course.content_url(&self.settings.content_base)?;
        let navigator = ContentNavigator::new(self.session, &self.settings.navigator);
        let listing = navigator.discover(url.as_str()).await?;
        if listing.is_empty() {
            engine_info!("No content units; nothing to download");
            return Ok(CourseOutcome::NoContent);
        }

        fs::create_dir_all(folder).map_err(|source| CourseError::Folder {
            path: folder.to_path_buf(),
            source,
        })?;

        let driver = UnitDriver::new(
            self.session,
            self.normalizer,
            save_root,
            &self.settings.driver,
        );
        let mut reports = Vec::with_capacity(listing.units.len());
        for unit in &listing.units {
            reports.push(driver.process(folder, &listing, unit).await);
        }

        Ok(finish_course(self.normalizer, folder, reports))
    }

    fn sweep_downloads(&self, stage: &str) {
        if let Err(err) = self
            .normalizer
            .cleanup(&self.settings.save_root, DOWNLOAD_EXTENSIONS)
        {
            engine_warn!("{} cleanup of {:?} failed: {}", stage, self.settings.save_root, err);
        }
    }
}

/// Drops the generated listing pages once every unit ran. The unit results
/// stand even when that cleanup fails.
fn finish_course(
    normalizer: &Normalizer,
    folder: &Path,
    reports: Vec<UnitReport>,
) -> CourseOutcome {
    if let Err(err) = normalizer.prune_marker_files(folder, &["html"]) {
        engine_warn!("Leaving marker pages in {:?}: {}", folder, err);
    }
    CourseOutcome::Processed(reports)
}
