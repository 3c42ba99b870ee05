use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use courseware_core::{folder_name, SkipReason, UnitEvent, UnitPhase, UnitTrace};
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn, LogContext};

use crate::browser::{BrowserError, BrowserSession, Click, DownloadTrigger, Lookup};
use crate::navigator::{ContentUnit, UnitListing};
use crate::normalize::{ExtractionReport, Normalizer, DOWNLOAD_EXTENSIONS};
use crate::persist::AtomicFileWriter;

#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// Pause after opening a unit, before its download control is looked up.
    pub activation_wait: Duration,
    /// Fixed wait that bounds the browser's background download. Nothing is
    /// polled; the download is assumed finished once it elapses.
    pub settle_wait: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            activation_wait: Duration::from_secs(2),
            settle_wait: Duration::from_secs(60),
        }
    }
}

/// What one unit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitReport {
    pub unit_name: String,
    pub folder: PathBuf,
    pub phase: UnitPhase,
    pub retried: bool,
    /// The rendered page was saved instead of a download.
    pub captured_page: bool,
    pub moved: Vec<PathBuf>,
    pub extractions: Vec<ExtractionReport>,
    /// Non-fatal normalization problems.
    pub problems: Vec<String>,
}

impl UnitReport {
    pub fn is_completed(&self) -> bool {
        self.phase == UnitPhase::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Download,
    SavedPage,
}

enum ControlAttempt {
    Clicked,
    Stale,
    Missing,
}

/// Drives a single unit from discovery to a normalized folder.
pub struct UnitDriver<'a, S> {
    session: &'a S,
    normalizer: &'a Normalizer,
    download_dir: &'a Path,
    settings: &'a DriverSettings,
}

impl<'a, S: BrowserSession> UnitDriver<'a, S> {
    pub fn new(
        session: &'a S,
        normalizer: &'a Normalizer,
        download_dir: &'a Path,
        settings: &'a DriverSettings,
    ) -> Self {
        Self {
            session,
            normalizer,
            download_dir,
            settings,
        }
    }

    /// Processes one unit. Never fails: every problem ends up in the report
    /// and the log, so the caller can move on to the next unit.
    pub async fn process(
        &self,
        course_dir: &Path,
        listing: &UnitListing<S::Element>,
        unit: &ContentUnit<S::Element>,
    ) -> UnitReport {
        let _ctx = LogContext::unit(&unit.display_name);
        let folder = course_dir.join(folder_name(&unit.display_name));
        let mut trace = UnitTrace::new();
        let mut report = UnitReport {
            unit_name: unit.display_name.clone(),
            folder: folder.clone(),
            phase: UnitPhase::Discovered,
            retried: false,
            captured_page: false,
            moved: Vec::new(),
            extractions: Vec::new(),
            problems: Vec::new(),
        };

        if let Err(err) = fs::create_dir_all(&folder) {
            engine_error!("Cannot create unit folder {:?}: {}", folder, err);
            trace.apply(UnitEvent::Failed(SkipReason::Io(err.to_string())));
            return finish(report, &trace);
        }

        engine_debug!("Downloading");
        let trigger = match self.trigger(listing, unit, &mut trace).await {
            Ok(trigger) => trigger,
            Err(err) => {
                engine_error!("Browser failure: {}", err);
                trace.apply(UnitEvent::Failed(SkipReason::Browser(err.to_string())));
                None
            }
        };
        let Some(trigger) = trigger else {
            if let UnitPhase::Skipped(reason) = trace.phase() {
                engine_warn!("Skipped: {}", reason);
            }
            return finish(report, &trace);
        };

        if trigger == Trigger::Download {
            tokio::time::sleep(self.settings.settle_wait).await;
        }
        trace.apply(UnitEvent::Settled);
        report.captured_page = trigger == Trigger::SavedPage;
        engine_debug!("Downloaded");

        self.normalize(unit, &folder, &mut report);
        finish(report, &trace)
    }

    /// Opens the unit and fires its download. `None` means the unit ended in
    /// a skipped phase.
    async fn trigger(
        &self,
        listing: &UnitListing<S::Element>,
        unit: &ContentUnit<S::Element>,
        trace: &mut UnitTrace,
    ) -> Result<Option<Trigger>, BrowserError> {
        if let Err(reason) = self.activate(listing, unit).await? {
            trace.apply(UnitEvent::Failed(SkipReason::Activation(reason)));
            return Ok(None);
        }
        trace.apply(UnitEvent::Activated);
        tokio::time::sleep(self.settings.activation_wait).await;

        match self.click_control(&listing.trigger).await? {
            ControlAttempt::Clicked => {
                trace.apply(UnitEvent::ControlClicked);
                Ok(Some(Trigger::Download))
            }
            ControlAttempt::Stale => {
                trace.apply(UnitEvent::ControlStale);
                engine_warn!("Download control went stale; locating it again");
                match self.click_control(&listing.trigger).await? {
                    ControlAttempt::Clicked => {
                        trace.apply(UnitEvent::RetryClicked);
                        Ok(Some(Trigger::Download))
                    }
                    ControlAttempt::Stale | ControlAttempt::Missing => {
                        trace.apply(UnitEvent::RetryFailed);
                        engine_error!("Download control still unusable after retry");
                        Ok(None)
                    }
                }
            }
            ControlAttempt::Missing => {
                trace.apply(UnitEvent::ControlMissing);
                self.capture_page(unit, trace).await
            }
        }
    }

    /// Clicks the unit, re-locating it once by position when the handle is
    /// stale.
    async fn activate(
        &self,
        listing: &UnitListing<S::Element>,
        unit: &ContentUnit<S::Element>,
    ) -> Result<Result<(), String>, BrowserError> {
        if self.session.click(&unit.element).await? == Click::Clicked {
            return Ok(Ok(()));
        }

        engine_warn!("Unit handle went stale; locating it again");
        let Some(element) = self.relocate(listing, unit.position).await? else {
            return Ok(Err(format!("unit #{} no longer on the page", unit.position)));
        };
        match self.session.click(&element).await? {
            Click::Clicked => Ok(Ok(())),
            Click::Stale => Ok(Err("unit handle stale after retry".to_string())),
        }
    }

    /// Finds the unit at `position` again, reloading the content page when
    /// the current page no longer lists it.
    async fn relocate(
        &self,
        listing: &UnitListing<S::Element>,
        position: usize,
    ) -> Result<Option<S::Element>, BrowserError> {
        let units = self.session.find_all(&listing.unit_locator).await?;
        if let Some(element) = units.into_iter().nth(position) {
            return Ok(Some(element));
        }

        engine_debug!("Reloading content page to locate unit #{}", position);
        self.session.leave_frames().await?;
        self.session.goto(&listing.page_url).await?;
        if let Some(frame_locator) = &listing.frame_locator {
            if let Some(frame) = self.session.find_all(frame_locator).await?.first() {
                self.session.enter_frame(frame).await?;
            }
        }
        Ok(self
            .session
            .find_all(&listing.unit_locator)
            .await?
            .into_iter()
            .nth(position))
    }

    async fn click_control(&self, trigger: &DownloadTrigger) -> Result<ControlAttempt, BrowserError> {
        let control = match self.session.find(&trigger.locator).await? {
            Lookup::Found(control) => control,
            Lookup::Stale => return Ok(ControlAttempt::Stale),
            Lookup::NotFound => return Ok(ControlAttempt::Missing),
        };
        Ok(match self.session.click(&control).await? {
            Click::Clicked => ControlAttempt::Clicked,
            Click::Stale => ControlAttempt::Stale,
        })
    }

    /// Saves the rendered page into the download folder for units without a
    /// download control.
    async fn capture_page(
        &self,
        unit: &ContentUnit<S::Element>,
        trace: &mut UnitTrace,
    ) -> Result<Option<Trigger>, BrowserError> {
        let body = self.session.body_text().await?;
        if body.trim().is_empty() {
            trace.apply(UnitEvent::PageEmpty);
            return Ok(None);
        }

        let html = self.session.page_source().await?;
        let file_name = format!("{}.html", folder_name(&unit.display_name));
        let writer = AtomicFileWriter::new(self.download_dir.to_path_buf());
        match writer.write(&file_name, html.as_bytes()) {
            Ok(path) => {
                engine_info!("No download control; saved page as {:?}", path);
                trace.apply(UnitEvent::PageCaptured);
                Ok(Some(Trigger::SavedPage))
            }
            Err(err) => {
                trace.apply(UnitEvent::Failed(SkipReason::Io(err.to_string())));
                Ok(None)
            }
        }
    }

    fn normalize(&self, unit: &ContentUnit<S::Element>, folder: &Path, report: &mut UnitReport) {
        let mut filter = vec![folder_name(&unit.display_name)];
        if !filter.contains(&unit.display_name) {
            filter.push(unit.display_name.clone());
        }

        report.moved = match self.normalizer.move_matching(
            self.download_dir,
            folder,
            DOWNLOAD_EXTENSIONS,
            Some(&filter),
        ) {
            Ok(moved) => moved,
            Err(err) => {
                engine_error!("Could not move downloads: {}", err);
                report.problems.push(err.to_string());
                Vec::new()
            }
        };

        for archive in report.moved.iter().filter(|path| is_zip(path)) {
            match self.normalizer.extract_archive(archive, folder) {
                Ok(extraction) => report.extractions.push(extraction),
                Err(err) => {
                    engine_error!("{}", err);
                    report.problems.push(err.to_string());
                }
            }
        }

        if let Err(err) = self.normalizer.prune_marker_files(folder, &["html"]) {
            engine_warn!("Could not prune marker pages: {}", err);
            report.problems.push(err.to_string());
        }
    }
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

fn finish(mut report: UnitReport, trace: &UnitTrace) -> UnitReport {
    report.phase = trace.phase().clone();
    report.retried = trace.was_retried();
    report
}
