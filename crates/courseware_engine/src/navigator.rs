use std::time::Duration;

use courseware_core::{alphabetic_key, display_name};
use engine_logging::{engine_debug, engine_info, engine_warn};

use crate::browser::{BrowserError, BrowserSession, Click, DownloadTrigger, Locator, Lookup};

/// Content-page template of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Units live inside an embedded content frame.
    Framed,
    /// Units are listed in the page itself at a fixed structural path.
    Structural,
}

#[derive(Debug, Clone)]
pub struct NavigatorSettings {
    pub frame_locator: Locator,
    pub framed_units: Locator,
    pub framed_trigger: DownloadTrigger,
    pub structural_units: Locator,
    pub structural_trigger: DownloadTrigger,
    /// Pseudo-units of the structural layout, compared on letters only.
    pub excluded_entries: Vec<String>,
    pub page_load_wait: Duration,
}

impl Default for NavigatorSettings {
    fn default() -> Self {
        Self {
            frame_locator: Locator::Tag("iframe".to_string()),
            framed_units: Locator::ClassName("unit".to_string()),
            framed_trigger: DownloadTrigger::new(Locator::ClassName(
                "download-content-button".to_string(),
            )),
            structural_units: Locator::XPath(
                "//div[@id='ContentView']//ul/li//a[contains(@class, 'd2l-link')]".to_string(),
            ),
            structural_trigger: DownloadTrigger::new(Locator::Text("Download".to_string())),
            excluded_entries: vec!["Table of Contents".to_string()],
            page_load_wait: Duration::from_secs(5),
        }
    }
}

/// A unit found on a course page. `element` is only valid until the page
/// navigates; `position` re-locates it through [`UnitListing::unit_locator`].
#[derive(Debug, Clone)]
pub struct ContentUnit<E> {
    pub display_name: String,
    pub position: usize,
    pub element: E,
}

#[derive(Debug, Clone)]
pub struct UnitListing<E> {
    /// Content page the units were found on.
    pub page_url: String,
    pub layout: Layout,
    /// Frame to re-enter after reloading `page_url`, for framed layouts.
    pub frame_locator: Option<Locator>,
    pub units: Vec<ContentUnit<E>>,
    pub trigger: DownloadTrigger,
    pub unit_locator: Locator,
}

impl<E> UnitListing<E> {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

pub struct ContentNavigator<'a, S> {
    session: &'a S,
    settings: &'a NavigatorSettings,
}

impl<'a, S: BrowserSession> ContentNavigator<'a, S> {
    pub fn new(session: &'a S, settings: &'a NavigatorSettings) -> Self {
        Self { session, settings }
    }

    /// Opens a course content page, detects its layout and lists its units in
    /// page order. A page without units yields an empty listing.
    pub async fn discover(&self, url: &str) -> Result<UnitListing<S::Element>, BrowserError> {
        self.session.leave_frames().await?;
        self.session.goto(url).await?;
        tokio::time::sleep(self.settings.page_load_wait).await;

        let layout = self.detect_layout().await?;
        let (unit_locator, trigger) = match layout {
            Layout::Framed => (
                self.settings.framed_units.clone(),
                self.settings.framed_trigger.clone(),
            ),
            Layout::Structural => (
                self.settings.structural_units.clone(),
                self.settings.structural_trigger.clone(),
            ),
        };

        let elements = self.session.find_all(&unit_locator).await?;
        let excluded: Vec<String> = self
            .settings
            .excluded_entries
            .iter()
            .map(|entry| alphabetic_key(entry))
            .collect();

        let mut units = Vec::with_capacity(elements.len());
        for (position, element) in elements.into_iter().enumerate() {
            let text = match self.session.text(&element).await? {
                Lookup::Found(text) => text,
                Lookup::NotFound | Lookup::Stale => {
                    engine_warn!("Unit #{} vanished before its name could be read", position);
                    continue;
                }
            };
            let name = display_name(&text);
            if name.is_empty() {
                engine_debug!("Ignoring unit #{} without visible text", position);
                continue;
            }
            if layout == Layout::Structural && excluded.contains(&alphabetic_key(&name)) {
                engine_debug!("Ignoring non-content entry {:?}", name);
                continue;
            }
            units.push(ContentUnit {
                display_name: name,
                position,
                element,
            });
        }

        engine_info!("Found {} unit(s) ({:?} layout)", units.len(), layout);
        Ok(UnitListing {
            page_url: url.to_string(),
            layout,
            frame_locator: (layout == Layout::Framed).then(|| self.settings.frame_locator.clone()),
            units,
            trigger,
            unit_locator,
        })
    }

    async fn detect_layout(&self) -> Result<Layout, BrowserError> {
        let frames = self.session.find_all(&self.settings.frame_locator).await?;
        let Some(frame) = frames.first() else {
            return Ok(Layout::Structural);
        };
        match self.session.enter_frame(frame).await? {
            Click::Clicked => Ok(Layout::Framed),
            Click::Stale => {
                engine_warn!("Content frame went stale while entering it; using page layout");
                Ok(Layout::Structural)
            }
        }
    }
}
