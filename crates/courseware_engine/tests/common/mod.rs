#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use courseware_engine::{
    BrowserError, BrowserSession, Click, DriverSettings, Locator, Lookup, NavigatorSettings,
};
use zip::write::SimpleFileOptions;

/// Builds an in-memory zip archive.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

pub fn instant_navigator() -> NavigatorSettings {
    NavigatorSettings {
        page_load_wait: Duration::ZERO,
        ..NavigatorSettings::default()
    }
}

pub fn instant_driver() -> DriverSettings {
    DriverSettings {
        activation_wait: Duration::ZERO,
        settle_wait: Duration::ZERO,
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeUnit {
    pub name: String,
    /// `(file name, bytes)` the browser saves when the control is clicked.
    pub download: Option<(String, Vec<u8>)>,
    pub has_control: bool,
    pub body_text: String,
    /// Clicks on the unit itself that report a stale handle.
    pub stale_unit_clicks: usize,
    /// Control lookups that report a stale handle.
    pub stale_control_lookups: usize,
}

impl FakeUnit {
    pub fn with_download(name: &str, file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            download: Some((file_name.to_string(), bytes)),
            has_control: true,
            body_text: format!("{name} overview"),
            ..Self::default()
        }
    }

    pub fn page_only(name: &str, body_text: &str) -> Self {
        Self {
            name: name.to_string(),
            body_text: body_text.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    pub framed: bool,
    /// Opening a unit loads a new document, invalidating every handle.
    pub navigates_on_open: bool,
    pub units: Vec<FakeUnit>,
    /// Ids of form fields present on the page.
    pub form_fields: Vec<String>,
    /// Text of a JavaScript dialogue shown over the page.
    pub alert: Option<String>,
}

impl FakePage {
    pub fn framed(units: Vec<FakeUnit>) -> Self {
        Self {
            framed: true,
            units,
            ..Self::default()
        }
    }

    pub fn structural(units: Vec<FakeUnit>) -> Self {
        Self {
            navigates_on_open: true,
            units,
            ..Self::default()
        }
    }

    pub fn form(fields: &[&str]) -> Self {
        Self {
            form_fields: fields.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn with_alert(self, text: &str) -> Self {
        Self {
            alert: Some(text.to_string()),
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeElement {
    Frame { generation: u64 },
    Unit { generation: u64, index: usize },
    Control { generation: u64, index: usize },
    Field(String),
}

#[derive(Debug, Default)]
struct State {
    pages: HashMap<String, FakePage>,
    failing: Vec<String>,
    /// Page the units of the current document belong to.
    page: Option<String>,
    in_frame: bool,
    generation: u64,
    active_unit: Option<usize>,
    visits: Vec<String>,
    downloads: Vec<String>,
    typed: Vec<(String, String)>,
    submitted: bool,
}

/// Scripted stand-in for a browser. Pages are keyed by URL; unknown URLs
/// load as empty documents.
pub struct FakeSession {
    download_dir: PathBuf,
    state: Mutex<State>,
}

impl FakeSession {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            download_dir,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_page(self, url: &str, page: FakePage) -> Self {
        self.state.lock().unwrap().pages.insert(url.to_string(), page);
        self
    }

    /// Navigation to `url` fails like a dead session would.
    pub fn failing(self, url: &str) -> Self {
        self.state.lock().unwrap().failing.push(url.to_string());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.state.lock().unwrap().downloads.clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().typed.clone()
    }

    pub fn submitted(&self) -> bool {
        self.state.lock().unwrap().submitted
    }
}

impl State {
    fn current_page(&self) -> Option<&FakePage> {
        self.page.as_ref().and_then(|url| self.pages.get(url))
    }

    fn active(&mut self) -> Option<&mut FakeUnit> {
        let index = self.active_unit?;
        let url = self.page.clone()?;
        self.pages.get_mut(&url)?.units.get_mut(index)
    }
}

#[async_trait::async_trait]
impl BrowserSession for FakeSession {
    type Element = FakeElement;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.visits.push(url.to_string());
        if state.failing.iter().any(|failing| failing == url) {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: "connection refused".to_string(),
            });
        }
        state.page = Some(url.to_string());
        state.in_frame = false;
        state.generation += 1;
        state.active_unit = None;
        Ok(())
    }

    async fn leave_frames(&self) -> Result<(), BrowserError> {
        self.state.lock().unwrap().in_frame = false;
        Ok(())
    }

    async fn enter_frame(&self, frame: &FakeElement) -> Result<Click, BrowserError> {
        let mut state = self.state.lock().unwrap();
        match frame {
            FakeElement::Frame { generation } if *generation == state.generation => {
                state.in_frame = true;
                Ok(Click::Clicked)
            }
            _ => Ok(Click::Stale),
        }
    }

    async fn find(&self, locator: &Locator) -> Result<Lookup<FakeElement>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        if let Locator::XPath(path) = locator {
            if let Some(id) = path.split('"').nth(1).filter(|_| path.contains("@id=")) {
                let present = state
                    .current_page()
                    .map(|page| page.form_fields.iter().any(|field| field == id))
                    .unwrap_or(false);
                return Ok(if present {
                    Lookup::Found(FakeElement::Field(id.to_string()))
                } else {
                    Lookup::NotFound
                });
            }
        }

        let generation = state.generation;
        let Some(index) = state.active_unit else {
            return Ok(Lookup::NotFound);
        };
        let Some(unit) = state.active() else {
            return Ok(Lookup::NotFound);
        };
        if !unit.has_control {
            return Ok(Lookup::NotFound);
        }
        if unit.stale_control_lookups > 0 {
            unit.stale_control_lookups -= 1;
            return Ok(Lookup::Stale);
        }
        Ok(Lookup::Found(FakeElement::Control { generation, index }))
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<FakeElement>, BrowserError> {
        let state = self.state.lock().unwrap();
        let generation = state.generation;
        let Some(page) = state.current_page() else {
            return Ok(Vec::new());
        };
        // A page that navigated away for an open unit lists nothing.
        if page.navigates_on_open && state.active_unit.is_some() {
            return Ok(Vec::new());
        }
        let units = || -> Vec<FakeElement> {
            (0..page.units.len())
                .map(|index| FakeElement::Unit { generation, index })
                .collect()
        };
        Ok(match locator {
            Locator::Tag(tag) if tag == "iframe" && page.framed && !state.in_frame => {
                vec![FakeElement::Frame { generation }]
            }
            Locator::ClassName(_) if page.framed && state.in_frame => units(),
            Locator::XPath(_) if !page.framed => units(),
            _ => Vec::new(),
        })
    }

    async fn text(&self, element: &FakeElement) -> Result<Lookup<String>, BrowserError> {
        let state = self.state.lock().unwrap();
        match element {
            FakeElement::Unit { generation, index } if *generation == state.generation => Ok(state
                .current_page()
                .and_then(|page| page.units.get(*index))
                .map(|unit| Lookup::Found(unit.name.clone()))
                .unwrap_or(Lookup::NotFound)),
            _ => Ok(Lookup::Stale),
        }
    }

    async fn click(&self, element: &FakeElement) -> Result<Click, BrowserError> {
        let mut state = self.state.lock().unwrap();
        match element {
            FakeElement::Unit { generation, index } => {
                if *generation != state.generation {
                    return Ok(Click::Stale);
                }
                let url = state.page.clone().unwrap_or_default();
                let Some(page) = state.pages.get_mut(&url) else {
                    return Ok(Click::Stale);
                };
                let navigates = page.navigates_on_open;
                let Some(unit) = page.units.get_mut(*index) else {
                    return Ok(Click::Stale);
                };
                if unit.stale_unit_clicks > 0 {
                    unit.stale_unit_clicks -= 1;
                    return Ok(Click::Stale);
                }
                state.active_unit = Some(*index);
                if navigates {
                    state.generation += 1;
                }
                Ok(Click::Clicked)
            }
            FakeElement::Control { generation, index } => {
                if *generation != state.generation || state.active_unit != Some(*index) {
                    return Ok(Click::Stale);
                }
                let download = state.active().and_then(|unit| unit.download.clone());
                if let Some((file_name, bytes)) = download {
                    fs::create_dir_all(&self.download_dir).unwrap();
                    fs::write(self.download_dir.join(&file_name), bytes).unwrap();
                    state.downloads.push(file_name);
                }
                Ok(Click::Clicked)
            }
            FakeElement::Field(_) => {
                state.submitted = true;
                Ok(Click::Clicked)
            }
            FakeElement::Frame { .. } => Ok(Click::Clicked),
        }
    }

    async fn type_text(&self, element: &FakeElement, text: &str) -> Result<Click, BrowserError> {
        let mut state = self.state.lock().unwrap();
        match element {
            FakeElement::Field(id) => {
                state.typed.push((id.clone(), text.to_string()));
                Ok(Click::Clicked)
            }
            _ => Ok(Click::Stale),
        }
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        let mut state = self.state.lock().unwrap();
        Ok(state
            .active()
            .map(|unit| unit.body_text.clone())
            .unwrap_or_default())
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        let body = self.body_text().await?;
        Ok(format!("<html><body><p>{body}</p></body></html>"))
    }

    async fn alert_text(&self) -> Result<Option<String>, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(state.current_page().and_then(|page| page.alert.clone()))
    }
}
