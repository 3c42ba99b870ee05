use std::path::PathBuf;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use thirtyfour::common::capabilities::firefox::FirefoxPreferences;
use thirtyfour::prelude::*;

use crate::browser::{BrowserError, BrowserSession, Click, Locator, Lookup};

/// MIME types Firefox should save without asking.
const ARCHIVE_MIME_TYPES: &str =
    "application/zip,application/x-zip-compressed,application/octet-stream";

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub webdriver_url: String,
    /// Folder the browser saves downloads into.
    pub download_dir: PathBuf,
    pub headless: bool,
    pub implicit_wait: Duration,
}

impl BrowserSettings {
    pub fn new(download_dir: PathBuf) -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            download_dir,
            headless: true,
            implicit_wait: Duration::from_secs(5),
        }
    }
}

/// Firefox session driven through a WebDriver server (geckodriver).
pub struct FirefoxSession {
    driver: WebDriver,
}

impl FirefoxSession {
    /// Starts a Firefox session that saves archives straight into the
    /// download folder without a dialogue.
    pub async fn start(settings: &BrowserSettings) -> Result<Self, BrowserError> {
        let mut caps = DesiredCapabilities::firefox();
        if settings.headless {
            caps.set_headless().map_err(startup)?;
        }

        let mut prefs = FirefoxPreferences::new();
        prefs.set("browser.download.folderList", 2).map_err(startup)?;
        prefs
            .set("browser.download.manager.showWhenStarting", false)
            .map_err(startup)?;
        prefs
            .set(
                "browser.download.dir",
                settings.download_dir.display().to_string(),
            )
            .map_err(startup)?;
        prefs
            .set("browser.helperApps.neverAsk.saveToDisk", ARCHIVE_MIME_TYPES)
            .map_err(startup)?;
        caps.set_preferences(prefs).map_err(startup)?;

        let driver = WebDriver::new(&settings.webdriver_url, caps)
            .await
            .map_err(startup)?;
        driver
            .set_implicit_wait_timeout(settings.implicit_wait)
            .await
            .map_err(session)?;

        engine_info!(
            "Browser session started via {} (downloads to {:?})",
            settings.webdriver_url,
            settings.download_dir
        );
        Ok(Self { driver })
    }

    /// Closes the browser. The session cannot be used afterwards.
    pub async fn quit(self) -> Result<(), BrowserError> {
        self.driver.quit().await.map_err(session)
    }
}

#[async_trait::async_trait]
impl BrowserSession for FirefoxSession {
    type Element = WebElement;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        engine_debug!("goto {}", url);
        self.driver
            .goto(url)
            .await
            .map_err(|err| BrowserError::Navigation {
                url: url.to_string(),
                message: err.to_string(),
            })
    }

    async fn leave_frames(&self) -> Result<(), BrowserError> {
        self.driver.enter_default_frame().await.map_err(session)
    }

    async fn enter_frame(&self, frame: &WebElement) -> Result<Click, BrowserError> {
        classify_click(frame.clone().enter_frame().await)
    }

    async fn find(&self, locator: &Locator) -> Result<Lookup<WebElement>, BrowserError> {
        classify_lookup(self.driver.find(by(locator)).await)
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<WebElement>, BrowserError> {
        self.driver.find_all(by(locator)).await.map_err(session)
    }

    async fn text(&self, element: &WebElement) -> Result<Lookup<String>, BrowserError> {
        classify_lookup(element.text().await)
    }

    async fn click(&self, element: &WebElement) -> Result<Click, BrowserError> {
        classify_click(element.click().await)
    }

    async fn type_text(&self, element: &WebElement, text: &str) -> Result<Click, BrowserError> {
        classify_click(element.send_keys(text).await)
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        match self.driver.find(By::Tag("body")).await {
            Ok(body) => body.text().await.map_err(session),
            Err(WebDriverError::NoSuchElement(_)) => Ok(String::new()),
            Err(err) => Err(session(err)),
        }
    }

    async fn page_source(&self) -> Result<String, BrowserError> {
        self.driver.source().await.map_err(session)
    }

    async fn alert_text(&self) -> Result<Option<String>, BrowserError> {
        match self.driver.get_alert_text().await {
            Ok(text) => Ok(Some(text)),
            Err(WebDriverError::NoSuchAlert(_)) => Ok(None),
            Err(err) => Err(session(err)),
        }
    }
}

fn by(locator: &Locator) -> By {
    match locator {
        Locator::ClassName(name) => By::ClassName(name.as_str()),
        Locator::Text(text) => By::XPath(format!(
            "//*[contains(normalize-space(text()), {})]",
            xpath_literal(text)
        )),
        Locator::XPath(path) => By::XPath(path.as_str()),
        Locator::Tag(tag) => By::Tag(tag.as_str()),
    }
}

/// Quotes `text` as an XPath 1.0 string literal.
fn xpath_literal(text: &str) -> String {
    if !text.contains('\'') {
        format!("'{text}'")
    } else if !text.contains('"') {
        format!("\"{text}\"")
    } else {
        let parts: Vec<String> = text.split('\'').map(|part| format!("'{part}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

fn classify_lookup<T>(result: WebDriverResult<T>) -> Result<Lookup<T>, BrowserError> {
    match result {
        Ok(value) => Ok(Lookup::Found(value)),
        Err(WebDriverError::NoSuchElement(_)) => Ok(Lookup::NotFound),
        Err(WebDriverError::StaleElementReference(_)) => Ok(Lookup::Stale),
        Err(err) => Err(session(err)),
    }
}

fn classify_click(result: WebDriverResult<()>) -> Result<Click, BrowserError> {
    match result {
        Ok(()) => Ok(Click::Clicked),
        Err(WebDriverError::StaleElementReference(_)) => Ok(Click::Stale),
        Err(err) => Err(session(err)),
    }
}

fn session(err: WebDriverError) -> BrowserError {
    BrowserError::Session(err.to_string())
}

fn startup(err: WebDriverError) -> BrowserError {
    BrowserError::Startup(err.to_string())
}
