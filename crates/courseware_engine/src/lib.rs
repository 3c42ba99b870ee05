//! Courseware engine: browser automation, download normalization and the
//! course run built on top of them.
mod browser;
mod decode;
mod driver;
mod fetch;
mod ingest;
mod login;
mod navigator;
mod normalize;
mod orchestrator;
mod persist;
mod webdriver;

pub use browser::{BrowserError, BrowserSession, Click, DownloadTrigger, Locator, Lookup};
pub use decode::{decode_page, DecodedPage};
pub use driver::{DriverSettings, UnitDriver, UnitReport};
pub use fetch::{
    FailureKind, FetchError, FetchMetadata, FetchOutput, FetchSettings, Fetcher, ReqwestFetcher,
};
pub use ingest::{
    collect_links, IngestCredentials, IngestError, IngestLink, IngestSettings, IngestSummary,
    Ingester, LinkKind, DEFAULT_FILE_EXTENSIONS,
};
pub use login::{log_in, Credentials, LoginError, LoginForm, SignIn};
pub use navigator::{ContentNavigator, ContentUnit, Layout, NavigatorSettings, UnitListing};
pub use normalize::{
    ExtractionReport, NormalizeError, Normalizer, DEFAULT_MARKER, DOWNLOAD_EXTENSIONS,
};
pub use orchestrator::{
    CourseError, CourseOutcome, CourseReport, CourseRun, RunSettings, RunSummary,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use webdriver::{BrowserSettings, FirefoxSession};
