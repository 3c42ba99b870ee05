use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Download course material from the learning platform and unpack it into
/// one folder per course unit.
#[derive(Debug, Parser)]
#[command(name = "courseware")]
#[command(about = "Download course material into per-unit folders", long_about = None)]
pub struct Cli {
    /// Folder course folders are created in; the browser downloads here too.
    /// Defaults to `<Documents>/courseware`.
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Course catalog (JSON with a `courses` array).
    #[arg(long, default_value = "courses.json", value_name = "FILE")]
    pub catalog: PathBuf,

    /// Root URL of the learning platform; also where sign-in starts.
    #[arg(long, default_value = "https://emlyon.brightspace.com/", value_name = "URL")]
    pub platform: Url,

    /// WebDriver server (geckodriver) to drive Firefox through.
    #[arg(long, default_value = "http://localhost:4444", value_name = "URL")]
    pub webdriver: String,

    /// Show the browser window.
    #[arg(long)]
    pub headed: bool,

    /// Seconds to wait for a triggered download to finish.
    #[arg(long, default_value_t = 60, value_name = "SECS")]
    pub settle_secs: u64,

    /// Instead of the course run, download every file linked from this page.
    #[arg(long, value_name = "LISTING_URL")]
    pub ingest: Option<Url>,

    /// Folder under the save root that ingested files go to.
    #[arg(long, default_value = "bootcamp", value_name = "NAME")]
    pub ingest_folder: String,

    /// Log debug detail.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn save_root(&self) -> PathBuf {
        match &self.directory {
            Some(dir) => dir.clone(),
            None => dirs::document_dir()
                .or_else(dirs::home_dir)
                .unwrap_or_else(|| PathBuf::from("."))
                .join("courseware"),
        }
    }
}
