//! Plain-HTTP ingestion of a second site's files: fetch a listing page,
//! download the linked files and unpack them with the shared normalizer.

use std::collections::HashSet;
use std::path::PathBuf;

use courseware_core::folder_name;
use engine_logging::{engine_error, engine_info, engine_warn};
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use url::Url;

use crate::decode::decode_page;
use crate::fetch::{FetchError, Fetcher};
use crate::normalize::{ExtractionReport, NormalizeError, Normalizer};
use crate::persist::AtomicFileWriter;

pub const DEFAULT_FILE_EXTENSIONS: &[&str] =
    &["zip", "csv", "xlsx", "xls", "ipynb", "py", "pdf", "txt", "json"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestCredentials {
    /// Links on this host and port need the credentials below.
    pub base_url: Url,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub target_dir: PathBuf,
    pub credentials: IngestCredentials,
    /// Lowercase extensions of links worth downloading.
    pub file_extensions: Vec<String>,
}

impl IngestSettings {
    pub fn new(target_dir: PathBuf, credentials: IngestCredentials) -> Self {
        Self {
            target_dir,
            credentials,
            file_extensions: DEFAULT_FILE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Hosted by the credentialed platform.
    Platform,
    /// Anywhere else; fetched as is.
    Dataset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestLink {
    /// Absolute URL without credentials.
    pub url: Url,
    pub kind: LinkKind,
    pub file_name: String,
}

impl IngestLink {
    /// URL to request: platform links get the credentials written into their
    /// userinfo.
    pub fn request_url(&self, credentials: &IngestCredentials) -> Url {
        let mut url = self.url.clone();
        if self.kind == LinkKind::Platform {
            let username = urlencoding::encode(&credentials.username);
            let password = urlencoding::encode(&credentials.password);
            let _ = url.set_username(&username);
            let _ = url.set_password(Some(&password));
        }
        url
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid listing url {url}: {message}")]
    InvalidUrl { url: String, message: String },
    #[error("listing page could not be fetched: {0}")]
    Listing(#[from] FetchError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestSummary {
    pub links: Vec<IngestLink>,
    pub downloaded: Vec<PathBuf>,
    /// `(url, reason)` of downloads that failed.
    pub failed: Vec<(String, String)>,
    pub extractions: Vec<ExtractionReport>,
    pub extraction_failures: Vec<String>,
}

/// Pulls every downloadable link of a listing page into one folder.
pub struct Ingester<'a, F> {
    fetcher: &'a F,
    normalizer: &'a Normalizer,
    settings: &'a IngestSettings,
}

impl<'a, F: Fetcher> Ingester<'a, F> {
    pub fn new(fetcher: &'a F, normalizer: &'a Normalizer, settings: &'a IngestSettings) -> Self {
        Self {
            fetcher,
            normalizer,
            settings,
        }
    }

    pub async fn run(&self, listing_url: &str) -> Result<IngestSummary, IngestError> {
        let page_url = Url::parse(listing_url).map_err(|err| IngestError::InvalidUrl {
            url: listing_url.to_string(),
            message: err.to_string(),
        })?;
        let listing = self.fetcher.fetch(page_url.as_str()).await?;
        let page = decode_page(&listing.bytes, listing.metadata.content_type.as_deref());
        if page.lossy {
            engine_warn!("Listing page had bytes invalid in {}", page.encoding_label);
        }

        let base = Url::parse(&listing.metadata.final_url).unwrap_or(page_url);
        let links = collect_links(
            &page.html,
            &base,
            &self.settings.credentials,
            &self.settings.file_extensions,
        );
        engine_info!("Found {} downloadable link(s) on {}", links.len(), base);

        let writer = AtomicFileWriter::new(self.settings.target_dir.clone());
        let mut summary = IngestSummary::default();
        for link in &links {
            let request_url = link.request_url(&self.settings.credentials);
            match self.fetcher.fetch(request_url.as_str()).await {
                Ok(output) => match writer.write(&link.file_name, &output.bytes) {
                    Ok(path) => {
                        engine_info!("Downloaded {} ({} bytes)", link.url, output.bytes.len());
                        summary.downloaded.push(path);
                    }
                    Err(err) => {
                        engine_error!("Saving {} failed: {}", link.url, err);
                        summary.failed.push((link.url.to_string(), err.to_string()));
                    }
                },
                Err(err) => {
                    engine_error!("Download of {} failed: {}", link.url, err);
                    summary.failed.push((link.url.to_string(), err.to_string()));
                }
            }
        }

        for result in self.normalizer.extract_all(&self.settings.target_dir)? {
            match result {
                Ok(report) => summary.extractions.push(report),
                Err(err) => {
                    engine_error!("{}", err);
                    summary.extraction_failures.push(err.to_string());
                }
            }
        }

        summary.links = links;
        Ok(summary)
    }
}

/// Resolves the anchors of a listing page and keeps those pointing at files
/// with one of `extensions`, first occurrence first.
pub fn collect_links(
    html: &str,
    base: &Url,
    credentials: &IngestCredentials,
    extensions: &[String],
) -> Vec<IngestLink> {
    let document = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut used_names = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Ok(mut url) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(url.scheme(), "http" | "https") {
            continue;
        }
        url.set_fragment(None);
        let _ = url.set_username("");
        let _ = url.set_password(None);

        let Some(segment) = last_segment(&url) else {
            continue;
        };
        if !has_wanted_extension(&segment, extensions) || !seen.insert(url.to_string()) {
            continue;
        }

        let kind = if same_site(&url, &credentials.base_url) {
            LinkKind::Platform
        } else {
            LinkKind::Dataset
        };
        let mut file_name = file_name_for(&segment, &url);
        if !used_names.insert(file_name.clone()) {
            file_name = with_suffix(&file_name, &short_hash(url.as_str()));
            used_names.insert(file_name.clone());
        }
        links.push(IngestLink {
            url,
            kind,
            file_name,
        });
    }
    links
}

fn same_site(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

fn last_segment(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(
        urlencoding::decode(segment)
            .map(|s| s.into_owned())
            .unwrap_or_else(|_| segment.to_string()),
    )
}

fn has_wanted_extension(segment: &str, extensions: &[String]) -> bool {
    segment
        .rsplit_once('.')
        .map(|(_, ext)| extensions.iter().any(|wanted| wanted.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Sanitized file name that keeps the extension even for long names.
fn file_name_for(segment: &str, url: &Url) -> String {
    let (stem, ext) = segment.rsplit_once('.').unwrap_or((segment, ""));
    let stem = if stem.trim().is_empty() {
        format!("link-{}", short_hash(url.as_str()))
    } else {
        folder_name(stem)
    };
    if ext.is_empty() {
        stem
    } else {
        format!("{stem}.{}", folder_name(ext))
    }
}

/// `data.zip` with suffix `ab12` becomes `data-ab12.zip`.
fn with_suffix(file_name: &str, suffix: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{suffix}.{ext}"),
        None => format!("{file_name}-{suffix}"),
    }
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
