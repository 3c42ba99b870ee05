use std::fs;
use std::path::Path;

use serde::Deserialize;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("course {name:?} has neither a code nor a url")]
    MissingSource { name: String },
    #[error("invalid content url for course {name:?}: {message}")]
    InvalidUrl { name: String, message: String },
}

/// Where a course's content page lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseSource {
    /// Platform course code; the URL is derived from the content base.
    Code(String),
    /// Explicit content page URL.
    Url(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    pub name: String,
    pub source: CourseSource,
}

impl Course {
    pub fn with_code(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: CourseSource::Code(code.into()),
        }
    }

    pub fn with_url(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: CourseSource::Url(url.into()),
        }
    }

    /// Content page URL: `<content_base>/<code>/home`, or the explicit URL.
    pub fn content_url(&self, content_base: &Url) -> Result<Url, CatalogError> {
        let invalid = |err: url::ParseError| CatalogError::InvalidUrl {
            name: self.name.clone(),
            message: err.to_string(),
        };
        match &self.source {
            CourseSource::Url(raw) => Url::parse(raw).map_err(invalid),
            CourseSource::Code(code) => {
                let mut base = content_base.clone();
                if !base.path().ends_with('/') {
                    let path = format!("{}/", base.path());
                    base.set_path(&path);
                }
                base.join(&format!("{}/home", code.trim())).map_err(invalid)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    courses: Vec<RawCourse>,
}

#[derive(Debug, Deserialize)]
struct RawCourse {
    name: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

/// Ordered list of courses; catalog order is processing order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CourseCatalog {
    pub courses: Vec<Course>,
}

impl CourseCatalog {
    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(text)?;
        let courses = raw
            .courses
            .into_iter()
            .map(|course| match (course.code, course.url) {
                (Some(code), _) => Ok(Course::with_code(course.name, code)),
                (None, Some(url)) => Ok(Course::with_url(course.name, url)),
                (None, None) => Err(CatalogError::MissingSource { name: course.name }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { courses })
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize {
        self.courses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courses.is_empty()
    }
}
