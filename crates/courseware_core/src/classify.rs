//! Decides how a downloaded archive is unpacked, from its member listing alone.

/// Default member cap above which an archive is left unextracted.
pub const DEFAULT_MAX_MEMBERS: usize = 200;

/// Extensions of files that belong to a multi-file project (code, notebooks,
/// tabular data, plain text). Archives containing any of them are extracted
/// into their own subfolder.
pub const DEFAULT_PROJECT_EXTENSIONS: &[&str] = &[
    // code
    "py", "r", "rmd", "java", "c", "cpp", "h", "js", "ts", "sql", "m", "sas", "do",
    // notebooks
    "ipynb",
    // tabular
    "csv", "tsv", "xls", "xlsx", "xlsm", "parquet", "json",
    // plain text
    "txt",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveDecision {
    /// Extract members directly into the unit folder.
    ExtractFlat,
    /// Extract into a subfolder with the given name (the archive's stem).
    ExtractNested(String),
    /// Leave the archive untouched.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePolicy {
    pub max_members: usize,
    /// Lowercase extensions without the leading dot.
    pub project_extensions: Vec<String>,
}

impl Default for ArchivePolicy {
    fn default() -> Self {
        Self {
            max_members: DEFAULT_MAX_MEMBERS,
            project_extensions: DEFAULT_PROJECT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl ArchivePolicy {
    /// Classifies an archive from its member names. A single project file
    /// anywhere in the listing nests the whole archive.
    pub fn classify<S: AsRef<str>>(&self, archive_stem: &str, members: &[S]) -> ArchiveDecision {
        if members.len() > self.max_members {
            return ArchiveDecision::Skip;
        }
        let nested = members
            .iter()
            .any(|member| self.is_project_file(member.as_ref()));
        if nested {
            ArchiveDecision::ExtractNested(archive_stem.to_string())
        } else {
            ArchiveDecision::ExtractFlat
        }
    }

    pub fn is_project_file(&self, member: &str) -> bool {
        member_extension(member)
            .map(|ext| self.project_extensions.iter().any(|p| *p == ext))
            .unwrap_or(false)
    }
}

/// Lowercased extension of the final path component of an archive member.
fn member_extension(member: &str) -> Option<String> {
    let file_name = member.rsplit(['/', '\\']).next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
