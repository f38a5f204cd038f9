//! Output Layout
//!
//! Resolves where capture files go. The directory is computed once, at
//! construction, from an optional template expanded against the capture
//! start date:
//!
//! | Placeholder | Expands to   |
//! |-------------|--------------|
//! | `{y}`       | `2024`       |
//! | `{m}`       | `03`         |
//! | `{d}`       | `07`         |
//! | `{ymd}`     | `20240307`   |
//!
//! File names are `<YYYYMMDD>.<name>.<extension>` inside that directory.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::committer::CommitError;

/// Expand a directory template against `date`.
#[must_use]
pub fn expand_directory_template(template: &str, date: NaiveDate) -> String {
    template
        .replace("{ymd}", &date.format("%Y%m%d").to_string())
        .replace("{y}", &date.format("%Y").to_string())
        .replace("{m}", &date.format("%m").to_string())
        .replace("{d}", &date.format("%d").to_string())
}

/// Dated file naming rooted at an optional directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    directory: Option<PathBuf>,
    capture_date: NaiveDate,
}

impl OutputLayout {
    /// Resolve the layout and create the directory, recursively.
    ///
    /// An empty or absent template writes into the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::CreateDirectory`] if the directory cannot be
    /// created.
    pub fn resolve(template: Option<&str>, capture_date: NaiveDate) -> Result<Self, CommitError> {
        let directory = template
            .filter(|t| !t.is_empty())
            .map(|t| PathBuf::from(expand_directory_template(t, capture_date)));

        if let Some(dir) = &directory {
            std::fs::create_dir_all(dir).map_err(|source| CommitError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(Self {
            directory,
            capture_date,
        })
    }

    /// Capture date every file name is stamped with.
    #[must_use]
    pub const fn capture_date(&self) -> NaiveDate {
        self.capture_date
    }

    /// Resolved directory, if any.
    #[must_use]
    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    /// Path of the file holding `name` with `extension`.
    #[must_use]
    pub fn file_path(&self, name: &str, extension: &str) -> PathBuf {
        let file_name = format!(
            "{}.{name}.{extension}",
            self.capture_date.format("%Y%m%d")
        );
        match &self.directory {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}
