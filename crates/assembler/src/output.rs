//! Where each record's document is written.

use std::path::{Path, PathBuf};

pub const OUTPUT_EXTENSION: &str = "docx";

/// Output naming. With more than one record every file gets a 1-based
/// `_<n>` suffix taken from the record's position in the data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Explicit file path; its stem names every output.
    File(PathBuf),
    /// Directory plus a stem derived from the template name.
    Directory { dir: PathBuf, stem: String },
}

impl OutputPolicy {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        OutputPolicy::File(path.into())
    }

    /// `<dir>/<template stem><suffix>.docx`
    pub fn directory(dir: impl Into<PathBuf>, template: &Path, suffix: &str) -> Self {
        let stem = template
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "documento".into());
        OutputPolicy::Directory {
            dir: dir.into(),
            stem: format!("{stem}{suffix}"),
        }
    }

    /// Pick the policy for a user-supplied output: an existing directory or
    /// a path without extension means directory mode.
    pub fn infer(output: &Path, template: &Path, suffix: &str) -> Self {
        if output.is_dir() || output.extension().is_none() {
            Self::directory(output, template, suffix)
        } else {
            Self::file(output)
        }
    }

    fn dir_and_stem(&self) -> (PathBuf, String) {
        match self {
            OutputPolicy::File(path) => {
                let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "documento".into());
                (dir, stem)
            }
            OutputPolicy::Directory { dir, stem } => (dir.clone(), stem.clone()),
        }
    }

    /// Directory that must exist before writing.
    pub fn target_dir(&self) -> PathBuf {
        self.dir_and_stem().0
    }

    /// Output path of the record at zero-based `index` in a batch of `total`.
    pub fn path_for(&self, index: usize, total: usize) -> PathBuf {
        let (dir, stem) = self.dir_and_stem();
        let name = if total > 1 {
            format!("{stem}_{}.{OUTPUT_EXTENSION}", index + 1)
        } else {
            format!("{stem}.{OUTPUT_EXTENSION}")
        };
        dir.join(name)
    }
}
