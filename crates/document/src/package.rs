//! Template package I/O (the zip container of a `.docx`).

use peticiona_core::TemplateError;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const MAIN_PART: &str = "word/document.xml";

/// Parts whose text is processed: the main body, headers and footers.
pub fn is_content_part(name: &str) -> bool {
    name == MAIN_PART
        || ["word/header", "word/footer"]
            .iter()
            .any(|prefix| name.starts_with(prefix) && name.ends_with(".xml") && !name[prefix.len()..].contains('/'))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
}

/// Every entry of the package in archive order.
#[derive(Debug, Clone)]
pub struct Package {
    entries: Vec<PackageEntry>,
}

impl Package {
    pub fn open(path: &Path) -> Result<Self, TemplateError> {
        if !path.is_file() {
            return Err(TemplateError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|e| TemplateError::InvalidPackage(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(invalid)?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).map_err(invalid)?;
            let name = file.name().to_string();
            let is_dir = file.is_dir();
            let mut data = Vec::new();
            if !is_dir {
                file.read_to_end(&mut data).map_err(invalid)?;
            }
            entries.push(PackageEntry { name, data, is_dir });
        }
        let package = Self { entries };
        if package.get(MAIN_PART).is_none() {
            return Err(TemplateError::InvalidPackage(format!("missing {MAIN_PART}")));
        }
        Ok(package)
    }

    /// Build a package from in-memory files.
    pub fn from_files<N, D>(files: impl IntoIterator<Item = (N, D)>) -> Self
    where
        N: Into<String>,
        D: Into<Vec<u8>>,
    {
        Self {
            entries: files
                .into_iter()
                .map(|(name, data)| PackageEntry {
                    name: name.into(),
                    data: data.into(),
                    is_dir: false,
                })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| e.name == name && !e.is_dir)
            .map(|e| e.data.as_slice())
    }

    /// Content part names, main part first.
    pub fn content_parts(&self) -> Vec<&str> {
        let mut parts: Vec<&str> = self
            .entries
            .iter()
            .filter(|e| !e.is_dir && is_content_part(&e.name))
            .map(|e| e.name.as_str())
            .collect();
        parts.sort_by_key(|name| *name != MAIN_PART);
        parts
    }

    /// Write the package, taking each entry's data from `replace` when it
    /// has an override and copying it unchanged otherwise.
    pub fn to_bytes_with(&self, replace: &dyn Fn(&str) -> Option<Vec<u8>>) -> Result<Vec<u8>, TemplateError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for entry in &self.entries {
            if entry.is_dir {
                zip.add_directory(entry.name.as_str(), options).map_err(write_failed)?;
                continue;
            }
            zip.start_file(entry.name.as_str(), options).map_err(write_failed)?;
            let written = match replace(&entry.name) {
                Some(data) => zip.write_all(&data),
                None => zip.write_all(&entry.data),
            };
            written.map_err(write_failed)?;
        }
        let finished = zip.finish().map_err(write_failed)?;
        Ok(finished.into_inner())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TemplateError> {
        self.to_bytes_with(&|_| None)
    }
}

fn invalid(e: impl std::fmt::Display) -> TemplateError {
    TemplateError::InvalidPackage(e.to_string())
}

fn write_failed(e: impl std::fmt::Display) -> TemplateError {
    TemplateError::InvalidPackage(format!("cannot write package: {e}"))
}
