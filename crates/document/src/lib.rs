//! Template Document Model for word-processing packages.
//!
//! ```text
//!   .docx ──► Package ──► Template (parsed once, immutable)
//!                             │ instantiate() per record
//!                             ▼
//!                          Document ── apply_sections() ── substitute() ──► .docx
//! ```
//!
//! Only `word/document.xml` and the header/footer parts are parsed; every
//! other package entry is copied through unchanged.

pub mod inspect;
pub mod model;
pub mod package;
pub mod sections;
pub mod substitute;
pub mod xml;

pub use inspect::{TemplateInspection, inspect};
pub use model::{Token, TokenKind};
pub use package::Package;
pub use sections::SectionEdit;
pub use substitute::{Replacement, SubstitutionReport};
pub use xml::XmlTree;

use peticiona_core::TemplateError;
use std::path::Path;
use tracing::debug;

/// One parsed content part.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub tree: XmlTree,
}

/// A placeholder occurrence found in the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderToken {
    pub part: String,
    pub name: String,
    pub split: bool,
}

/// A parsed template. Never modified; each record works on a copy.
#[derive(Debug, Clone)]
pub struct Template {
    package: Package,
    parts: Vec<Part>,
}

impl Template {
    pub fn open(path: &Path) -> Result<Self, TemplateError> {
        Self::from_package(Package::open(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TemplateError> {
        Self::from_package(Package::from_bytes(bytes)?)
    }

    pub fn from_package(package: Package) -> Result<Self, TemplateError> {
        let mut parts = Vec::new();
        for name in package.content_parts() {
            let data = package.get(name).unwrap_or_default();
            let malformed = |reason: String| TemplateError::MalformedXml {
                part: name.to_string(),
                reason,
            };
            let text = std::str::from_utf8(data).map_err(|e| malformed(e.to_string()))?;
            let text = text.strip_prefix('\u{feff}').unwrap_or(text);
            let tree = XmlTree::parse(text).map_err(malformed)?;
            parts.push(Part {
                name: name.to_string(),
                tree,
            });
        }
        if parts.is_empty() {
            return Err(TemplateError::InvalidPackage(format!("missing {}", package::MAIN_PART)));
        }
        debug!(parts = parts.len(), "Template parsed");
        Ok(Self { package, parts })
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    /// Every placeholder occurrence, in part and document order.
    pub fn placeholders(&self) -> Vec<PlaceholderToken> {
        self.parts
            .iter()
            .flat_map(|part| {
                model::scan_tokens(&part.tree)
                    .into_iter()
                    .filter(|(_, t)| t.kind == TokenKind::Placeholder)
                    .map(|(_, t)| PlaceholderToken {
                        part: part.name.clone(),
                        split: t.is_split(),
                        name: t.name,
                    })
            })
            .collect()
    }

    /// Section ids per part, failing on the first unbalanced marker.
    pub fn sections(&self) -> Result<Vec<String>, TemplateError> {
        let mut ids = Vec::new();
        for part in &self.parts {
            ids.extend(sections::scan_sections(&part.tree, &part.name)?.into_iter().map(|s| s.id));
        }
        Ok(ids)
    }

    /// A fresh editable copy of the parsed parts.
    pub fn instantiate(&self) -> Document<'_> {
        Document {
            template: self,
            parts: self.parts.clone(),
        }
    }
}

/// One record's working copy of a template.
#[derive(Debug, Clone)]
pub struct Document<'t> {
    template: &'t Template,
    parts: Vec<Part>,
}

impl Document<'_> {
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Run the section editor over every part.
    pub fn apply_sections(&mut self, is_active: &dyn Fn(&str) -> bool) -> Result<SectionEdit, TemplateError> {
        let mut total = SectionEdit::default();
        for part in &mut self.parts {
            let edit = sections::apply_sections(&mut part.tree, &part.name, is_active)?;
            total.found.extend(edit.found);
            total.kept.extend(edit.kept);
            total.removed.extend(edit.removed);
        }
        Ok(total)
    }

    /// Substitute placeholders in every part.
    pub fn substitute(&mut self, resolve: &mut dyn FnMut(&str) -> Replacement) -> SubstitutionReport {
        let mut total = SubstitutionReport::default();
        for part in &mut self.parts {
            total.merge(substitute::substitute(&mut part.tree, resolve));
        }
        total
    }

    /// Visible text of every paragraph, part by part.
    pub fn paragraph_texts(&self) -> Vec<String> {
        self.parts
            .iter()
            .flat_map(|part| {
                model::paragraphs(&part.tree)
                    .into_iter()
                    .map(|p| model::ParagraphText::read(&part.tree, p).text)
            })
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TemplateError> {
        self.template.package.to_bytes_with(&|name| {
            self.parts
                .iter()
                .find(|p| p.name == name)
                .map(|p| p.tree.serialize().into_bytes())
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), TemplateError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| TemplateError::Output {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
