//! Placeholder Substitution Engine.

use crate::model::{ParagraphText, TokenKind, paragraphs};
use crate::xml::XmlTree;
use serde::Serialize;

/// What to put in place of one placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    Text(String),
    /// Not a known field; replaced by nothing.
    Unmapped,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubstitutionReport {
    pub found: usize,
    pub substituted: usize,
    /// Unknown placeholder names, one entry per occurrence
    pub unmapped: Vec<String>,
}

impl SubstitutionReport {
    pub fn merge(&mut self, other: SubstitutionReport) {
        self.found += other.found;
        self.substituted += other.substituted;
        self.unmapped.extend(other.unmapped);
    }
}

/// Replace every placeholder of the part. Section markers are left alone.
///
/// Tokens are replaced back to front within a paragraph so the offsets of
/// the ones still pending stay valid.
pub fn substitute(tree: &mut XmlTree, resolve: &mut dyn FnMut(&str) -> Replacement) -> SubstitutionReport {
    let mut report = SubstitutionReport::default();
    for paragraph in paragraphs(tree) {
        let tokens = ParagraphText::read(tree, paragraph).tokens();
        let mut unmapped = Vec::new();
        for token in tokens.iter().rev().filter(|t| t.kind == TokenKind::Placeholder) {
            report.found += 1;
            let text = match resolve(&token.name) {
                Replacement::Text(text) => {
                    report.substituted += 1;
                    text
                }
                Replacement::Unmapped => {
                    unmapped.push(token.name.clone());
                    String::new()
                }
            };
            ParagraphText::read(tree, paragraph).replace(tree, token.start, token.end, &text);
        }
        report.unmapped.extend(unmapped.into_iter().rev());
    }
    report
}
