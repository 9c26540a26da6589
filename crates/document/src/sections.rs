//! Section Structural Editor.
//!
//! Sections are delimited by `{{#ID}}` and `{{/ID}}` markers and may nest.
//! The scanner walks every paragraph of a part in document order with a
//! stack of open ids; any imbalance is fatal for the template:
//!
//! ```text
//!  {{#A}}  {{#B}}  {{/B}}  {{/A}}     ok, B nested in A
//!  {{#A}}  {{#B}}  {{/A}}             B still open when A closes
//!  {{#A}}  {{#A}}                     A reopened while open
//!  {{/A}}                             close without open
//!  {{#A}}  <end of part>              never closed
//! ```
//!
//! Editing then removes every inactive section whose ancestors are all
//! active (inner sections go with it) and strips the markers of active
//! ones. A part without markers is left untouched, which makes the edit
//! idempotent.

use crate::model::{CELL, PARAGRAPH, ParagraphText, ROW, TABLE, TokenKind, paragraphs};
use crate::xml::{NodeId, XmlTree};
use peticiona_core::TemplateError;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Position of one marker token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerPos {
    pub paragraph: NodeId,
    pub start: usize,
    pub end: usize,
}

/// A matched open/close marker pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub id: String,
    pub open: MarkerPos,
    pub close: MarkerPos,
    /// Index of the enclosing span, which always precedes this one
    pub parent: Option<usize>,
    pub depth: usize,
}

impl SectionSpan {
    /// Open and close markers share a paragraph.
    pub fn is_inline(&self) -> bool {
        self.open.paragraph == self.close.paragraph
    }
}

/// What one editing pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionEdit {
    /// Every section found, in document order
    pub found: Vec<String>,
    pub kept: Vec<String>,
    /// Sections removed, including those inside a removed section
    pub removed: Vec<String>,
}

/// Match markers of one part into spans, in order of their open marker.
pub fn scan_sections(tree: &XmlTree, part: &str) -> Result<Vec<SectionSpan>, TemplateError> {
    let unresolved = |marker: &str, reason: String| TemplateError::UnresolvedSectionMarker {
        part: part.to_string(),
        marker: marker.to_string(),
        reason,
    };

    let mut spans: Vec<SectionSpan> = Vec::new();
    let mut open: Vec<usize> = Vec::new();
    for paragraph in paragraphs(tree) {
        for token in ParagraphText::read(tree, paragraph).tokens() {
            let pos = MarkerPos {
                paragraph,
                start: token.start,
                end: token.end,
            };
            match token.kind {
                TokenKind::Placeholder => {}
                TokenKind::SectionOpen => {
                    if open.iter().any(|&i| spans[i].id == token.name) {
                        return Err(unresolved(
                            &format!("{{{{#{}}}}}", token.name),
                            "section reopened while still open".into(),
                        ));
                    }
                    spans.push(SectionSpan {
                        id: token.name,
                        open: pos,
                        close: pos,
                        parent: open.last().copied(),
                        depth: open.len(),
                    });
                    open.push(spans.len() - 1);
                }
                TokenKind::SectionClose => {
                    let marker = format!("{{{{/{}}}}}", token.name);
                    match open.last() {
                        Some(&top) if spans[top].id == token.name => {
                            spans[top].close = pos;
                            open.pop();
                        }
                        Some(&top) if open.iter().any(|&i| spans[i].id == token.name) => {
                            return Err(unresolved(
                                &marker,
                                format!("section '{}' must close first", spans[top].id),
                            ));
                        }
                        _ => return Err(unresolved(&marker, "no matching open marker".into())),
                    }
                }
            }
        }
    }
    if let Some(&unclosed) = open.first() {
        let id = &spans[unclosed].id;
        return Err(unresolved(&format!("{{{{#{id}}}}}"), "never closed".into()));
    }
    Ok(spans)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fate {
    Keep,
    Remove,
    /// Inside a removed section
    Gone,
}

/// Remove inactive sections and strip the markers of active ones.
pub fn apply_sections(
    tree: &mut XmlTree,
    part: &str,
    is_active: &dyn Fn(&str) -> bool,
) -> Result<SectionEdit, TemplateError> {
    let spans = scan_sections(tree, part)?;
    let mut edit = SectionEdit::default();
    if spans.is_empty() {
        return Ok(edit);
    }

    let mut fates = Vec::with_capacity(spans.len());
    for span in &spans {
        let fate = match span.parent.map(|p| fates[p]) {
            Some(Fate::Remove | Fate::Gone) => Fate::Gone,
            _ if is_active(&span.id) => Fate::Keep,
            _ => Fate::Remove,
        };
        fates.push(fate);
        edit.found.push(span.id.clone());
        match fate {
            Fate::Keep => edit.kept.push(span.id.clone()),
            Fate::Remove | Fate::Gone => edit.removed.push(span.id.clone()),
        }
    }

    let mut text_cuts: BTreeMap<NodeId, Vec<(usize, usize)>> = BTreeMap::new();
    let mut marker_paragraphs = Vec::new();
    let mut doomed = Vec::new();
    for (span, fate) in spans.iter().zip(&fates) {
        match fate {
            Fate::Keep => {
                for pos in [span.open, span.close] {
                    text_cuts.entry(pos.paragraph).or_default().push((pos.start, pos.end));
                    marker_paragraphs.push(pos.paragraph);
                }
            }
            Fate::Remove if span.is_inline() => {
                text_cuts
                    .entry(span.open.paragraph)
                    .or_default()
                    .push((span.open.start, span.close.end));
                marker_paragraphs.push(span.open.paragraph);
            }
            Fate::Remove => {
                // Ranges come from the unedited tree: neighbouring sections
                // may share the paragraph holding their markers.
                doomed.extend(block_range(tree, span.open.paragraph, span.close.paragraph));
                debug!(part, section = %span.id, "Removing section");
            }
            Fate::Gone => {}
        }
    }

    for (paragraph, mut cuts) in text_cuts {
        cuts.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        for (start, end) in cuts {
            ParagraphText::read(tree, paragraph).replace(tree, start, end, "");
        }
    }

    for node in doomed {
        if tree.is_attached(node) {
            tree.detach(node);
        }
    }

    marker_paragraphs.sort_unstable();
    marker_paragraphs.dedup();
    for paragraph in marker_paragraphs {
        if tree.is_attached(paragraph)
            && ParagraphText::read(tree, paragraph).is_blank(tree)
            && !is_last_paragraph_of_cell(tree, paragraph)
        {
            tree.detach(paragraph);
        }
    }

    repair_tables(tree);
    Ok(edit)
}

/// Nodes covered by a section, from the paragraph holding the open marker
/// through the one holding the close marker, at the level of their lowest
/// common ancestor. A table holding only one of the markers loses just the
/// rows on the section's side of that marker.
fn block_range(tree: &XmlTree, first: NodeId, last: NodeId) -> Vec<NodeId> {
    let a = tree.path_from_root(first);
    let b = tree.path_from_root(last);
    let shared = a.iter().zip(&b).take_while(|(x, y)| x == y).count();

    // One marker paragraph contains the other (text boxes).
    if shared == a.len() || shared == b.len() {
        return vec![if shared == a.len() { first } else { last }];
    }

    let lca = a[shared - 1];
    if tree.is(lca, ROW) {
        return vec![lca];
    }
    let siblings = tree.children(lca);
    let (Some(from), Some(to)) = (
        siblings.iter().position(|&c| c == a[shared]),
        siblings.iter().position(|&c| c == b[shared]),
    ) else {
        return Vec::new();
    };
    let (from, to) = (from.min(to), from.max(to));

    let mut nodes = edge_block(tree, &a[shared..], true);
    nodes.extend_from_slice(&siblings[from + 1..to]);
    nodes.extend(edge_block(tree, &b[shared..], false));
    nodes
}

/// The part of an end block that lies inside the section. `path` runs from
/// the block down to the marker paragraph.
fn edge_block(tree: &XmlTree, path: &[NodeId], opens_section: bool) -> Vec<NodeId> {
    let block = path[0];
    match path.get(1) {
        Some(&row) if tree.is(block, TABLE) && tree.is(row, ROW) => {
            let rows: Vec<NodeId> = tree.children_named(block, ROW).collect();
            match rows.iter().position(|&r| r == row) {
                Some(at) if opens_section => rows[at..].to_vec(),
                Some(at) => rows[..=at].to_vec(),
                None => vec![block],
            }
        }
        _ => vec![block],
    }
}

fn is_last_paragraph_of_cell(tree: &XmlTree, paragraph: NodeId) -> bool {
    match tree.parent(paragraph) {
        Some(cell) if tree.is(cell, CELL) => tree.children_named(cell, PARAGRAPH).last() == Some(paragraph),
        _ => false,
    }
}

/// Drop tables left without rows and give emptied cells a paragraph.
fn repair_tables(tree: &mut XmlTree) {
    for table in tree.find_all(XmlTree::ROOT, TABLE).into_iter().rev() {
        if tree.children_named(table, ROW).next().is_none() {
            tree.detach(table);
        }
    }
    for cell in tree.find_all(XmlTree::ROOT, CELL) {
        let has_block = tree
            .children(cell)
            .iter()
            .any(|&c| tree.is(c, PARAGRAPH) || tree.is(c, TABLE));
        if !has_block {
            tree.append_element(cell, PARAGRAPH);
        }
    }
}
