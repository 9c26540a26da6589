//! Word-processing view over an [`XmlTree`]: paragraphs, their text runs,
//! and the `{{...}}` tokens found in them.
//!
//! A paragraph's visible text is the concatenation of its `w:t` elements.
//! Editors split runs at arbitrary points, so one token may start in one
//! `w:t` and end several runs later:
//!
//! ```text
//!  w:t[0] "Autor: {{nome"   w:t[1] "_au"   w:t[2] "tor}}, CPF"
//!         ^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^^
//!         one placeholder token, segments 0..=2
//! ```

use crate::xml::{NodeId, XmlTree};
use regex_lite::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub const PARAGRAPH: &str = "w:p";
pub const TEXT: &str = "w:t";
pub const TABLE: &str = "w:tbl";
pub const ROW: &str = "w:tr";
pub const CELL: &str = "w:tc";

/// Non-text run content that keeps an otherwise blank paragraph alive.
const VISIBLE_CONTENT: [&str; 3] = ["w:drawing", "w:pict", "w:object"];

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([#/]?)([A-Za-z0-9_]+)\s*\}\}").expect("valid token pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Placeholder,
    SectionOpen,
    SectionClose,
}

/// One `{{...}}` occurrence inside a paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub name: String,
    /// Byte range in the paragraph text
    pub start: usize,
    pub end: usize,
    /// Covering `w:t` segments, inclusive
    pub first_segment: usize,
    pub last_segment: usize,
}

impl Token {
    /// True when the token text is spread over more than one run.
    pub fn is_split(&self) -> bool {
        self.first_segment != self.last_segment
    }

    pub fn is_marker(&self) -> bool {
        self.kind != TokenKind::Placeholder
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub node: NodeId,
    pub start: usize,
    pub text: String,
}

impl Segment {
    fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// Snapshot of one paragraph's text. Stale after any edit to it.
#[derive(Debug, Clone)]
pub struct ParagraphText {
    pub paragraph: NodeId,
    pub segments: Vec<Segment>,
    pub text: String,
}

impl ParagraphText {
    pub fn read(tree: &XmlTree, paragraph: NodeId) -> Self {
        let mut nodes = Vec::new();
        collect_text_nodes(tree, paragraph, &mut nodes);

        let mut text = String::new();
        let segments = nodes
            .into_iter()
            .map(|node| {
                let content = tree.text(node);
                let start = text.len();
                text.push_str(&content);
                Segment {
                    node,
                    start,
                    text: content,
                }
            })
            .collect();
        Self {
            paragraph,
            segments,
            text,
        }
    }

    pub fn tokens(&self) -> Vec<Token> {
        TOKEN_RE
            .captures_iter(&self.text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let kind = match caps.get(1).map(|m| m.as_str()) {
                    Some("#") => TokenKind::SectionOpen,
                    Some("/") => TokenKind::SectionClose,
                    _ => TokenKind::Placeholder,
                };
                let name = caps.get(2)?.as_str().to_string();
                let first_segment = self.segment_at(whole.start())?;
                let last_segment = self.segment_at(whole.end() - 1)?;
                Some(Token {
                    kind,
                    name,
                    start: whole.start(),
                    end: whole.end(),
                    first_segment,
                    last_segment,
                })
            })
            .collect()
    }

    fn segment_at(&self, offset: usize) -> Option<usize> {
        self.segments
            .iter()
            .position(|s| s.start <= offset && offset < s.end())
    }

    /// Replace `start..end` of the paragraph text. The first touched run
    /// receives the replacement, runs fully inside the range are emptied,
    /// and the last one keeps its tail. Run properties are never touched.
    pub fn replace(&self, tree: &mut XmlTree, start: usize, end: usize, replacement: &str) {
        let touched: Vec<&Segment> = self
            .segments
            .iter()
            .filter(|s| s.start < end && s.end() > start)
            .collect();
        let Some(first) = touched.first().map(|s| s.node) else {
            return;
        };
        let last = touched.last().map_or(first, |s| s.node);

        for segment in touched {
            let local_start = start.saturating_sub(segment.start);
            let local_end = (end - segment.start).min(segment.text.len());
            let head = segment.text.get(..local_start).unwrap_or_default();
            let tail = segment.text.get(local_end..).unwrap_or_default();
            let new_text = match (segment.node == first, segment.node == last) {
                (true, true) => format!("{head}{replacement}{tail}"),
                (true, false) => format!("{head}{replacement}"),
                (false, true) => tail.to_string(),
                (false, false) => String::new(),
            };
            tree.set_text(segment.node, &new_text);
            tree.set_attr(segment.node, "xml:space", "preserve");
        }
    }

    /// No visible text and nothing drawn.
    pub fn is_blank(&self, tree: &XmlTree) -> bool {
        self.text.trim().is_empty() && !tree.has_descendant(self.paragraph, &VISIBLE_CONTENT)
    }
}

/// `w:t` elements owned by `paragraph`, skipping paragraphs nested in
/// text boxes (those are paragraphs of their own).
fn collect_text_nodes(tree: &XmlTree, node: NodeId, out: &mut Vec<NodeId>) {
    for &child in tree.children(node) {
        match tree.name(child) {
            Some(TEXT) => out.push(child),
            Some(PARAGRAPH) | None => {}
            Some(_) => collect_text_nodes(tree, child, out),
        }
    }
}

/// Every paragraph of a part in document order, nested ones included.
pub fn paragraphs(tree: &XmlTree) -> Vec<NodeId> {
    tree.find_all(XmlTree::ROOT, PARAGRAPH)
}

/// All tokens of a part, paired with their paragraph.
pub fn scan_tokens(tree: &XmlTree) -> Vec<(NodeId, Token)> {
    paragraphs(tree)
        .into_iter()
        .flat_map(|p| {
            ParagraphText::read(tree, p)
                .tokens()
                .into_iter()
                .map(move |t| (p, t))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

    /// A document part whose body is `body`.
    pub(crate) fn part(body: &str) -> String {
        format!(r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="{W_NS}"><w:body>{body}</w:body></w:document>"#)
    }

    /// A paragraph with one run per piece of text.
    pub(crate) fn para(runs: &[&str]) -> String {
        let runs: String = runs
            .iter()
            .map(|t| format!(r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{t}</w:t></w:r>"#))
            .collect();
        format!("<w:p>{runs}</w:p>")
    }

    pub(crate) fn texts(tree: &XmlTree) -> Vec<String> {
        paragraphs(tree)
            .into_iter()
            .map(|p| ParagraphText::read(tree, p).text)
            .collect()
    }

    #[test]
    fn finds_tokens_across_runs() {
        let tree = XmlTree::parse(&part(&para(&["Autor: {{nome", "_au", "tor}}, {{#DANOS}}x{{ /DANOS }}"]))).unwrap();
        let p = paragraphs(&tree)[0];
        let text = ParagraphText::read(&tree, p);
        assert_eq!(text.text, "Autor: {{nome_autor}}, {{#DANOS}}x{{ /DANOS }}");

        let tokens = text.tokens();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].kind, TokenKind::Placeholder);
        assert_eq!(tokens[0].name, "nome_autor");
        assert_eq!((tokens[0].first_segment, tokens[0].last_segment), (0, 2));
        assert!(tokens[0].is_split());
        assert_eq!(tokens[1].kind, TokenKind::SectionOpen);
        assert!(!tokens[1].is_split());
        assert_eq!(tokens[2].kind, TokenKind::SectionClose);
        assert_eq!(tokens[2].name, "DANOS");
    }

    #[test]
    fn ignores_text_that_is_not_a_token() {
        let tree = XmlTree::parse(&part(&para(&["{ {a}} {{a-b}} {{}} {{#}}"]))).unwrap();
        assert!(ParagraphText::read(&tree, paragraphs(&tree)[0]).tokens().is_empty());
    }

    #[test]
    fn replace_keeps_run_formatting_and_tails() {
        let mut tree = XmlTree::parse(&part(&para(&["Autor: {{nome", "_au", "tor}}, CPF"]))).unwrap();
        let p = paragraphs(&tree)[0];
        let text = ParagraphText::read(&tree, p);
        let token = text.tokens().remove(0);
        text.replace(&mut tree, token.start, token.end, "Maria");

        let after = ParagraphText::read(&tree, p);
        assert_eq!(after.text, "Autor: Maria, CPF");
        let pieces: Vec<&str> = after.segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(pieces, vec!["Autor: Maria", "", ", CPF"]);
        assert_eq!(tree.find_all(p, "w:b").len(), 3);
    }

    #[test]
    fn replace_within_one_run() {
        let mut tree = XmlTree::parse(&part(&para(&["a {{x}} b"]))).unwrap();
        let p = paragraphs(&tree)[0];
        let text = ParagraphText::read(&tree, p);
        let token = text.tokens().remove(0);
        text.replace(&mut tree, token.start, token.end, "<1 & 2>");
        assert_eq!(texts(&tree), vec!["a <1 & 2> b"]);
        assert!(tree.serialize().contains("a &lt;1 &amp; 2&gt; b"));
    }

    #[test]
    fn text_box_paragraphs_are_separate() {
        let nested = format!(
            "<w:p><w:r><w:t>outer {{{{a}}}}</w:t></w:r><w:r><w:pict><w:txbxContent>{}</w:txbxContent></w:pict></w:r></w:p>",
            para(&["inner {{b}}"])
        );
        let tree = XmlTree::parse(&part(&nested)).unwrap();
        assert_eq!(texts(&tree), vec!["outer {{a}}", "inner {{b}}"]);
        let names: Vec<String> = scan_tokens(&tree).into_iter().map(|(_, t)| t.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn blank_detection() {
        let tree = XmlTree::parse(&part(&format!(
            "{}{}<w:p><w:r><w:drawing/></w:r></w:p>",
            para(&["  "]),
            para(&["x"])
        )))
        .unwrap();
        let blanks: Vec<bool> = paragraphs(&tree)
            .into_iter()
            .map(|p| ParagraphText::read(&tree, p).is_blank(&tree))
            .collect();
        assert_eq!(blanks, vec![true, false, false]);
    }
}
