//! Read-only template report: placeholders, section tree, marker problems.

use crate::Template;
use crate::model::{TokenKind, scan_tokens};
use crate::sections::scan_sections;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceholderInfo {
    pub name: String,
    pub occurrences: usize,
    /// Occurrences whose text spans more than one run
    pub split_occurrences: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionInfo {
    pub id: String,
    pub depth: usize,
    pub parent: Option<String>,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartInspection {
    pub part: String,
    pub placeholders: Vec<PlaceholderInfo>,
    pub sections: Vec<SectionInfo>,
    pub marker_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateInspection {
    pub parts: Vec<PartInspection>,
}

impl TemplateInspection {
    pub fn placeholder_names(&self) -> BTreeSet<&str> {
        self.parts
            .iter()
            .flat_map(|p| p.placeholders.iter().map(|ph| ph.name.as_str()))
            .collect()
    }

    pub fn section_ids(&self) -> BTreeSet<&str> {
        self.parts
            .iter()
            .flat_map(|p| p.sections.iter().map(|s| s.id.as_str()))
            .collect()
    }

    /// Placeholder names for which `is_known` says no.
    pub fn unknown_placeholders(&self, is_known: impl Fn(&str) -> bool) -> Vec<&str> {
        self.placeholder_names()
            .into_iter()
            .filter(|name| !is_known(name))
            .collect()
    }

    pub fn has_marker_errors(&self) -> bool {
        self.parts.iter().any(|p| p.marker_error.is_some())
    }
}

pub fn inspect(template: &Template) -> TemplateInspection {
    let parts = template
        .parts()
        .iter()
        .map(|part| {
            let mut placeholders: BTreeMap<String, PlaceholderInfo> = BTreeMap::new();
            for (_, token) in scan_tokens(&part.tree) {
                if token.kind != TokenKind::Placeholder {
                    continue;
                }
                let info = placeholders.entry(token.name.clone()).or_insert_with(|| PlaceholderInfo {
                    name: token.name.clone(),
                    occurrences: 0,
                    split_occurrences: 0,
                });
                info.occurrences += 1;
                if token.is_split() {
                    info.split_occurrences += 1;
                }
            }

            let (sections, marker_error) = match scan_sections(&part.tree, &part.name) {
                Ok(spans) => {
                    let sections = spans
                        .iter()
                        .map(|span| SectionInfo {
                            id: span.id.clone(),
                            depth: span.depth,
                            parent: span.parent.map(|p| spans[p].id.clone()),
                            inline: span.is_inline(),
                        })
                        .collect();
                    (sections, None)
                }
                Err(e) => (Vec::new(), Some(e.to_string())),
            };

            PartInspection {
                part: part.name.clone(),
                placeholders: placeholders.into_values().collect(),
                sections,
                marker_error,
            }
        })
        .collect();
    TemplateInspection { parts }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Package;
    use crate::model::tests::{para, part};
    use pretty_assertions::assert_eq;

    fn template(body: &str, header: Option<&str>) -> Template {
        let mut files = vec![("word/document.xml".to_string(), part(body))];
        if let Some(h) = header {
            files.push(("word/header1.xml".to_string(), part(h)));
        }
        Template::from_package(Package::from_files(files)).unwrap()
    }

    #[test]
    fn reports_placeholders_and_section_tree() {
        let body = [
            para(&["{{nome", "_autor}} {{cpf}}"]),
            para(&["{{#A}}"]),
            para(&["{{#B}}{{nome_autor}}{{/B}}"]),
            para(&["{{/A}}"]),
        ]
        .concat();
        let report = inspect(&template(&body, Some(&para(&["{{comarca}}"]))));
        assert_eq!(report.parts.len(), 2);

        let main = &report.parts[0];
        assert_eq!(main.part, "word/document.xml");
        assert_eq!(
            main.placeholders,
            vec![
                PlaceholderInfo { name: "cpf".into(), occurrences: 1, split_occurrences: 0 },
                PlaceholderInfo { name: "nome_autor".into(), occurrences: 2, split_occurrences: 1 },
            ]
        );
        assert_eq!(
            main.sections,
            vec![
                SectionInfo { id: "A".into(), depth: 0, parent: None, inline: false },
                SectionInfo { id: "B".into(), depth: 1, parent: Some("A".into()), inline: true },
            ]
        );
        assert!(!report.has_marker_errors());
        assert_eq!(
            report.placeholder_names().into_iter().collect::<Vec<_>>(),
            vec!["comarca", "cpf", "nome_autor"]
        );
        assert_eq!(report.unknown_placeholders(|n| n != "cpf"), vec!["cpf"]);
    }

    #[test]
    fn marker_problems_are_reported_not_fatal() {
        let report = inspect(&template(&para(&["{{/A}} {{x}}"]), None));
        assert!(report.has_marker_errors());
        assert_eq!(report.parts[0].placeholders.len(), 1);
        assert!(report.section_ids().is_empty());
    }
}
