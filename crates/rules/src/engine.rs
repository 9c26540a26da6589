//! Section activation engine.
//!
//! The engine is compiled once from a [`Schema`] and then evaluated per
//! record. Evaluation is a pure function of the record: no state is kept
//! between calls, so records can be processed in any order or in parallel.
//!
//! ```text
//!   Record ──► defaults ──► derived fields (topological order)
//!                                   │
//!                                   ▼
//!              activation rules ──► active sections ──► required fields
//!              visibility rules ──► hidden fields
//!              validators       ──► InvalidValue diagnostics
//! ```

use crate::condition::{Condition, parse_condition};
use crate::formula::{Formula, parse_formula};
use crate::validate::FieldValidator;
use peticiona_config::SchemaConfig;
use peticiona_core::{Diagnostic, FieldLookup, FieldValue, Record, SchemaLoadError};
use peticiona_schema::Schema;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Where a non-raw value of a resolved record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueOrigin {
    Default,
    Derived,
}

/// A record plus its defaulted and derived values.
///
/// Lookup order: the record's own non-blank value, then the filled-in one.
#[derive(Debug, Clone)]
pub struct ResolvedRecord {
    base: Record,
    filled: HashMap<String, (FieldValue, ValueOrigin)>,
}

impl ResolvedRecord {
    fn new(base: Record) -> Self {
        Self {
            base,
            filled: HashMap::new(),
        }
    }

    pub fn base(&self) -> &Record {
        &self.base
    }

    /// Origin of a value that did not come from the record itself.
    pub fn origin(&self, name: &str) -> Option<ValueOrigin> {
        if self.base.has_value(name) {
            return None;
        }
        self.filled.get(name).map(|(_, origin)| *origin)
    }

    fn fill(&mut self, name: &str, value: FieldValue, origin: ValueOrigin) {
        self.filled.insert(name.to_string(), (value, origin));
    }
}

impl FieldLookup for ResolvedRecord {
    fn lookup(&self, name: &str) -> Option<&FieldValue> {
        match self.base.get(name) {
            Some(value) if !value.is_blank() => Some(value),
            raw => self.filled.get(name).map(|(v, _)| v).or(raw),
        }
    }
}

/// The outcome of evaluating all rules against one record.
#[derive(Debug, Clone)]
pub struct Activation {
    pub active_sections: BTreeSet<String>,
    /// Sections with a rule that evaluated false or failed
    pub inactive_sections: BTreeSet<String>,
    pub required_fields: BTreeSet<String>,
    /// Required fields with no value after resolution
    pub missing_required: BTreeSet<String>,
    pub hidden_fields: BTreeSet<String>,
    pub resolved: ResolvedRecord,
    pub diagnostics: Vec<Diagnostic>,
}

impl Activation {
    pub fn is_active(&self, section: &str) -> bool {
        self.active_sections.contains(section)
    }

    pub fn is_required(&self, field: &str) -> bool {
        self.required_fields.contains(field)
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    section_id: String,
    condition: Condition,
    required_fields: Vec<String>,
}

#[derive(Debug, Clone)]
struct DerivedField {
    name: String,
    formula: Formula,
    calc_when: Option<Condition>,
}

/// Compiled rule set. Immutable and shareable across threads.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<CompiledRule>,
    derived: Vec<DerivedField>,
    defaults: Vec<(String, String, bool)>,
    visibility: Vec<(String, Condition)>,
    validators: Vec<FieldValidator>,
    /// Flagged-required fields that no rule governs
    base_required: Vec<String>,
}

impl RuleEngine {
    /// Load the schema (with legacy fallback) and compile it. A schema whose
    /// expressions do not compile counts as unusable and triggers the fallback.
    pub fn load(config: &SchemaConfig) -> Result<(Schema, RuleEngine), SchemaLoadError> {
        Schema::load_with(config, |schema| {
            let engine = RuleEngine::new(&schema)?;
            Ok((schema, engine))
        })
    }

    /// Compile every condition, formula and pattern in the schema.
    pub fn new(schema: &Schema) -> Result<Self, SchemaLoadError> {
        let rules = schema
            .rules()
            .iter()
            .map(|rule| {
                let condition = compile_condition(&format!("section '{}'", rule.section_id), &rule.condition)?;
                Ok(CompiledRule {
                    section_id: rule.section_id.clone(),
                    condition,
                    required_fields: rule.required_fields.clone(),
                })
            })
            .collect::<Result<Vec<_>, SchemaLoadError>>()?;

        let mut derived = Vec::new();
        let mut visibility = Vec::new();
        let mut validators = Vec::new();
        let mut defaults = Vec::new();
        for field in schema.fields() {
            if let Some(raw) = field.formula.as_deref() {
                let formula = parse_formula(raw).map_err(|detail| SchemaLoadError::InvalidExpression {
                    owner: format!("formula of field '{}'", field.name),
                    detail,
                })?;
                for reference in formula.referenced_fields() {
                    if schema.field_by_name(&reference).is_none() {
                        warn!(field = %field.name, reference = %reference, "Formula references a field the schema does not define");
                    }
                }
                let calc_when = match field.calc_when.as_deref() {
                    Some(raw) => Some(compile_condition(&format!("calc_when of field '{}'", field.name), raw)?),
                    None => None,
                };
                derived.push(DerivedField {
                    name: field.name.clone(),
                    formula,
                    calc_when,
                });
            }
            if let Some(raw) = field.visible_when.as_deref() {
                let condition = compile_condition(&format!("visible_when of field '{}'", field.name), raw)?;
                visibility.push((field.name.clone(), condition));
            }
            let validator = FieldValidator::compile(schema, field).map_err(|detail| {
                SchemaLoadError::InvalidExpression {
                    owner: format!("regex of field '{}'", field.name),
                    detail,
                }
            })?;
            validators.extend(validator);
            if let Some(default) = &field.default {
                defaults.push((field.name.clone(), default.clone(), field.is_derived()));
            }
        }

        let derived = order_derived(derived)?;
        let base_required = schema
            .fields()
            .iter()
            .filter(|f| f.required_when_active && !schema.is_rule_bound(&f.name))
            .map(|f| f.name.clone())
            .collect();

        debug!(
            rules = rules.len(),
            derived = derived.len(),
            validators = validators.len(),
            "Rule engine compiled"
        );

        Ok(Self {
            rules,
            derived,
            defaults,
            visibility,
            validators,
            base_required,
        })
    }

    /// Section ids governed by a rule.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.section_id.as_str())
    }

    pub fn has_rule(&self, section: &str) -> bool {
        self.rules.iter().any(|r| r.section_id == section)
    }

    /// Derived field names in evaluation order.
    pub fn derived_order(&self) -> Vec<&str> {
        self.derived.iter().map(|d| d.name.as_str()).collect()
    }

    /// Evaluate every rule against one record.
    pub fn evaluate(&self, record: &Record) -> Activation {
        let index = record.index();
        let mut diagnostics = Vec::new();
        let mut report = |diag: Diagnostic| {
            diag.log(index);
            diagnostics.push(diag);
        };

        let mut resolved = ResolvedRecord::new(record.clone());
        self.apply_defaults(&mut resolved, false);
        for field in &self.derived {
            if record.has_value(&field.name) {
                continue;
            }
            if let Some(gate) = &field.calc_when {
                match gate.evaluate(&resolved) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        report(Diagnostic::DerivedField {
                            field: field.name.clone(),
                            detail: format!("calc_when failed: {e}"),
                        });
                        continue;
                    }
                }
            }
            match field.formula.evaluate(&resolved) {
                Ok(value) => {
                    debug!(record = index, field = %field.name, value = %value, "Derived field computed");
                    resolved.fill(&field.name, FieldValue::Number(value), ValueOrigin::Derived);
                }
                Err(e) => report(Diagnostic::DerivedField {
                    field: field.name.clone(),
                    detail: e.to_string(),
                }),
            }
        }
        self.apply_defaults(&mut resolved, true);

        let mut active_sections = BTreeSet::new();
        let mut inactive_sections = BTreeSet::new();
        for rule in &self.rules {
            match rule.condition.evaluate(&resolved) {
                Ok(true) => {
                    active_sections.insert(rule.section_id.clone());
                }
                Ok(false) => {
                    inactive_sections.insert(rule.section_id.clone());
                }
                Err(e) => {
                    report(Diagnostic::ActivationRule {
                        section: rule.section_id.clone(),
                        detail: e.to_string(),
                    });
                    inactive_sections.insert(rule.section_id.clone());
                }
            }
        }

        let mut hidden_fields = BTreeSet::new();
        for (name, condition) in &self.visibility {
            match condition.evaluate(&resolved) {
                Ok(true) => {}
                Ok(false) => {
                    hidden_fields.insert(name.clone());
                }
                Err(e) => debug!(record = index, field = %name, error = %e, "Visibility rule failed, keeping field visible"),
            }
        }

        let required_fields: BTreeSet<String> = self
            .rules
            .iter()
            .filter(|r| active_sections.contains(&r.section_id))
            .flat_map(|r| r.required_fields.iter().cloned())
            .chain(self.base_required.iter().cloned())
            .filter(|f| !hidden_fields.contains(f))
            .collect();

        let missing_required: BTreeSet<String> = required_fields
            .iter()
            .filter(|f| !resolved.has_value(f))
            .cloned()
            .collect();
        for field in &missing_required {
            report(Diagnostic::MissingField {
                field: field.clone(),
                required: true,
            });
        }

        for validator in &self.validators {
            if let Some(value) = record.get(validator.field()) {
                if let Some(diag) = validator.check(value) {
                    report(diag);
                }
            }
        }

        debug!(
            record = index,
            active = active_sections.len(),
            inactive = inactive_sections.len(),
            required = required_fields.len(),
            "Rules evaluated"
        );

        Activation {
            active_sections,
            inactive_sections,
            required_fields,
            missing_required,
            hidden_fields,
            resolved,
            diagnostics,
        }
    }

    fn apply_defaults(&self, resolved: &mut ResolvedRecord, derived_pass: bool) {
        for (name, default, is_derived) in &self.defaults {
            if *is_derived == derived_pass && !resolved.has_value(name) {
                resolved.fill(name, FieldValue::from_cell(default), ValueOrigin::Default);
            }
        }
    }
}

fn compile_condition(owner: &str, raw: &str) -> Result<Condition, SchemaLoadError> {
    parse_condition(raw).map_err(|detail| SchemaLoadError::InvalidExpression {
        owner: owner.to_string(),
        detail,
    })
}

/// Order derived fields so every field comes after the derived fields it
/// reads (Kahn's algorithm, schema order among peers). A cycle is fatal.
fn order_derived(fields: Vec<DerivedField>) -> Result<Vec<DerivedField>, SchemaLoadError> {
    let names: HashMap<&str, usize> = fields
        .iter()
        .enumerate()
        .map(|(idx, f)| (f.name.as_str(), idx))
        .collect();

    let deps: Vec<Vec<usize>> = fields
        .iter()
        .map(|f| {
            let mut refs = f.formula.referenced_fields();
            if let Some(gate) = &f.calc_when {
                refs.extend(gate.referenced_fields());
            }
            refs.iter().filter_map(|r| names.get(r.as_str()).copied()).collect()
        })
        .collect();

    let mut pending: Vec<usize> = deps.iter().map(|d| d.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); fields.len()];
    for (idx, list) in deps.iter().enumerate() {
        for &dep in list {
            dependents[dep].push(idx);
        }
    }

    let mut order = Vec::with_capacity(fields.len());
    let mut done = vec![false; fields.len()];
    loop {
        let Some(next) = (0..fields.len()).find(|&i| !done[i] && pending[i] == 0) else {
            break;
        };
        done[next] = true;
        order.push(next);
        for &dependent in &dependents[next] {
            pending[dependent] -= 1;
        }
    }

    if order.len() < fields.len() {
        let cycle = find_cycle(&deps, &done)
            .into_iter()
            .map(|idx| fields[idx].name.clone())
            .collect();
        return Err(SchemaLoadError::DerivedFieldCycle { fields: cycle });
    }

    let mut slots: Vec<Option<DerivedField>> = fields.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|idx| slots[idx].take()).collect())
}

/// Walk unresolved dependencies from the first stuck field until a field
/// repeats; the path from its first visit is the cycle.
fn find_cycle(deps: &[Vec<usize>], done: &[bool]) -> Vec<usize> {
    let Some(start) = done.iter().position(|d| !d) else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut current = start;
    loop {
        let Some(&next) = deps[current].iter().find(|&&d| !done[d]) else {
            return path;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle = path[pos..].to_vec();
            cycle.push(next);
            return cycle;
        }
        path.push(next);
        current = next;
    }
}
