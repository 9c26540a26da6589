//! Activation rules, derived fields, and value validation.
//!
//! The schema stores conditions and formulas as text. This crate compiles
//! them once into small expression trees and evaluates those per record:
//!
//! ```text
//! ┌──────────┐   compile    ┌────────────┐   evaluate   ┌────────────┐
//! │  Schema  │─────────────▶│ RuleEngine │◀─────────────│   Record   │
//! └──────────┘              └─────┬──────┘              └────────────┘
//!                                 │
//!                          ┌──────┴──────┐
//!                          │ Activation  │
//!                          │  sections   │
//!                          │  required   │
//!                          │  derived    │
//!                          └─────────────┘
//! ```
//!
//! # Condition syntax
//!
//! ```text
//! tipo_acao == 'indenizacao' AND valor_causa > 40.000,00
//! NOT (estado_civil == casado) || possui_filhos
//! AND(tem_pedido_liminar, urgencia != 'baixa')
//! ```

pub mod condition;
pub mod engine;
pub mod formula;
pub mod validate;

pub use condition::{CmpOp, Condition, EvalError, Operand, parse_condition};
pub use engine::{Activation, ResolvedRecord, RuleEngine, ValueOrigin};
pub use formula::{Formula, FormulaError, parse_formula};
pub use validate::FieldValidator;
