//! Domain layer types and invariants.

pub mod rules;
pub mod value;
pub mod widget;

pub use rules::{Email, HttpUrl, Integer, MaxLength, MinLength, Predicate, Required, Rule, RuleError};
pub use value::Value;
pub use widget::{FormArea, SubmitHook, Widget, WidgetKind, WidgetView};
