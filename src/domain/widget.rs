//! Widget contract consumed by the form engine.
//!
//! Concrete widget rendering lives outside this crate; the engine only needs
//! identity, ordering, placement, a value, validation rules and an optional
//! submission hook.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use super::rules::{Rule, RuleError};
use super::value::Value;

/// Placement zone of a widget inside the rendered form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormArea {
    Hidden,
    Header,
    Body,
    Footer,
}

impl FormArea {
    pub const ALL: [FormArea; 4] = [
        FormArea::Hidden,
        FormArea::Header,
        FormArea::Body,
        FormArea::Footer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FormArea::Hidden => "hidden",
            FormArea::Header => "header",
            FormArea::Body => "body",
            FormArea::Footer => "footer",
        }
    }
}

impl FromStr for FormArea {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        FormArea::ALL
            .into_iter()
            .find(|area| area.as_str() == value)
            .ok_or_else(|| format!("invalid form area `{value}`"))
    }
}

impl fmt::Display for FormArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Input,
    Hidden,
    Submit,
    Button,
    /// Groups child widgets; the only kind allowed to have children.
    Container,
}

/// Notified when the owning form is submitted; the place for model persistence.
pub trait SubmitHook: Send + Sync {
    fn form_submitted(&self, form_id: &str, widget: &Widget);
}

#[derive(Clone)]
pub struct Widget {
    uid: String,
    name: String,
    kind: WidgetKind,
    weight: i32,
    form_area: String,
    form_step: Option<u32>,
    value: Value,
    label: String,
    css: String,
    data: BTreeMap<String, Value>,
    hidden: bool,
    replaces: Option<String>,
    rules: Vec<Arc<dyn Rule>>,
    submit_hook: Option<Arc<dyn SubmitHook>>,
}

impl Widget {
    pub fn new(kind: WidgetKind, uid: impl Into<String>) -> Self {
        let uid = uid.into();
        let form_area = match kind {
            WidgetKind::Hidden => FormArea::Hidden,
            WidgetKind::Submit | WidgetKind::Button => FormArea::Footer,
            WidgetKind::Input | WidgetKind::Container => FormArea::Body,
        };
        Self {
            name: uid.clone(),
            uid,
            kind,
            weight: 0,
            form_area: form_area.as_str().to_string(),
            form_step: None,
            value: Value::Null,
            label: String::new(),
            css: String::new(),
            data: BTreeMap::new(),
            hidden: kind == WidgetKind::Hidden,
            replaces: None,
            rules: Vec::new(),
            submit_hook: None,
        }
    }

    pub fn input(uid: impl Into<String>) -> Self {
        Self::new(WidgetKind::Input, uid)
    }

    pub fn hidden_input(uid: impl Into<String>) -> Self {
        Self::new(WidgetKind::Hidden, uid)
    }

    pub fn submit(uid: impl Into<String>) -> Self {
        Self::new(WidgetKind::Submit, uid)
    }

    pub fn button(uid: impl Into<String>) -> Self {
        Self::new(WidgetKind::Button, uid)
    }

    pub fn container(uid: impl Into<String>) -> Self {
        Self::new(WidgetKind::Container, uid)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    /// The area is checked when the widget is added to a form.
    pub fn with_form_area(mut self, area: impl Into<String>) -> Self {
        self.form_area = area.into();
        self
    }

    pub fn with_form_step(mut self, step: u32) -> Self {
        self.form_step = Some(step);
        self
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = css.into();
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn with_submit_hook(mut self, hook: Arc<dyn SubmitHook>) -> Self {
        self.submit_hook = Some(hook);
        self
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    pub fn is_container(&self) -> bool {
        self.kind == WidgetKind::Container
    }

    /// Zero means "no explicit weight".
    pub fn weight(&self) -> i32 {
        self.weight
    }

    pub fn set_weight(&mut self, weight: i32) {
        self.weight = weight;
    }

    pub fn form_area(&self) -> &str {
        &self.form_area
    }

    pub fn set_form_area(&mut self, area: impl Into<String>) {
        self.form_area = area.into();
    }

    pub fn form_step(&self) -> Option<u32> {
        self.form_step
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set_value(&mut self, value: Value) {
        self.value = value;
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn hide(&mut self) {
        self.hidden = true;
    }

    pub fn replaces(&self) -> Option<&str> {
        self.replaces.as_deref()
    }

    pub fn set_replaces(&mut self, uid: impl Into<String>) {
        self.replaces = Some(uid.into());
    }

    pub fn add_rule(&mut self, rule: Arc<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn clear_rules(&mut self) {
        self.rules.clear();
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Run every rule and collect all failures in rule order.
    pub fn validate(&self) -> Vec<RuleError> {
        self.rules
            .iter()
            .filter_map(|rule| rule.check(&self.value).err())
            .collect()
    }

    pub fn form_submitted(&self, form_id: &str) {
        if let Some(hook) = &self.submit_hook {
            hook.form_submitted(form_id, self);
        }
    }

    pub fn view(&self, parent: Option<&str>) -> WidgetView {
        WidgetView {
            uid: self.uid.clone(),
            name: self.name.clone(),
            kind: self.kind,
            weight: self.weight,
            form_area: self.form_area.clone(),
            form_step: self.form_step,
            value: self.value.clone(),
            label: self.label.clone(),
            css: self.css.clone(),
            data: self.data.clone(),
            hidden: self.hidden,
            parent: parent.map(str::to_string),
            replaces: self.replaces.clone(),
        }
    }
}

impl fmt::Debug for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Widget")
            .field("uid", &self.uid)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("weight", &self.weight)
            .field("form_area", &self.form_area)
            .field("form_step", &self.form_step)
            .field("value", &self.value)
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

/// Serializable snapshot handed to the renderer or to HTTP clients.
#[derive(Debug, Clone, Serialize)]
pub struct WidgetView {
    pub uid: String,
    pub name: String,
    pub kind: WidgetKind,
    pub weight: i32,
    pub form_area: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_step: Option<u32>,
    pub value: Value,
    pub label: String,
    pub css: String,
    pub data: BTreeMap<String, Value>,
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaces: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::{MinLength, Required};

    #[test]
    fn defaults_follow_kind() {
        let hidden = Widget::hidden_input("token");
        assert_eq!(hidden.form_area(), "hidden");
        assert!(hidden.is_hidden());
        assert_eq!(hidden.name(), "token");

        let submit = Widget::submit("go");
        assert_eq!(submit.form_area(), "footer");
    }

    #[test]
    fn validate_collects_every_failure() {
        let widget = Widget::input("nick")
            .with_rule(Required)
            .with_rule(MinLength(3))
            .with_value("");
        let failures = widget.validate();
        assert_eq!(failures.len(), 1);

        let widget = widget.with_value("ab").with_rule(MinLength(5));
        let messages: Vec<_> = widget
            .validate()
            .into_iter()
            .map(|e| e.message().to_string())
            .collect();
        assert_eq!(
            messages,
            vec![
                "Must be at least 3 characters long.".to_string(),
                "Must be at least 5 characters long.".to_string()
            ]
        );
    }

    #[test]
    fn area_parsing_rejects_unknown_zones() {
        assert_eq!("body".parse::<FormArea>(), Ok(FormArea::Body));
        assert!("sidebar".parse::<FormArea>().is_err());
    }
}
