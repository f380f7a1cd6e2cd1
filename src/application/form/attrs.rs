//! Form attribute storage.
//!
//! Well-known attributes are typed fields; anything else an application sets
//! lands in `extra`. Both halves flatten into a single [`Hash`] so the cache
//! can persist and update them one key at a time.

use std::collections::BTreeMap;

use time::OffsetDateTime;
use tracing::warn;

use crate::cache::Hash;
use crate::domain::Value;

use super::error::FormError;

/// CSS class every form carries.
pub const FORM_CSS_MARKER: &str = "stepform";

pub const WELL_KNOWN: &[&str] = &[
    "created",
    "name",
    "enctype",
    "method",
    "action",
    "data",
    "path",
    "redirect",
    "steps",
    "current_step",
    "modal",
    "modal_close_btn",
    "prevent_submit",
    "update_location_hash",
    "css",
    "area_hidden_css",
    "area_header_css",
    "area_body_css",
    "area_footer_css",
    "messages_css",
    "get_widgets_ep",
    "validation_ep",
    "tpl",
    "title",
    "hide_title",
    "title_css",
    "assets",
];

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSet {
    pub created: OffsetDateTime,
    pub name: String,
    pub enctype: String,
    pub method: String,
    pub action: String,
    pub data: BTreeMap<String, Value>,
    pub path: String,
    pub redirect: String,
    pub steps: u32,
    pub current_step: u32,
    pub modal: bool,
    pub modal_close_btn: bool,
    pub prevent_submit: bool,
    pub update_location_hash: bool,
    pub css: String,
    pub area_hidden_css: String,
    pub area_header_css: String,
    pub area_body_css: String,
    pub area_footer_css: String,
    pub messages_css: String,
    pub get_widgets_ep: String,
    pub validation_ep: String,
    pub tpl: String,
    pub title: String,
    pub hide_title: bool,
    pub title_css: String,
    pub assets: Vec<String>,
    pub extra: BTreeMap<String, Value>,
}

impl AttributeSet {
    pub fn new(path: impl Into<String>, redirect: impl Into<String>) -> Self {
        Self {
            created: OffsetDateTime::now_utc(),
            name: String::new(),
            enctype: "application/x-www-form-urlencoded".to_string(),
            method: "post".to_string(),
            action: String::new(),
            data: BTreeMap::new(),
            path: path.into(),
            redirect: redirect.into(),
            steps: 1,
            current_step: 1,
            modal: false,
            modal_close_btn: true,
            prevent_submit: false,
            update_location_hash: false,
            css: FORM_CSS_MARKER.to_string(),
            area_hidden_css: String::new(),
            area_header_css: String::new(),
            area_body_css: String::new(),
            area_footer_css: String::new(),
            messages_css: "form-messages".to_string(),
            get_widgets_ep: "form/widgets".to_string(),
            validation_ep: "form/validate".to_string(),
            tpl: "form@form".to_string(),
            title: String::new(),
            hide_title: false,
            title_css: String::new(),
            assets: vec!["form@css/form.css".to_string(), "form@js/stepform.js".to_string()],
            extra: BTreeMap::new(),
        }
    }

    pub fn is_well_known(key: &str) -> bool {
        WELL_KNOWN.contains(&key)
    }

    /// Well-known keys and application keys set so far.
    pub fn contains(&self, key: &str) -> bool {
        Self::is_well_known(key) || self.extra.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let value = match key {
            "created" => Value::DateTime(self.created),
            "name" => Value::from(self.name.as_str()),
            "enctype" => Value::from(self.enctype.as_str()),
            "method" => Value::from(self.method.as_str()),
            "action" => Value::from(self.action.as_str()),
            "data" => Value::Map(self.data.clone()),
            "path" => Value::from(self.path.as_str()),
            "redirect" => Value::from(self.redirect.as_str()),
            "steps" => Value::from(self.steps),
            "current_step" => Value::from(self.current_step),
            "modal" => Value::Bool(self.modal),
            "modal_close_btn" => Value::Bool(self.modal_close_btn),
            "prevent_submit" => Value::Bool(self.prevent_submit),
            "update_location_hash" => Value::Bool(self.update_location_hash),
            "css" => Value::from(self.css.as_str()),
            "area_hidden_css" => Value::from(self.area_hidden_css.as_str()),
            "area_header_css" => Value::from(self.area_header_css.as_str()),
            "area_body_css" => Value::from(self.area_body_css.as_str()),
            "area_footer_css" => Value::from(self.area_footer_css.as_str()),
            "messages_css" => Value::from(self.messages_css.as_str()),
            "get_widgets_ep" => Value::from(self.get_widgets_ep.as_str()),
            "validation_ep" => Value::from(self.validation_ep.as_str()),
            "tpl" => Value::from(self.tpl.as_str()),
            "title" => Value::from(self.title.as_str()),
            "hide_title" => Value::Bool(self.hide_title),
            "title_css" => Value::from(self.title_css.as_str()),
            "assets" => Value::from(self.assets.clone()),
            other => return self.extra.get(other).cloned(),
        };
        Some(value)
    }

    /// Store a value, checking its type against the well-known field if any.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), FormError> {
        match key {
            "created" => self.created = datetime(key, &value)?,
            "name" => self.name = text(key, value)?,
            "enctype" => self.enctype = text(key, value)?,
            "method" => self.method = text(key, value)?,
            "action" => self.action = text(key, value)?,
            "data" => self.data = map(key, value)?,
            "path" => self.path = text(key, value)?,
            "redirect" => self.redirect = text(key, value)?,
            "steps" => self.steps = step_count(key, &value)?,
            "current_step" => self.current_step = step_count(key, &value)?,
            "modal" => self.modal = flag(key, &value)?,
            "modal_close_btn" => self.modal_close_btn = flag(key, &value)?,
            "prevent_submit" => self.prevent_submit = flag(key, &value)?,
            "update_location_hash" => self.update_location_hash = flag(key, &value)?,
            "css" => self.css = text(key, value)?,
            "area_hidden_css" => self.area_hidden_css = text(key, value)?,
            "area_header_css" => self.area_header_css = text(key, value)?,
            "area_body_css" => self.area_body_css = text(key, value)?,
            "area_footer_css" => self.area_footer_css = text(key, value)?,
            "messages_css" => self.messages_css = text(key, value)?,
            "get_widgets_ep" => self.get_widgets_ep = text(key, value)?,
            "validation_ep" => self.validation_ep = text(key, value)?,
            "tpl" => self.tpl = text(key, value)?,
            "title" => self.title = text(key, value)?,
            "hide_title" => self.hide_title = flag(key, &value)?,
            "title_css" => self.title_css = text(key, value)?,
            "assets" => self.assets = text_list(key, value)?,
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
        Ok(())
    }

    pub fn to_hash(&self) -> Hash {
        let mut hash: Hash = WELL_KNOWN
            .iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect();
        hash.extend(self.extra.clone());
        hash
    }

    /// Overlay cached attributes; cached values win. Entries whose type no
    /// longer fits are skipped.
    pub fn merge(&mut self, hash: Hash) {
        for (key, value) in hash {
            if let Err(err) = self.set(&key, value) {
                warn!(key, error = %err, "Skipping cached form attribute");
            }
        }
    }
}

fn mismatch(key: &str, expected: &str, value: &Value) -> FormError {
    FormError::attribute(key, format!("expected {expected}, got {}", value.kind()))
}

fn text(key: &str, value: Value) -> Result<String, FormError> {
    match value {
        Value::Str(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Err(mismatch(key, "string", &other)),
    }
}

fn flag(key: &str, value: &Value) -> Result<bool, FormError> {
    value.as_bool().ok_or_else(|| mismatch(key, "bool", value))
}

fn datetime(key: &str, value: &Value) -> Result<OffsetDateTime, FormError> {
    value
        .as_datetime()
        .ok_or_else(|| mismatch(key, "datetime", value))
}

fn step_count(key: &str, value: &Value) -> Result<u32, FormError> {
    let raw = value.as_int().ok_or_else(|| mismatch(key, "int", value))?;
    match u32::try_from(raw) {
        Ok(steps) if steps >= 1 => Ok(steps),
        _ => Err(FormError::attribute(key, format!("must be at least 1, got {raw}"))),
    }
}

fn map(key: &str, value: Value) -> Result<BTreeMap<String, Value>, FormError> {
    match value {
        Value::Map(map) => Ok(map),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(mismatch(key, "map", &other)),
    }
}

fn text_list(key: &str, value: Value) -> Result<Vec<String>, FormError> {
    match value {
        Value::List(items) => items
            .into_iter()
            .map(|item| text(key, item))
            .collect(),
        other => Err(mismatch(key, "list", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_well_known_key() {
        let attrs = AttributeSet::new("/contact", "");
        for key in WELL_KNOWN {
            assert!(attrs.get(key).is_some(), "missing default for {key}");
        }
        assert_eq!(attrs.steps, 1);
        assert_eq!(attrs.css, FORM_CSS_MARKER);
        assert_eq!(attrs.to_hash().len(), WELL_KNOWN.len());
    }

    #[test]
    fn application_keys_go_to_extra() {
        let mut attrs = AttributeSet::new("/", "");
        assert!(!attrs.contains("foo"));
        attrs.set("foo", Value::from(1)).expect("set");
        assert!(attrs.contains("foo"));
        assert_eq!(attrs.get("foo"), Some(Value::Int(1)));
        assert_eq!(attrs.to_hash()["foo"], Value::Int(1));
    }

    #[test]
    fn well_known_keys_are_type_checked() {
        let mut attrs = AttributeSet::new("/", "");
        let err = attrs.set("modal", Value::from("yes")).expect_err("not a bool");
        assert!(matches!(err, FormError::Attribute { ref key, .. } if key == "modal"));
        assert!(attrs.set("steps", Value::from(0)).is_err());
        attrs.set("steps", Value::from("3")).expect("numeric text");
        assert_eq!(attrs.steps, 3);
    }

    #[test]
    fn merge_overlays_cached_values() {
        let mut cached = AttributeSet::new("/", "");
        cached.title = "Cached".to_string();
        cached.extra.insert("tenant".to_string(), Value::from("acme"));

        let mut fresh = AttributeSet::new("/", "");
        let mut hash = cached.to_hash();
        hash.insert("steps".to_string(), Value::from("broken"));
        fresh.merge(hash);

        assert_eq!(fresh.title, "Cached");
        assert_eq!(fresh.steps, 1);
        assert_eq!(fresh.extra["tenant"], Value::from("acme"));
        assert_eq!(fresh.created, cached.created);
    }
}
