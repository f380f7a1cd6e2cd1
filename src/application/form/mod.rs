//! Form instances.
//!
//! A [`Form`] owns its attributes and widget tree and drives the
//! setup → fill → validate → submit lifecycle. Concrete form types plug in
//! through [`FormHandler`]. Stateful forms mirror every attribute and value
//! write into the [`FormCache`] so that a later request can rebuild them from
//! the id alone.

mod attrs;
mod error;
mod events;
mod hooks;
mod id;
mod tree;


use std::collections::BTreeMap;
use std::mem;
use std::sync::Arc;

use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::cache::FormCache;
use crate::domain::{Rule, Value, Widget, WidgetView};

pub use attrs::{AttributeSet, FORM_CSS_MARKER, WELL_KNOWN};
pub use error::{FormError, ValidationErrors};
pub use events::{FormEvents, Listener, setup_widgets_event};
pub use hooks::{FormHandler, FormRequest, SubmitOutcome};
pub use id::{FormId, STATELESS_PREFIX};
pub use tree::{WidgetFilter, WidgetTree};

pub(crate) const METRIC_FORMS_CREATED_TOTAL: &str = "stepform_forms_created_total";
pub(crate) const METRIC_VALIDATION_FAILED_TOTAL: &str = "stepform_validation_failed_total";
pub(crate) const METRIC_FORMS_SUBMITTED_TOTAL: &str = "stepform_forms_submitted_total";

pub const SUBMIT_ENDPOINT: &str = "/form/submit";
pub const DEFAULT_SUBMIT_UID: &str = "action_submit";

/// Shared services every form is built against.
#[derive(Clone)]
pub struct FormContext {
    cache: Arc<FormCache>,
    events: Arc<FormEvents>,
}

impl FormContext {
    pub fn new(cache: Arc<FormCache>, events: Arc<FormEvents>) -> Self {
        Self { cache, events }
    }

    pub fn cache(&self) -> &Arc<FormCache> {
        &self.cache
    }

    pub fn events(&self) -> &Arc<FormEvents> {
        &self.events
    }
}

pub struct Form {
    id: FormId,
    class_id: String,
    handler: Arc<dyn FormHandler>,
    context: FormContext,
    request: FormRequest,
    attrs: AttributeSet,
    widgets: WidgetTree,
    submit_button: Option<Widget>,
    submitted: bool,
    /// Cleared for forms rebuilt from a request id; those never allocate
    /// cache records of their own.
    promotable: bool,
}

impl Form {
    /// Build a brand-new form. Caller attributes go through [`Form::set_attr`],
    /// so an application-defined key makes the form stateful.
    pub fn create<I>(
        class_id: impl Into<String>,
        handler: Arc<dyn FormHandler>,
        context: FormContext,
        request: FormRequest,
        attrs: I,
    ) -> Result<Self, FormError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let class_id = class_id.into();
        let id = FormId::stateless(class_id.clone());
        let mut form = Self::blank(id, class_id, handler, context, request, true);
        for (key, value) in attrs {
            form.set_attr(&key, value)?;
        }
        form.finish_setup()?;

        let mode = if form.is_stateful() { "stateful" } else { "stateless" };
        counter!(METRIC_FORMS_CREATED_TOTAL, "mode" => mode).increment(1);
        debug!(form_id = %form.id, class_id = %form.class_id, mode, "Form created");
        Ok(form)
    }

    /// Rebuild a form from an issued id.
    ///
    /// Cached attributes are merged over the defaults before
    /// [`FormHandler::on_setup_form`] runs, so the handler has the last word.
    /// A stateless id stays stateless: attribute writes that would make a
    /// fresh form stateful only change the in-memory attributes.
    pub fn restore(
        id: FormId,
        class_id: impl Into<String>,
        handler: Arc<dyn FormHandler>,
        context: FormContext,
        request: FormRequest,
    ) -> Result<Self, FormError> {
        let mut form = Self::blank(id, class_id.into(), handler, context, request, false);
        if form.is_stateful() {
            let cached = form.context.cache.attrs(&form.id.to_string());
            match cached {
                Ok(hash) => form.attrs.merge(hash),
                Err(err) if err.is_key_not_exist() => {
                    debug!(form_id = %form.id, "No cached attributes for form");
                }
                Err(err) => return Err(err.into()),
            }
        }
        form.finish_setup()?;
        debug!(form_id = %form.id, class_id = %form.class_id, "Form restored");
        Ok(form)
    }

    fn blank(
        id: FormId,
        class_id: String,
        handler: Arc<dyn FormHandler>,
        context: FormContext,
        request: FormRequest,
        promotable: bool,
    ) -> Self {
        let attrs = AttributeSet::new(
            request.path.clone(),
            request.redirect.clone().unwrap_or_default(),
        );
        Self {
            id,
            class_id,
            handler,
            context,
            request,
            attrs,
            widgets: WidgetTree::new(),
            submit_button: Some(default_submit_button()),
            submitted: false,
            promotable,
        }
    }

    fn finish_setup(&mut self) -> Result<(), FormError> {
        let handler = Arc::clone(&self.handler);
        handler.on_setup_form(self)?;

        if self.attrs.steps > 1 && self.may_promote() {
            self.promote();
        }

        if self.attrs.action.is_empty() {
            self.set_attr("action", submit_action(&self.id))?;
        }
        if self.attrs.name.is_empty() {
            self.set_attr("name", self.id.to_string())?;
        }

        let class = css_class_for(&self.class_id);
        if !self.attrs.css.split_whitespace().any(|c| c == class) {
            let css = format!("{} {class}", self.attrs.css);
            self.set_attr("css", css)?;
        }
        Ok(())
    }

    /// Switch to a fresh random id and persist the class id and every
    /// attribute under it.
    fn promote(&mut self) {
        let cache = Arc::clone(&self.context.cache);
        let next = loop {
            let candidate = FormId::generate();
            if !cache.contains(&candidate.to_string()) {
                break candidate;
            }
            warn!(class_id = %self.class_id, "Generated form id is taken, regenerating");
        };

        let previous = mem::replace(&mut self.id, next);
        if self.attrs.action == submit_action(&previous) {
            self.attrs.action = submit_action(&self.id);
        }

        cache.register(&self.id.to_string(), &self.class_id, self.attrs.to_hash());
        info!(
            form_id = %self.id,
            previous_id = %previous,
            class_id = %self.class_id,
            "Form switched to stateful mode"
        );
    }

    /// The single attribute write path.
    ///
    /// An application-defined key makes a stateless form stateful first.
    /// Stateful forms mirror the written key into the attribute pool.
    pub fn set_attr(&mut self, key: &str, value: impl Into<Value>) -> Result<(), FormError> {
        let mut value = value.into();
        if !self.attrs.contains(key) && self.may_promote() {
            self.promote();
        }
        if key == "css" {
            value = with_css_marker(value);
        }
        self.attrs.set(key, value)?;

        if self.is_stateful() {
            let form_id = self.id.to_string();
            let stored = self.attrs.get(key).unwrap_or_default();
            let cache = &self.context.cache;
            match cache.put_attr(&form_id, key, stored) {
                Ok(()) => {}
                Err(err) if err.is_key_not_exist() => {
                    debug!(form_id, key, "Attribute record missing, writing it in full");
                    cache.register(&form_id, &self.class_id, self.attrs.to_hash());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    pub fn attr(&self, key: &str) -> Option<Value> {
        self.attrs.get(key)
    }

    pub fn attrs(&self) -> &AttributeSet {
        &self.attrs
    }

    pub fn id(&self) -> &FormId {
        &self.id
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn is_stateful(&self) -> bool {
        self.id.is_stateful()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn request(&self) -> &FormRequest {
        &self.request
    }

    pub fn context(&self) -> &FormContext {
        &self.context
    }

    pub fn created(&self) -> OffsetDateTime {
        self.attrs.created
    }

    /// Submit URL, carrying the redirect target as `__redirect` when set.
    pub fn action(&self) -> String {
        let action = &self.attrs.action;
        if self.attrs.redirect.is_empty() {
            return action.clone();
        }
        let redirect: String =
            url::form_urlencoded::byte_serialize(self.attrs.redirect.as_bytes()).collect();
        let sep = if action.contains('?') { '&' } else { '?' };
        format!("{action}{sep}__redirect={redirect}")
    }

    pub fn set_action(&mut self, action: impl Into<String>) -> Result<(), FormError> {
        self.set_attr("action", action.into())
    }

    pub fn steps(&self) -> u32 {
        self.attrs.steps
    }

    pub fn set_steps(&mut self, steps: u32) -> Result<(), FormError> {
        self.set_attr("steps", steps)
    }

    pub fn current_step(&self) -> u32 {
        self.attrs.current_step
    }

    pub fn set_current_step(&mut self, step: u32) -> Result<(), FormError> {
        self.set_attr("current_step", step)
    }

    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.attrs.data
    }

    pub fn set_data(&mut self, data: BTreeMap<String, Value>) -> Result<(), FormError> {
        self.set_attr("data", data)
    }

    pub fn assets(&self) -> &[String] {
        &self.attrs.assets
    }

    pub fn set_assets(&mut self, assets: Vec<String>) -> Result<(), FormError> {
        self.set_attr("assets", assets)
    }

    pub fn submit_button(&self) -> Option<&Widget> {
        self.submit_button.as_ref()
    }

    /// `None` disables the default submit button on the last step.
    pub fn set_submit_button(&mut self, button: Option<Widget>) {
        self.submit_button = button;
    }

    /// Build the widget tree for `step`.
    ///
    /// Navigation buttons come first, then the handler's widgets, then
    /// extension listeners. Stateful forms finally get their stored values
    /// back; uids that are not part of this tree are skipped.
    pub fn setup_widgets(&mut self, step: u32) -> Result<&mut Self, FormError> {
        if step != self.attrs.current_step {
            self.set_current_step(step)?;
        }
        let steps = self.attrs.steps;

        if step == steps {
            if let Some(button) = self.submit_button.clone() {
                self.widgets.add(button)?;
            }
        }
        if step < steps {
            self.widgets.add(
                Widget::submit(format!("action_forward_{}", step + 1))
                    .with_weight(20)
                    .with_form_area("footer")
                    .with_label("Next")
                    .with_css("form-action-forward")
                    .with_data("to-step", step + 1),
            )?;
        }
        if step > 1 {
            self.widgets.add(
                Widget::button(format!("action_backward_{}", step - 1))
                    .with_weight(10)
                    .with_form_area("footer")
                    .with_form_step(step)
                    .with_label("Back")
                    .with_css("form-action-backward")
                    .with_data("to-step", step - 1),
            )?;
        }

        let handler = Arc::clone(&self.handler);
        handler.on_setup_widgets(self)?;

        let events = Arc::clone(&self.context.events);
        events.fire(&setup_widgets_event(&self.attrs.name), self)?;

        if self.is_stateful() {
            let stored = self.context.cache.values(&self.id.to_string())?;
            for (uid, value) in stored {
                if let Ok(widget) = self.widgets.get_mut(&uid) {
                    widget.set_value(value);
                }
            }
        }
        Ok(self)
    }

    /// Assign incoming values by uid, or by widget name when no uid matches.
    pub fn fill<I>(&mut self, values: I) -> Result<&mut Self, FormError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        self.ensure_live()?;
        let cache = Arc::clone(&self.context.cache);
        let form_id = self.id.to_string();
        let stateful = self.is_stateful();
        if stateful {
            cache.ensure_values(&form_id)?;
        }

        for (key, value) in values {
            let targets: Vec<String> = if self.widgets.contains(&key) {
                vec![key]
            } else {
                self.widgets
                    .all(None, Some(WidgetFilter::Name(&key)))
                    .into_iter()
                    .map(|w| w.uid().to_string())
                    .collect()
            };

            for uid in targets {
                self.widgets.get_mut(&uid)?.set_value(value.clone());
                if stateful {
                    cache.put_value(&form_id, &uid, value.clone())?;
                }
            }
        }
        Ok(self)
    }

    /// Check every widget of every step and report all failures at once.
    pub fn validate(&mut self) -> Result<&mut Self, FormError> {
        self.ensure_live()?;
        let errors: ValidationErrors = self
            .widgets
            .all(None, None)
            .into_iter()
            .flat_map(|widget| {
                widget
                    .validate()
                    .into_iter()
                    .map(move |err| (widget.uid().to_string(), err.message().to_string()))
            })
            .collect();

        if !errors.is_empty() {
            counter!(METRIC_VALIDATION_FAILED_TOTAL).increment(1);
            debug!(
                form_id = %self.id,
                failed = ?errors.uids().collect::<Vec<_>>(),
                "Form validation failed"
            );
            return Err(FormError::Validation(errors));
        }

        let handler = Arc::clone(&self.handler);
        handler.on_validate(self)?;
        Ok(self)
    }

    /// Notify widgets and the handler, then drop the cached state.
    ///
    /// Without a handler outcome the form redirects to its redirect target,
    /// falling back to the referrer.
    pub fn submit(&mut self) -> Result<Option<SubmitOutcome>, FormError> {
        self.ensure_live()?;
        let form_id = self.id.to_string();
        for widget in self.widgets.top_level() {
            widget.form_submitted(&form_id);
        }

        let handler = Arc::clone(&self.handler);
        let outcome = match handler.on_submit(self)? {
            Some(outcome) => Some(outcome),
            None if !self.attrs.redirect.is_empty() => {
                Some(SubmitOutcome::Redirect(self.attrs.redirect.clone()))
            }
            None => self.request.referrer.clone().map(SubmitOutcome::Redirect),
        };

        if self.is_stateful() {
            self.context.cache.purge(&form_id);
        }
        self.submitted = true;

        counter!(METRIC_FORMS_SUBMITTED_TOTAL).increment(1);
        info!(
            form_id,
            class_id = %self.class_id,
            stateful = self.is_stateful(),
            "Form submitted"
        );
        Ok(outcome)
    }

    fn may_promote(&self) -> bool {
        self.promotable && !self.is_stateful()
    }

    fn ensure_live(&self) -> Result<(), FormError> {
        if self.submitted {
            return Err(FormError::rejected(format!(
                "form `{}` was already submitted",
                self.id
            )));
        }
        Ok(())
    }

    pub fn add_widget(&mut self, widget: Widget) -> Result<&mut Self, FormError> {
        self.widgets.add(widget)?;
        Ok(self)
    }

    pub fn add_child(&mut self, parent_uid: &str, widget: Widget) -> Result<&mut Self, FormError> {
        self.widgets.add_child(parent_uid, widget)?;
        Ok(self)
    }

    pub fn get_widget(&self, uid: &str) -> Result<&Widget, FormError> {
        self.widgets.get(uid)
    }

    pub fn get_widget_mut(&mut self, uid: &str) -> Result<&mut Widget, FormError> {
        self.widgets.get_mut(uid)
    }

    pub fn get_widgets(&self, step: Option<u32>, filter: Option<WidgetFilter<'_>>) -> Vec<&Widget> {
        self.widgets.all(step, filter)
    }

    pub fn has_widget(&self, uid: &str) -> bool {
        self.widgets.contains(uid)
    }

    pub fn remove_widget(&mut self, uid: &str) -> Result<Widget, FormError> {
        self.widgets.remove(uid)
    }

    pub fn replace_widget(&mut self, source_uid: &str, replacement: Widget) -> Result<&mut Self, FormError> {
        self.widgets.replace(source_uid, replacement)?;
        Ok(self)
    }

    pub fn remove_widgets(&mut self) -> &mut Self {
        self.widgets.clear();
        self
    }

    pub fn hide_widget(&mut self, uid: &str) -> Result<&mut Self, FormError> {
        self.widgets.get_mut(uid)?.hide();
        Ok(self)
    }

    pub fn add_rule(&mut self, uid: &str, rule: impl Rule + 'static) -> Result<&mut Self, FormError> {
        self.widgets.get_mut(uid)?.add_rule(Arc::new(rule));
        Ok(self)
    }

    pub fn add_rules<I>(&mut self, uid: &str, rules: I) -> Result<&mut Self, FormError>
    where
        I: IntoIterator<Item = Arc<dyn Rule>>,
    {
        let widget = self.widgets.get_mut(uid)?;
        for rule in rules {
            widget.add_rule(rule);
        }
        Ok(self)
    }

    pub fn remove_rules(&mut self, uid: &str) -> Result<&mut Self, FormError> {
        self.widgets.get_mut(uid)?.clear_rules();
        Ok(self)
    }

    pub fn val(&self, uid: &str) -> Result<&Value, FormError> {
        Ok(self.widgets.get(uid)?.value())
    }

    /// Widget name → value, in traversal order.
    pub fn values(&self) -> Vec<(String, Value)> {
        self.widgets
            .all(None, None)
            .into_iter()
            .map(|w| (w.name().to_string(), w.value().clone()))
            .collect()
    }

    /// Widget uids in traversal order.
    pub fn fields(&self) -> Vec<String> {
        self.widgets
            .all(None, None)
            .into_iter()
            .map(|w| w.uid().to_string())
            .collect()
    }

    pub fn widget_views(&self, step: Option<u32>) -> Vec<WidgetView> {
        self.widgets.views(step)
    }
}

macro_rules! text_attributes {
    ($($field:ident => $setter:ident),* $(,)?) => {
        impl Form {
            $(
                pub fn $field(&self) -> &str {
                    &self.attrs.$field
                }

                pub fn $setter(&mut self, value: impl Into<String>) -> Result<(), FormError> {
                    self.set_attr(stringify!($field), value.into())
                }
            )*
        }
    };
}

macro_rules! flag_attributes {
    ($($field:ident => $setter:ident),* $(,)?) => {
        impl Form {
            $(
                pub fn $field(&self) -> bool {
                    self.attrs.$field
                }

                pub fn $setter(&mut self, value: bool) -> Result<(), FormError> {
                    self.set_attr(stringify!($field), value)
                }
            )*
        }
    };
}

text_attributes! {
    name => set_name,
    enctype => set_enctype,
    method => set_method,
    path => set_path,
    redirect => set_redirect,
    css => set_css,
    area_hidden_css => set_area_hidden_css,
    area_header_css => set_area_header_css,
    area_body_css => set_area_body_css,
    area_footer_css => set_area_footer_css,
    messages_css => set_messages_css,
    get_widgets_ep => set_get_widgets_ep,
    validation_ep => set_validation_ep,
    tpl => set_tpl,
    title => set_title,
    title_css => set_title_css,
}

flag_attributes! {
    modal => set_modal,
    modal_close_btn => set_modal_close_btn,
    prevent_submit => set_prevent_submit,
    update_location_hash => set_update_location_hash,
    hide_title => set_hide_title,
}

impl std::fmt::Debug for Form {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form")
            .field("id", &self.id)
            .field("class_id", &self.class_id)
            .field("current_step", &self.attrs.current_step)
            .field("steps", &self.attrs.steps)
            .field("widgets", &self.widgets.len())
            .finish_non_exhaustive()
    }
}

fn default_submit_button() -> Widget {
    Widget::submit(DEFAULT_SUBMIT_UID)
        .with_weight(20)
        .with_form_area("footer")
        .with_label("Save")
        .with_css("form-action-submit")
}

fn submit_action(id: &FormId) -> String {
    format!("{SUBMIT_ENDPOINT}/{id}")
}

fn with_css_marker(value: Value) -> Value {
    match value {
        Value::Str(css) if !css.split_whitespace().any(|c| c == FORM_CSS_MARKER) => {
            Value::Str(format!("{css} {FORM_CSS_MARKER}").trim_start().to_string())
        }
        other => other,
    }
}

/// `form-cid-<class id>` with every run of characters outside
/// `[a-zA-Z0-9-]` collapsed into one dash.
pub fn css_class_for(class_id: &str) -> String {
    let mut slug = String::with_capacity(class_id.len());
    let mut in_run = false;
    for ch in class_id.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            slug.push(ch);
            in_run = false;
        } else if !in_run {
            slug.push('-');
            in_run = true;
        }
    }
    format!("form-cid-{}", slug.replace("--", "-"))
}
