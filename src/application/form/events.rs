//! Listener registry for form extension events.
//!
//! External code hooks into a form by name instead of wrapping its type. The
//! registry is shared by every form the dispenser builds.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::cache::{rw_read, rw_write};

use super::Form;
use super::error::FormError;

const SOURCE: &str = "application::form::events";

pub type Listener = Arc<dyn Fn(&mut Form) -> Result<(), FormError> + Send + Sync>;

/// Event fired after a form's own widgets are set up.
pub fn setup_widgets_event(form_name: &str) -> String {
    format!("form@setup_widgets.{}", form_name.replace('-', "_"))
}

#[derive(Default)]
pub struct FormEvents {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
}

impl FormEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen<F>(&self, event: impl Into<String>, listener: F)
    where
        F: Fn(&mut Form) -> Result<(), FormError> + Send + Sync + 'static,
    {
        let event = event.into();
        debug!(event = %event, "Form event listener registered");
        rw_write(&self.listeners, SOURCE, "listen")
            .entry(event)
            .or_default()
            .push(Arc::new(listener));
    }

    /// Shorthand for listening to [`setup_widgets_event`].
    pub fn on_setup_widgets<F>(&self, form_name: &str, listener: F)
    where
        F: Fn(&mut Form) -> Result<(), FormError> + Send + Sync + 'static,
    {
        self.listen(setup_widgets_event(form_name), listener);
    }

    /// Call every listener of `event` in registration order, stopping at the
    /// first error.
    pub fn fire(&self, event: &str, form: &mut Form) -> Result<(), FormError> {
        // Listeners run without the lock held so they may register others.
        let listeners = rw_read(&self.listeners, SOURCE, "fire")
            .get(event)
            .cloned()
            .unwrap_or_default();

        for listener in listeners {
            listener(form)?;
        }
        Ok(())
    }

    pub fn listener_count(&self, event: &str) -> usize {
        rw_read(&self.listeners, SOURCE, "listener_count")
            .get(event)
            .map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for FormEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events: Vec<String> = rw_read(&self.listeners, SOURCE, "debug")
            .keys()
            .cloned()
            .collect();
        f.debug_struct("FormEvents").field("events", &events).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_replace_dashes() {
        assert_eq!(
            setup_widgets_event("user-signup"),
            "form@setup_widgets.user_signup"
        );
    }

    #[test]
    fn listeners_are_counted_per_event() {
        let events = FormEvents::new();
        events.on_setup_widgets("a-b", |_| Ok(()));
        events.on_setup_widgets("a_b", |_| Ok(()));
        events.listen("other", |_| Ok(()));

        assert_eq!(events.listener_count("form@setup_widgets.a_b"), 2);
        assert_eq!(events.listener_count("other"), 1);
        assert_eq!(events.listener_count("missing"), 0);
    }
}
