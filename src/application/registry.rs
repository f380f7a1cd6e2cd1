//! Class identifier → form handler factories.
//!
//! Only registered identifiers can be turned into forms, so a forged id can at
//! worst name a form type the application already exposes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::application::form::{FormError, FormHandler};

pub type FormFactory = Arc<dyn Fn() -> Arc<dyn FormHandler> + Send + Sync>;

#[derive(Default, Clone)]
pub struct FormRegistry {
    factories: BTreeMap<String, FormFactory>,
}

impl FormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; a class identifier can only be claimed once.
    pub fn register<F>(&mut self, class_id: impl Into<String>, factory: F) -> Result<(), FormError>
    where
        F: Fn() -> Arc<dyn FormHandler> + Send + Sync + 'static,
    {
        let class_id = class_id.into();
        if class_id.is_empty() {
            return Err(FormError::configuration("form class identifier is empty"));
        }
        if self.factories.contains_key(&class_id) {
            return Err(FormError::configuration(format!(
                "form class `{class_id}` is already registered"
            )));
        }
        debug!(class_id = %class_id, "Form class registered");
        self.factories.insert(class_id, Arc::new(factory));
        Ok(())
    }

    /// Register a handler type built through `Default`.
    pub fn register_default<H>(&mut self, class_id: impl Into<String>) -> Result<(), FormError>
    where
        H: FormHandler + Default + 'static,
    {
        self.register(class_id, || Arc::new(H::default()) as Arc<dyn FormHandler>)
    }

    pub fn resolve(&self, class_id: &str) -> Option<Arc<dyn FormHandler>> {
        self.factories.get(class_id).map(|factory| factory())
    }

    pub fn contains(&self, class_id: &str) -> bool {
        self.factories.contains_key(class_id)
    }

    /// Registered identifiers in lexical order.
    pub fn class_ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for FormRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormRegistry")
            .field("class_ids", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::form::Form;

    #[derive(Default)]
    struct Empty;

    impl FormHandler for Empty {
        fn on_setup_widgets(&self, _form: &mut Form) -> Result<(), FormError> {
            Ok(())
        }
    }

    #[test]
    fn registered_classes_resolve() {
        let mut registry = FormRegistry::new();
        registry
            .register_default::<Empty>("demo.Empty")
            .expect("registered");

        assert!(registry.contains("demo.Empty"));
        assert!(registry.resolve("demo.Empty").is_some());
        assert!(registry.resolve("std.process.Command").is_none());
        assert_eq!(registry.class_ids().collect::<Vec<_>>(), ["demo.Empty"]);
    }

    #[test]
    fn class_ids_are_claimed_once() {
        let mut registry = FormRegistry::new();
        registry
            .register_default::<Empty>("demo.Empty")
            .expect("registered");
        let err = registry
            .register_default::<Empty>("demo.Empty")
            .expect_err("duplicate");
        assert!(matches!(err, FormError::Configuration { .. }));
        assert!(registry.register_default::<Empty>("").is_err());
        assert_eq!(registry.len(), 1);
    }
}
