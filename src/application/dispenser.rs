//! Turns form ids back into live forms.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error};

use crate::application::form::{Form, FormContext, FormError, FormId, FormRequest};
use crate::application::registry::FormRegistry;
use crate::cache::CacheError;
use crate::domain::Value;

const SOURCE: &str = "application::dispenser";

/// The only failure callers ever see; the cause stays in the logs.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispenseError {
    #[error("invalid form id")]
    InvalidId,
}

#[derive(Debug, Error)]
enum ResolveError {
    #[error("form id is not cached")]
    Unknown(#[source] CacheError),
    #[error("form class `{0}` is not registered")]
    Unregistered(String),
    #[error(transparent)]
    Form(#[from] FormError),
}

#[derive(Clone)]
pub struct Dispenser {
    registry: Arc<FormRegistry>,
    context: FormContext,
}

impl Dispenser {
    pub fn new(registry: Arc<FormRegistry>, context: FormContext) -> Self {
        Self { registry, context }
    }

    pub fn registry(&self) -> &FormRegistry {
        &self.registry
    }

    pub fn context(&self) -> &FormContext {
        &self.context
    }

    /// Build a fresh instance of a registered form class.
    pub fn create<I>(&self, class_id: &str, request: FormRequest, attrs: I) -> Result<Form, FormError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let handler = self.registry.resolve(class_id).ok_or_else(|| {
            FormError::configuration(format!("form class `{class_id}` is not registered"))
        })?;
        Form::create(class_id, handler, self.context.clone(), request, attrs)
    }

    /// Rebuild the form behind `raw_id`.
    ///
    /// A `cid:` id names its class directly and never touches the cache.
    /// Any other id is looked up in the class-id pool.
    pub fn dispense(&self, raw_id: &str, request: FormRequest) -> Result<Form, DispenseError> {
        self.resolve(raw_id, request).map_err(|err| {
            error!(
                source = SOURCE,
                form_id = raw_id,
                error = %err,
                "Form could not be dispensed"
            );
            DispenseError::InvalidId
        })
    }

    fn resolve(&self, raw_id: &str, request: FormRequest) -> Result<Form, ResolveError> {
        let id = FormId::parse(raw_id);
        let class_id = match id.class_id() {
            Some(class_id) => class_id.to_string(),
            None => self
                .context
                .cache()
                .class_of(raw_id)
                .map_err(ResolveError::Unknown)?,
        };

        let handler = self
            .registry
            .resolve(&class_id)
            .ok_or_else(|| ResolveError::Unregistered(class_id.clone()))?;

        debug!(form_id = raw_id, class_id = %class_id, "Dispensing form");
        Ok(Form::restore(
            id,
            class_id,
            handler,
            self.context.clone(),
            request,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::form::{FormEvents, FormHandler};
    use crate::cache::{CacheConfig, FormCache, MemoryDriver, PoolName};
    use crate::domain::Widget;

    #[derive(Default)]
    struct Wizard;

    impl FormHandler for Wizard {
        fn on_setup_form(&self, form: &mut Form) -> Result<(), FormError> {
            form.set_steps(2)
        }

        fn on_setup_widgets(&self, form: &mut Form) -> Result<(), FormError> {
            form.add_widget(Widget::input(format!("field_{}", form.current_step())))?;
            Ok(())
        }
    }

    fn dispenser() -> Dispenser {
        let config = CacheConfig::default();
        let cache = FormCache::new(&MemoryDriver::new(&config), &config);
        let context = FormContext::new(Arc::new(cache), Arc::new(FormEvents::new()));
        let mut registry = FormRegistry::new();
        registry
            .register_default::<Wizard>("demo.Wizard")
            .expect("registered");
        registry
            .register_default::<Plain>("demo.Plain")
            .expect("registered");
        Dispenser::new(Arc::new(registry), context)
    }

    #[test]
    fn stateless_ids_skip_the_cache() {
        let dispenser = dispenser();
        for raw in ["cid:demo.Plain", "cid:demo.Wizard"] {
            let form = dispenser
                .dispense(raw, FormRequest::default())
                .expect("dispensed");
            assert_eq!(form.id().to_string(), raw);
            assert!(!form.is_stateful());
        }
        for pool in PoolName::ALL {
            assert!(dispenser.context().cache().pool(pool).is_empty(), "{pool} was written");
        }
    }

    #[derive(Default)]
    struct Plain;

    impl FormHandler for Plain {
        fn on_setup_widgets(&self, form: &mut Form) -> Result<(), FormError> {
            form.add_widget(Widget::input("message"))?;
            Ok(())
        }
    }

    #[test]
    fn stateful_ids_resolve_through_the_class_pool() {
        let dispenser = dispenser();
        let created = dispenser
            .create("demo.Wizard", FormRequest::default(), Vec::new())
            .expect("created");
        let id = created.id().to_string();

        let form = dispenser
            .dispense(&id, FormRequest::default())
            .expect("dispensed");
        assert_eq!(form.id(), created.id());
        assert_eq!(form.class_id(), "demo.Wizard");
        assert_eq!(form.steps(), 2);
    }

    #[test]
    fn unknown_and_unregistered_ids_are_invalid() {
        let dispenser = dispenser();
        assert_eq!(
            dispenser
                .dispense("no-such-token", FormRequest::default())
                .map(|_| ()),
            Err(DispenseError::InvalidId)
        );
        assert_eq!(
            dispenser
                .dispense("cid:std.fs.remove_dir_all", FormRequest::default())
                .map(|_| ()),
            Err(DispenseError::InvalidId)
        );
    }

    #[test]
    fn submitted_forms_cannot_be_dispensed_again() {
        let dispenser = dispenser();
        let mut form = dispenser
            .create("demo.Wizard", FormRequest::default(), Vec::new())
            .expect("created");
        let id = form.id().to_string();
        form.setup_widgets(1).expect("setup");
        form.submit().expect("submitted");

        let err = dispenser
            .dispense(&id, FormRequest::default())
            .map(|_| ())
            .expect_err("purged");
        assert_eq!(err, DispenseError::InvalidId);
    }

    #[test]
    fn creating_an_unregistered_class_is_a_configuration_error() {
        let dispenser = dispenser();
        let err = dispenser
            .create("demo.Missing", FormRequest::default(), Vec::new())
            .map(|_| ())
            .expect_err("unregistered");
        assert!(matches!(err, FormError::Configuration { .. }));
    }
}
