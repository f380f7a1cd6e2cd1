//! Wiring of the cache, registry and dispenser shared by the binary and tests.

use std::sync::Arc;

use tracing::info;

use crate::{
    application::{
        dispenser::Dispenser,
        error::AppError,
        form::{FormContext, FormEvents},
        registry::FormRegistry,
    },
    cache::{CacheConfig, FormCache, MemoryDriver},
    catalog,
    config::CacheSettings,
};

use super::http::HttpState;

pub struct ApplicationContext {
    pub dispenser: Arc<Dispenser>,
    pub events: Arc<FormEvents>,
    pub cache: Arc<FormCache>,
}

impl ApplicationContext {
    pub fn http_state(&self) -> HttpState {
        HttpState::new(Arc::clone(&self.dispenser))
    }
}

/// Build the application with the bundled form catalog registered.
pub fn build_application_context(settings: &CacheSettings) -> Result<ApplicationContext, AppError> {
    let mut registry = FormRegistry::new();
    catalog::register(&mut registry)?;
    Ok(build_with_registry(settings, registry))
}

pub fn build_with_registry(settings: &CacheSettings, registry: FormRegistry) -> ApplicationContext {
    let config = CacheConfig::from(settings);
    let driver = MemoryDriver::new(&config);
    let cache = Arc::new(FormCache::new(&driver, &config));
    let events = Arc::new(FormEvents::new());

    info!(
        ttl_seconds = config.ttl_seconds,
        pool_capacity = config.pool_capacity,
        classes = registry.len(),
        "Form engine initialised"
    );

    let context = FormContext::new(Arc::clone(&cache), Arc::clone(&events));
    let dispenser = Arc::new(Dispenser::new(Arc::new(registry), context));

    ApplicationContext {
        dispenser,
        events,
        cache,
    }
}
