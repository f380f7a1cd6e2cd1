//! Application services: form lifecycle, class registry and dispensing.

pub mod dispenser;
pub mod error;
pub mod form;
pub mod registry;
