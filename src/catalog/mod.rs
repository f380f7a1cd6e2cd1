//! Forms shipped with the service.

mod contact;
mod signup;

pub use contact::ContactForm;
pub use signup::SignupForm;

use crate::application::form::FormError;
use crate::application::registry::FormRegistry;

/// Register every bundled form class.
pub fn register(registry: &mut FormRegistry) -> Result<(), FormError> {
    registry.register_default::<ContactForm>(ContactForm::CLASS_ID)?;
    registry.register_default::<SignupForm>(SignupForm::CLASS_ID)?;
    Ok(())
}
