use tracing::info;

use crate::application::form::{Form, FormError, FormHandler, SubmitOutcome};
use crate::domain::{Email, MaxLength, MinLength, Required, Widget};

/// Single-step contact form; stays stateless.
#[derive(Debug, Default)]
pub struct ContactForm;

impl ContactForm {
    pub const CLASS_ID: &'static str = "catalog.ContactForm";
}

impl FormHandler for ContactForm {
    fn on_setup_form(&self, form: &mut Form) -> Result<(), FormError> {
        form.set_title("Contact us")
    }

    fn on_setup_widgets(&self, form: &mut Form) -> Result<(), FormError> {
        form.add_widget(
            Widget::input("contact_name")
                .with_name("name")
                .with_label("Your name")
                .with_weight(10)
                .with_rule(Required)
                .with_rule(MaxLength(100)),
        )?;
        form.add_widget(
            Widget::input("contact_email")
                .with_name("email")
                .with_label("E-mail")
                .with_weight(20)
                .with_rule(Required)
                .with_rule(Email),
        )?;
        form.add_widget(
            Widget::input("contact_message")
                .with_name("message")
                .with_label("Message")
                .with_weight(30)
                .with_rule(Required)
                .with_rule(MinLength(10)),
        )?;
        Ok(())
    }

    fn on_submit(&self, form: &mut Form) -> Result<Option<SubmitOutcome>, FormError> {
        info!(
            form_id = %form.id(),
            email = %form.val("contact_email")?,
            "Contact message received"
        );
        Ok(None)
    }
}
