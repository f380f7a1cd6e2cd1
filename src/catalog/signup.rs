use serde_json::json;
use tracing::info;

use crate::application::form::{Form, FormError, FormHandler, SubmitOutcome};
use crate::domain::{Email, HttpUrl, MinLength, Predicate, Required, Value, Widget};

/// Two-step sign-up: account details first, contact details second.
#[derive(Debug, Default)]
pub struct SignupForm;

impl SignupForm {
    pub const CLASS_ID: &'static str = "catalog.SignupForm";
}

fn is_phone_number(value: &Value) -> bool {
    let text = value.to_text();
    let digits = text.chars().filter(char::is_ascii_digit).count();
    digits >= 7
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'))
}

impl FormHandler for SignupForm {
    fn on_setup_form(&self, form: &mut Form) -> Result<(), FormError> {
        form.set_steps(2)?;
        form.set_title("Create an account")
    }

    fn on_setup_widgets(&self, form: &mut Form) -> Result<(), FormError> {
        match form.current_step() {
            1 => {
                form.add_widget(
                    Widget::input("email")
                        .with_label("E-mail")
                        .with_weight(10)
                        .with_form_step(1)
                        .with_rule(Required)
                        .with_rule(Email),
                )?;
                form.add_widget(
                    Widget::input("nickname")
                        .with_label("Nickname")
                        .with_weight(20)
                        .with_form_step(1)
                        .with_rule(MinLength(3)),
                )?;
            }
            _ => {
                form.add_widget(
                    Widget::input("phone")
                        .with_label("Phone")
                        .with_weight(10)
                        .with_form_step(2)
                        .with_rule(Required)
                        .with_rule(Predicate::new(
                            "Must be a valid phone number.",
                            is_phone_number,
                        )),
                )?;
                form.add_widget(
                    Widget::input("website")
                        .with_label("Website")
                        .with_weight(20)
                        .with_form_step(2)
                        .with_rule(HttpUrl),
                )?;
            }
        }
        Ok(())
    }

    fn on_submit(&self, form: &mut Form) -> Result<Option<SubmitOutcome>, FormError> {
        let email = form.val("email")?.to_text();
        let phone = form.val("phone")?.to_text();
        info!(form_id = %form.id(), email = %email, "Account sign-up submitted");
        Ok(Some(SubmitOutcome::Json(json!({
            "email": email,
            "phone": phone,
        }))))
    }
}
