use axum::extract::rejection::JsonRejection;
use validator::ValidationErrors;

use crate::errors::{AppError, FieldError};

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Request bodies are camelCase on the wire; report fields the way the
/// client sent them.
fn wire_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, failures)| {
                let field = wire_field(&field.to_string());
                failures.iter().map(move |failure| {
                    let message = failure
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| failure.code.to_string());
                    FieldError::new(&field, message)
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(fields)
    }
}

/// Turns a body that failed to parse into a 400 with the parser's reason.
pub fn reject_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(vec![FieldError::new("body", rejection.body_text())])
}
