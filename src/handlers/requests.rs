//! Request bodies accepted by the HTTP layer and their input validation.
//!
//! Malformed input is rejected here and never reaches the session manager.

use serde::{Deserialize, Serialize};

pub const PASSWORD_MIN_LENGTH: usize = 6;
pub const PASSWORD_MAX_LENGTH: usize = 50;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Credentials that passed validation
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

fn required<'a>(value: &'a Option<String>, field: &str, errors: &mut Vec<String>) -> Option<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => value.as_deref(),
        _ => {
            errors.push(format!("The {} field is required", field));
            None
        }
    }
}

/// Loose structural check: one `@`, non-empty local part, dotted domain, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn check_email(email: &str, errors: &mut Vec<String>) {
    if !is_valid_email(email) {
        errors.push("The Email field is invalid".to_string());
    }
}

impl SignUpRequest {
    pub fn validate(&self) -> Result<Credentials, Vec<String>> {
        let mut errors = Vec::new();

        let email = required(&self.email, "Email", &mut errors);
        if let Some(email) = email {
            check_email(email, &mut errors);
        }

        let password = required(&self.password, "Password", &mut errors);
        if let Some(password) = password {
            let len = password.chars().count();
            if !(PASSWORD_MIN_LENGTH..=PASSWORD_MAX_LENGTH).contains(&len) {
                errors.push(format!(
                    "The Password field must be between {} and {} characters",
                    PASSWORD_MIN_LENGTH, PASSWORD_MAX_LENGTH
                ));
            }
        }

        if self.password.as_deref() != self.password_confirmation.as_deref() {
            errors.push("Passwords must match".to_string());
        }

        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok(Credentials {
                email: email.trim().to_string(),
                password: password.to_string(),
            }),
            _ => Err(errors),
        }
    }
}

impl SignInRequest {
    pub fn validate(&self) -> Result<Credentials, Vec<String>> {
        let mut errors = Vec::new();

        let email = required(&self.email, "Email", &mut errors);
        if let Some(email) = email {
            check_email(email, &mut errors);
        }
        let password = required(&self.password, "Password", &mut errors);

        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok(Credentials {
                email: email.trim().to_string(),
                password: password.to_string(),
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign_up(email: &str, password: &str, confirmation: &str) -> SignUpRequest {
        SignUpRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            password_confirmation: Some(confirmation.to_string()),
        }
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user.example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn test_valid_sign_up() {
        let creds = sign_up("user@example.com", "Str0ng!pass", "Str0ng!pass").validate().unwrap();
        assert_eq!(creds.email, "user@example.com");
    }

    #[test]
    fn test_confirmation_mismatch() {
        let errors = sign_up("user@example.com", "Str0ng!pass", "Other!pass1").validate().unwrap_err();
        assert_eq!(errors, vec!["Passwords must match".to_string()]);
    }

    #[test]
    fn test_password_length_bounds() {
        assert!(sign_up("user@example.com", "Ab1!", "Ab1!").validate().is_err());
        let long = "A1!".repeat(20);
        assert!(sign_up("user@example.com", &long, &long).validate().is_err());
    }

    #[test]
    fn test_sign_in_missing_fields() {
        let errors = SignInRequest::default().validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("Email"));
    }
}
