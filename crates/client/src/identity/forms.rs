//! Sign-in and registration form validation.
//!
//! Runs before any request reaches the identity provider, so obvious mistakes
//! get an immediate message.

use thiserror::Error;
use tote_core::{Email, EmailError};

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Demo account offered on the sign-in form.
pub const DEMO_EMAIL: &str = "demo@example.com";

/// Password of the demo account.
pub const DEMO_PASSWORD: &str = "password123";

/// Form validation failures, displayed as the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("Please enter both email and password")]
    MissingCredentials,

    #[error("Please fill all fields")]
    MissingFields,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password should be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    #[error("Invalid email address")]
    InvalidEmail(#[source] EmailError),
}

/// Profile details collected at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
}

/// Sign-in form contents.
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    /// The form pre-filled with the demo account.
    #[must_use]
    pub fn demo() -> Self {
        Self {
            email: DEMO_EMAIL.to_string(),
            password: DEMO_PASSWORD.to_string(),
        }
    }

    /// Check the form and return the parsed email.
    ///
    /// # Errors
    ///
    /// Returns `FormError::MissingCredentials` if either field is blank, or
    /// `FormError::InvalidEmail` if the email does not parse.
    pub fn validate(&self) -> Result<Email, FormError> {
        if is_blank(&self.email) || self.password.is_empty() {
            return Err(FormError::MissingCredentials);
        }
        Email::parse(&self.email).map_err(FormError::InvalidEmail)
    }
}

/// Registration form contents.
#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegisterForm {
    /// Check the form and return the parsed email and profile.
    ///
    /// Checks run in order: every field filled, passwords match, password
    /// length, email format.
    ///
    /// # Errors
    ///
    /// Returns the first `FormError` encountered.
    pub fn validate(&self) -> Result<(Email, Profile), FormError> {
        let fields = [
            &self.first_name,
            &self.last_name,
            &self.email,
            &self.password,
            &self.confirm_password,
        ];
        if fields.iter().any(|field| is_blank(field)) {
            return Err(FormError::MissingFields);
        }

        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }

        if self.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(FormError::PasswordTooShort);
        }

        let email = Email::parse(&self.email).map_err(FormError::InvalidEmail)?;

        Ok((
            email,
            Profile {
                first_name: self.first_name.trim().to_string(),
                last_name: self.last_name.trim().to_string(),
            },
        ))
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
