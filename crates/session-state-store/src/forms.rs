//! Input validation for the registration form.

use server_api_client::RegisterRequest;
use thiserror::Error;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("Username is required")]
    EmptyUsername,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Registration form as entered by the user.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl RegistrationForm {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            confirm_password: confirm_password.into(),
        }
    }

    /// Check the form before it is sent. The server re-validates.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.username.trim().is_empty() {
            return Err(FormError::EmptyUsername);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FormError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }
        if self.password != self.confirm_password {
            return Err(FormError::PasswordMismatch);
        }
        Ok(())
    }

    pub(crate) fn to_request(&self) -> RegisterRequest {
        RegisterRequest {
            username: self.username.trim().to_string(),
            password: self.password.clone(),
            confirm_password: self.confirm_password.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_form() {
        assert_eq!(
            RegistrationForm::new("alice", "secret1", "secret1").validate(),
            Ok(())
        );
    }

    #[test]
    fn test_empty_username() {
        assert_eq!(
            RegistrationForm::new("   ", "secret1", "secret1").validate(),
            Err(FormError::EmptyUsername)
        );
    }

    #[test]
    fn test_short_password() {
        assert_eq!(
            RegistrationForm::new("alice", "12345", "12345").validate(),
            Err(FormError::PasswordTooShort { min: 6 })
        );
        assert!(RegistrationForm::new("alice", "123456", "123456")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_mismatch() {
        assert_eq!(
            RegistrationForm::new("alice", "secret1", "secret2").validate(),
            Err(FormError::PasswordMismatch)
        );
    }

    #[test]
    fn test_request_trims_username() {
        let request = RegistrationForm::new(" alice ", "secret1", "secret1").to_request();
        assert_eq!(request.username, "alice");
        assert_eq!(request.confirm_password, "secret1");
    }
}
