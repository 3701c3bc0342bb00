//! Authentication view model

use reminders_core::{AccountService, AuthUser};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

/// Login/register form state
pub struct AuthViewModel {
    accounts: AccountService,
    mode: AuthMode,
    email: String,
    password: String,
    error: Option<String>,
}

impl AuthViewModel {
    pub fn new(accounts: AccountService) -> Self {
        Self {
            accounts,
            mode: AuthMode::Login,
            email: String::new(),
            password: String::new(),
            error: None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_mode(&mut self, mode: AuthMode) {
        self.mode = mode;
        self.error = None;
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
        self.error = None;
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
        self.error = None;
    }

    /// Run login or register. Failures land in `error()`.
    pub fn submit(&mut self) -> Option<AuthUser> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            self.error = Some("Please fill in all fields".into());
            return None;
        }

        let result = match self.mode {
            AuthMode::Login => self.accounts.login(&self.email, &self.password),
            AuthMode::Register => self.accounts.register(&self.email, &self.password),
        };

        match result {
            Ok(user) => {
                self.error = None;
                self.password.clear();
                Some(user)
            }
            Err(e) => {
                tracing::debug!(mode = ?self.mode, error = %e, "Authentication failed");
                self.error = Some(e.to_string());
                None
            }
        }
    }
}
