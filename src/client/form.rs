use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use super::api::AuthApi;
use crate::users::SafeUser;

/// Where the client goes after a successful login or signup.
pub const HOME_ROUTE: &str = "/home";

const MISSING_CREDENTIALS: &str = "Please enter a username and password";
const PASSWORD_MISMATCH: &str = "Passwords do not match";

/// Signed-in user shared across the client.
pub type UserContext = Arc<RwLock<Option<SafeUser>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Login,
    Signup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Submission succeeded; the caller should route here.
    Navigate(String),
    /// Local validation failed; nothing was sent.
    Invalid,
    /// The remote call failed; `AuthForm::error` holds its message.
    Failed,
}

/// Form state behind the login and signup screens.
#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub username: String,
    pub password: String,
    pub password_confirmation: String,
    pub show_password: bool,
    pub error: Option<String>,
}

impl AuthForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_username(&mut self, value: impl Into<String>) {
        self.username = value.into();
    }

    pub fn set_password(&mut self, value: impl Into<String>) {
        self.password = value.into();
    }

    pub fn set_password_confirmation(&mut self, value: impl Into<String>) {
        self.password_confirmation = value.into();
    }

    pub fn toggle_password_visibility(&mut self) {
        self.show_password = !self.show_password;
    }

    fn validate(&self, mode: FormMode) -> Result<(), &'static str> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(MISSING_CREDENTIALS);
        }
        if mode == FormMode::Signup && self.password != self.password_confirmation {
            return Err(PASSWORD_MISMATCH);
        }
        Ok(())
    }

    pub async fn submit(
        &mut self,
        mode: FormMode,
        api: &dyn AuthApi,
        context: &UserContext,
    ) -> SubmitOutcome {
        self.error = None;

        if let Err(msg) = self.validate(mode) {
            self.error = Some(msg.to_string());
            return SubmitOutcome::Invalid;
        }

        let result = match mode {
            FormMode::Login => api.login(&self.username, &self.password).await,
            FormMode::Signup => api.signup(&self.username, &self.password).await,
        };

        match result {
            Ok(user) => {
                info!(username = %user.username, ?mode, "authenticated");
                *context.write().await = Some(user);
                SubmitOutcome::Navigate(HOME_ROUTE.to_string())
            }
            Err(e) => {
                warn!(error = %e, ?mode, "auth submit failed");
                self.error = Some(e.to_string());
                SubmitOutcome::Failed
            }
        }
    }
}
