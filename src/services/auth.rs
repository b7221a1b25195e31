use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::models::{AuthSession, User};
use crate::pocketbase::{RecordService, USERS};

/// Result of a register/login attempt. Failures carry a message fit for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success(AuthSession),
    Failure(String),
}

impl AuthOutcome {
    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failure(message) => Some(message),
            Self::Success(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(User),
}

/// Credential-based sessions against the `users` collection.
#[derive(Clone)]
pub struct AuthService {
    records: Arc<dyn RecordService>,
}

impl AuthService {
    pub fn new(records: Arc<dyn RecordService>) -> Self {
        Self { records }
    }

    /// Create the user, then sign in with the same credentials.
    pub async fn register(&self, email: &str, password: &str, password_confirm: &str, name: &str) -> AuthOutcome {
        info!("Registering user {} (password length {})", email, password.len());

        let body = json!({
            "email": email,
            "password": password,
            "passwordConfirm": password_confirm,
            "name": name,
        });

        if let Err(e) = self.records.create(USERS, &body).await {
            warn!("Registration failed: {}", e);
            return AuthOutcome::Failure(e.user_message());
        }
        info!("User {} created", email);

        self.login(email, password).await
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthOutcome {
        match self.records.auth_with_password(USERS, email, password).await {
            Ok(session) => {
                info!("User {} authenticated", session.user.id);
                AuthOutcome::Success(session)
            }
            Err(e) => {
                warn!("Login failed: {}", e);
                AuthOutcome::Failure(e.user_message())
            }
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn logout(&self) {
        self.records.clear_auth();
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn is_logged_in(&self) -> bool {
        self.records.auth_session().is_some()
    }

    pub fn current_user(&self) -> Option<User> {
        self.records.auth_session().map(|s| s.user)
    }

    pub fn state(&self) -> AuthState {
        match self.current_user() {
            Some(user) => AuthState::Authenticated(user),
            None => AuthState::Anonymous,
        }
    }
}
