use std::sync::Arc;
use std::time::Duration;

use pseudo_remote::{AuthClient, User};

use crate::{AutosaveHandle, ErrorClass, SessionError, SharedFileSession};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Whether the editor is attached to a user's remote file store.
pub enum SessionMode {
    #[default]
    Anonymous,
    Authenticated(User),
}

impl SessionMode {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationForm {
    pub username: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Switches the file session between anonymous and authenticated operation.
///
/// Entering Authenticated loads the user's files and starts autosave; leaving
/// it stops autosave before the cache is reset, so nothing is written to a
/// store the user is no longer attached to.
pub struct SessionModeController {
    auth: Arc<dyn AuthClient>,
    files: SharedFileSession,
    mode: SessionMode,
    autosave: Option<AutosaveHandle>,
    autosave_interval: Duration,
}

impl SessionModeController {
    pub async fn new(auth: Arc<dyn AuthClient>, files: SharedFileSession) -> Self {
        let autosave_interval = files.lock().await.config().autosave_interval;
        Self {
            auth,
            files,
            mode: SessionMode::Anonymous,
            autosave: None,
            autosave_interval,
        }
    }

    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    pub fn files(&self) -> &SharedFileSession {
        &self.files
    }

    pub fn autosave_running(&self) -> bool {
        self.autosave
            .as_ref()
            .is_some_and(AutosaveHandle::is_running)
    }

    /// Checks for an existing server session; any failure leaves the editor anonymous.
    pub async fn initialize(&mut self) -> &SessionMode {
        match self.auth.status().await {
            Ok(status) => match status.user.filter(|_| status.logged_in) {
                Some(user) => self.enter_authenticated(user).await,
                None => self.enter_anonymous().await,
            },
            Err(error) => {
                tracing::warn!(
                    error_class = remote_class(&error).as_str(),
                    %error,
                    "session status check failed; continuing anonymously"
                );
                self.enter_anonymous().await;
            }
        }
        &self.mode
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<User, SessionError> {
        let user = self.auth.login(username.trim(), password).await?;
        self.enter_authenticated(user.clone()).await;
        Ok(user)
    }

    /// Registers a new account; a confirmation mismatch is refused without a network call.
    pub async fn register(&mut self, form: &RegistrationForm) -> Result<User, SessionError> {
        if form.password != form.password_confirmation {
            return Err(SessionError::PasswordMismatch);
        }
        let user = self
            .auth
            .register(form.username.trim(), &form.password)
            .await?;
        self.enter_authenticated(user.clone()).await;
        Ok(user)
    }

    /// Signs out. A failing remote logout is logged; the editor goes anonymous regardless.
    pub async fn logout(&mut self) {
        if let Err(error) = self.auth.logout().await {
            tracing::warn!(
                error_class = remote_class(&error).as_str(),
                %error,
                "remote logout failed"
            );
        }
        self.enter_anonymous().await;
    }

    async fn enter_authenticated(&mut self, user: User) {
        tracing::info!(username = user.username.as_str(), "session authenticated");
        self.mode = SessionMode::Authenticated(user);
        self.stop_autosave().await;
        {
            let mut files = self.files.lock().await;
            files.enable_remote_sync();
            if let Err(error) = files.load_all().await {
                tracing::warn!(
                    error_class = error.class().as_str(),
                    %error,
                    "loading remote files failed; retrying on the next autosave tick"
                );
            }
        }
        self.autosave = Some(AutosaveHandle::spawn(
            self.files.clone(),
            self.autosave_interval,
        ));
    }

    async fn enter_anonymous(&mut self) {
        self.stop_autosave().await;
        let was_authenticated = self.mode.is_authenticated();
        self.mode = SessionMode::Anonymous;
        if was_authenticated {
            self.files.lock().await.enter_anonymous();
            tracing::info!("session anonymous");
        }
    }

    async fn stop_autosave(&mut self) {
        if let Some(handle) = self.autosave.take() {
            handle.stop().await;
        }
    }
}

fn remote_class(error: &pseudo_remote::RemoteError) -> ErrorClass {
    if error.is_rejection() {
        ErrorClass::RemoteRejection
    } else {
        ErrorClass::NetworkFailure
    }
}
