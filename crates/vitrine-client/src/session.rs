//! Session: authentication flows and the observable login state.
//!
//! Sign-in talks to the auth collaborator, persists the login in the session
//! preferences, then resolves the user record remote-first: a forced remote
//! fetch (admin flag normalized) merged into the cache, the cached row as
//! fallback, and a freshly created default row — pushed to the remote store —
//! when both are absent (first login on this device).

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use vitrine_cloud::{AuthClient, CloudError, RemoteStore};
use vitrine_shared::constants::MIN_PASSWORD_LEN;
use vitrine_shared::{SessionPrefs, User};

use crate::core::{lock, Db};
use crate::error::{Result, ShopError};
use crate::reconciler;

struct SessionInner {
    db: Db,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthClient>,
    prefs_tx: watch::Sender<SessionPrefs>,
    user_tx: watch::Sender<Option<User>>,
}

#[derive(Clone)]
pub struct SessionService {
    inner: Arc<SessionInner>,
}

impl SessionService {
    /// Load the persisted login state and the matching cached user.
    pub fn new(db: Db, remote: Arc<dyn RemoteStore>, auth: Arc<dyn AuthClient>) -> Result<Self> {
        let (prefs, user) = {
            let guard = lock(&db)?;
            let prefs = guard.session_prefs()?;
            let user = match prefs.active_user() {
                Some(user_id) => guard.user_by_id(user_id)?,
                None => None,
            };
            (prefs, user)
        };

        let (prefs_tx, _) = watch::channel(prefs);
        let (user_tx, _) = watch::channel(user);

        Ok(Self {
            inner: Arc::new(SessionInner {
                db,
                remote,
                auth,
                prefs_tx,
                user_tx,
            }),
        })
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Observe the persisted session preferences.
    pub fn prefs(&self) -> watch::Receiver<SessionPrefs> {
        self.inner.prefs_tx.subscribe()
    }

    /// Observe the current user (`None` when logged out).
    pub fn current_user(&self) -> watch::Receiver<Option<User>> {
        self.inner.user_tx.subscribe()
    }

    /// The current user right now.
    pub fn current_user_now(&self) -> Option<User> {
        self.inner.user_tx.borrow().clone()
    }

    /// The email remembered for login prefill, empty when none.
    pub fn remembered_email(&self) -> String {
        self.inner.prefs_tx.borrow().remember_me_email.clone()
    }

    /// Re-read the active user row from the cache and republish it.
    pub fn refresh_current_user(&self) -> Result<()> {
        let prefs = self.inner.prefs_tx.borrow().clone();
        let user = match prefs.active_user() {
            Some(user_id) => lock(&self.inner.db)?.user_by_id(user_id)?,
            None => None,
        };
        self.inner.user_tx.send_replace(user);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Flows
    // ------------------------------------------------------------------

    /// Sign in with email and password.
    pub async fn sign_in(&self, email: &str, password: &str, remember_me: bool) -> Result<User> {
        let email = email.trim();
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ShopError::Validation(
                "Please enter email and password.".into(),
            ));
        }

        let identity = self
            .inner
            .auth
            .sign_in(email, password)
            .await
            .map_err(auth_error)?;

        let prefs = SessionPrefs {
            logged_in: true,
            user_id: identity.user_id.clone(),
            remember_me_email: if remember_me {
                email.to_string()
            } else {
                String::new()
            },
        };
        lock(&self.inner.db)?.save_session_prefs(&prefs)?;
        self.inner.prefs_tx.send_replace(prefs);

        // Remote-first user resolution, cache fallback, bootstrap creation.
        let user = match reconciler::reconcile_user_on_demand(
            &self.inner.db,
            &self.inner.remote,
            &identity.user_id,
        )
        .await?
        {
            Some(user) => user,
            None => {
                let user = User {
                    id: identity.user_id.clone(),
                    email: identity.email.clone(),
                    name: identity.email.split('@').next().unwrap_or("").to_string(),
                    is_admin: false,
                };
                reconciler::push_user(&self.inner.db, &self.inner.remote, &user)?;
                info!(user = %user.id, "created user record at first sign-in");
                user
            }
        };

        self.inner.user_tx.send_replace(Some(user.clone()));
        info!(user = %user.id, "signed in");
        Ok(user)
    }

    /// Create an account.  The new user record is written locally and pushed
    /// to the remote store; registering does not log the user in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let name = name.trim();
        let email = email.trim();
        let password = password.trim();

        if name.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ShopError::Validation(
                "Please fill in all required fields.".into(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ShopError::Validation(
                "Password must be at least 6 characters long.".into(),
            ));
        }

        let identity = self
            .inner
            .auth
            .create_account(email, password)
            .await
            .map_err(auth_error)?;

        let user = User {
            id: identity.user_id,
            email: identity.email,
            name: name.to_string(),
            is_admin: false,
        };
        reconciler::push_user(&self.inner.db, &self.inner.remote, &user)?;

        info!(user = %user.id, "account registered");
        Ok(user)
    }

    /// Log out.  The remembered email survives for the next login prefill.
    pub fn sign_out(&self) -> Result<()> {
        let mut prefs = self.inner.prefs_tx.borrow().clone();
        prefs.logged_in = false;
        prefs.user_id.clear();

        lock(&self.inner.db)?.save_session_prefs(&prefs)?;
        self.inner.prefs_tx.send_replace(prefs);
        self.inner.user_tx.send_replace(None);

        info!("signed out");
        Ok(())
    }
}

fn auth_error(e: CloudError) -> ShopError {
    match e {
        CloudError::Auth(message) => ShopError::Auth(message),
        other => ShopError::Cloud(other),
    }
}
