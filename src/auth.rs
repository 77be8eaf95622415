//! Identity provider.
//!
//! [`Identity`] owns the current session explicitly; there is no process-wide auth
//! state. Passwords are stored as argon2 PHC hashes. Session changes are published on
//! a `tokio::sync::watch` channel; a [`BudgetData`](crate::budget_data::BudgetData)
//! handle follows them through `apply_session`.

use crate::{
    config::{AppConfig, AuthConfig, MAX_SESSION_TTL_HOURS, modules::ModuleConfig},
    core::module::seed_system_modules,
    entities::{profile, user},
    errors::{Error, Result},
    store::BudgetStore,
};
use argon2::{
    Argon2,
    password_hash::{
        Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
};
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// Name of the profile created at sign-up
pub const PRIMARY_PROFILE_NAME: &str = "Primary";
const MIN_PASSWORD_LEN: usize = 6;
/// Longest profile name, in characters
pub const MAX_PROFILE_NAME_LEN: usize = 64;

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// The signed-in user
    pub user: user::Model,
    /// Opaque session token
    pub access_token: String,
    /// When the session stops being valid
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has run out.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Sign-up, sign-in and profile management over a [`BudgetStore`].
pub struct Identity {
    store: Arc<dyn BudgetStore>,
    session: watch::Sender<Option<Session>>,
    session_ttl: Duration,
    modules: Vec<ModuleConfig>,
}

impl Identity {
    /// Creates a signed-out identity provider.
    ///
    /// `modules` is the catalog seeded as system modules for every new user. The session
    /// lifetime is clamped to `0..=MAX_SESSION_TTL_HOURS`.
    #[must_use]
    pub fn new(store: Arc<dyn BudgetStore>, auth: &AuthConfig, modules: Vec<ModuleConfig>) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            store,
            session,
            session_ttl: Duration::hours(auth.session_ttl_hours.clamp(0, MAX_SESSION_TTL_HOURS)),
            modules,
        }
    }

    /// Creates a signed-out identity provider from the application config.
    #[must_use]
    pub fn from_config(store: Arc<dyn BudgetStore>, config: &AppConfig) -> Self {
        Self::new(store, &config.auth, config.modules.clone())
    }

    /// The store this provider writes users and profiles to.
    #[must_use]
    pub fn store(&self) -> Arc<dyn BudgetStore> {
        Arc::clone(&self.store)
    }

    /// Registers a user and signs them in.
    ///
    /// Also creates the primary profile and seeds the system budget modules.
    ///
    /// # Errors
    /// * `Validation` for a malformed email or a too short password
    /// * `Auth` if the email is already registered or hashing fails
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<Session> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::validation(
                "password",
                format!("must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }
        if self.store.find_user_by_email(&email).await?.is_some() {
            return Err(Error::Auth {
                message: "User already exists".to_string(),
            });
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::Auth {
                message: format!("Failed to hash password: {e}"),
            })?
            .to_string();

        let now = Utc::now();
        let full_name = full_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let user = self
            .store
            .insert_user(
                user::Model {
                    id: Uuid::new_v4().to_string(),
                    email,
                    full_name: full_name.clone(),
                    created_at: now,
                    updated_at: now,
                },
                password_hash,
            )
            .await?;

        self.store
            .insert_profile(profile::Model {
                id: Uuid::new_v4().to_string(),
                user_id: user.id.clone(),
                profile_name: PRIMARY_PROFILE_NAME.to_string(),
                display_name: Some(full_name.unwrap_or_else(|| "Primary Profile".to_string())),
                is_primary: true,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
        seed_system_modules(self.store.as_ref(), &user.id, &self.modules).await?;

        info!(user_id = %user.id, "Signed up");
        Ok(self.start_session(user))
    }

    /// Signs in with email and password.
    ///
    /// Unknown emails and wrong passwords fail the same way.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let invalid = || Error::Auth {
            message: "Invalid email or password".to_string(),
        };
        let email = email.trim().to_lowercase();

        let Some(user) = self.store.find_user_by_email(&email).await? else {
            warn!("Sign-in with unknown email");
            return Err(invalid());
        };
        let stored = self
            .store
            .find_password_hash(&user.id)
            .await?
            .ok_or_else(invalid)?;

        let parsed = PasswordHash::new(&stored).map_err(|e| Error::Auth {
            message: format!("Stored password hash is invalid: {e}"),
        })?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map_err(|err| match err {
                PasswordHashError::Password => {
                    warn!(user_id = %user.id, "Sign-in with wrong password");
                    invalid()
                }
                other => Error::Auth {
                    message: format!("Password verification failed: {other}"),
                },
            })?;

        info!(user_id = %user.id, "Signed in");
        Ok(self.start_session(user))
    }

    /// Ends the current session, if any.
    pub fn sign_out(&self) {
        if self.session.send_replace(None).is_some() {
            info!("Signed out");
        }
    }

    /// The live session. An expired session is cleared and reported as `None`.
    pub fn session(&self) -> Option<Session> {
        let current = self.session.borrow().clone();
        match current {
            Some(session) if session.is_expired() => {
                info!(user_id = %session.user.id, "Session expired");
                self.session.send_replace(None);
                None
            }
            other => other,
        }
    }

    /// Id of the signed-in user.
    pub fn current_user_id(&self) -> Option<String> {
        self.session().map(|s| s.user.id)
    }

    /// Receives every session change (sign-up, sign-in, sign-out, expiry).
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    fn start_session(&self, user: user::Model) -> Session {
        let session = Session {
            user,
            access_token: Uuid::new_v4().to_string(),
            expires_at: Utc::now()
                .checked_add_signed(self.session_ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.session.send_replace(Some(session.clone()));
        session
    }

    /// Creates a non-primary profile for the signed-in user.
    ///
    /// Returns `Ok(None)` when nobody is signed in.
    ///
    /// # Errors
    /// * `Validation` for an empty or too long name, or a name the user already has
    pub async fn create_profile(
        &self,
        profile_name: &str,
        display_name: Option<&str>,
    ) -> Result<Option<profile::Model>> {
        let Some(user_id) = self.current_user_id() else {
            return Ok(None);
        };
        let profile_name = profile_name.trim();
        if profile_name.is_empty() {
            return Err(Error::validation("profile_name", "must not be empty"));
        }
        if profile_name.chars().count() > MAX_PROFILE_NAME_LEN {
            return Err(Error::validation(
                "profile_name",
                format!("must be at most {MAX_PROFILE_NAME_LEN} characters"),
            ));
        }
        let existing = self.store.list_profiles(&user_id).await?;
        if existing.iter().any(|p| p.profile_name == profile_name) {
            return Err(Error::validation(
                "profile_name",
                format!("a profile named {profile_name} already exists"),
            ));
        }

        let now = Utc::now();
        let profile = self
            .store
            .insert_profile(profile::Model {
                id: Uuid::new_v4().to_string(),
                user_id,
                profile_name: profile_name.to_string(),
                display_name: display_name.map(str::to_string),
                is_primary: false,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await?;
        info!(profile_id = %profile.id, "Created profile");
        Ok(Some(profile))
    }

    /// Active profiles of the signed-in user, primary first, then oldest first.
    ///
    /// Empty when nobody is signed in.
    pub async fn list_profiles(&self) -> Result<Vec<profile::Model>> {
        let Some(user_id) = self.current_user_id() else {
            return Ok(Vec::new());
        };
        let mut profiles: Vec<profile::Model> = self
            .store
            .list_profiles(&user_id)
            .await?
            .into_iter()
            .filter(|p| p.is_active)
            .collect();
        profiles.sort_by_key(|p| (!p.is_primary, p.created_at));
        Ok(profiles)
    }

    /// The signed-in user's primary profile.
    pub async fn primary_profile(&self) -> Result<Option<profile::Model>> {
        Ok(self
            .list_profiles()
            .await?
            .into_iter()
            .find(|p| p.is_primary))
    }

    /// Soft-deactivates a profile of the signed-in user.
    ///
    /// Returns `Ok(None)` when nobody is signed in.
    ///
    /// # Errors
    /// * `NotFound` if the profile is not the user's
    /// * `Validation` for the primary profile
    pub async fn deactivate_profile(&self, profile_id: &str) -> Result<Option<profile::Model>> {
        let Some(user_id) = self.current_user_id() else {
            return Ok(None);
        };
        let profile = self
            .store
            .find_profile(&user_id, profile_id)
            .await?
            .ok_or_else(|| Error::not_found("profile", profile_id))?;
        if profile.is_primary {
            return Err(Error::validation(
                "profile_id",
                "the primary profile cannot be deactivated",
            ));
        }

        let profile = self
            .store
            .update_profile(profile::Model {
                is_active: false,
                updated_at: Utc::now(),
                ..profile
            })
            .await?;
        info!(profile_id, "Deactivated profile");
        Ok(Some(profile))
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        });
    if !valid {
        return Err(Error::validation("email", format!("`{email}` is not an email address")));
    }
    Ok(email)
}
