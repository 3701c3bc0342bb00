//! Authentication provider adapter
//!
//! The identity service is an external collaborator exposing register,
//! login, logout and current-user notifications. `LocalAuthProvider` keeps
//! argon2 credential hashes in the document store.

use std::sync::{Arc, Mutex};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::AuthConfig;
use crate::error::{Error, Result};
use crate::models::{Account, AuthUser};
use crate::profiles::ProfileStore;
use crate::storage::{
    encode, DocumentStore, FieldUpdate, ListenerSet, Subscription, ACCOUNTS_COLLECTION,
};

/// Callback receiving the signed-in user, `None` after sign-out
pub type AuthListener = Box<dyn Fn(Option<AuthUser>) + Send + Sync>;

/// Identity service operations
pub trait AuthProvider: Send + Sync {
    /// Create an account and sign it in
    fn register(&self, email: &str, password: &str) -> Result<AuthUser>;

    fn login(&self, email: &str, password: &str) -> Result<AuthUser>;

    fn logout(&self) -> Result<()>;

    fn current_user(&self) -> Option<AuthUser>;

    /// Observe sign-in state. The listener gets the current user right
    /// away, then every change.
    fn on_auth_state_changed(&self, listener: AuthListener) -> Subscription;
}

/// Auth provider backed by the document store
pub struct LocalAuthProvider {
    store: Arc<dyn DocumentStore>,
    min_password_len: usize,
    current: Mutex<Option<AuthUser>>,
    listeners: ListenerSet<(), Option<AuthUser>>,
}

impl LocalAuthProvider {
    pub fn new(store: Arc<dyn DocumentStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            min_password_len: config.min_password_len,
            current: Mutex::new(None),
            listeners: ListenerSet::new(),
        }
    }

    fn find_account(&self, email: &str) -> Result<Option<Account>> {
        self.store
            .query_eq(ACCOUNTS_COLLECTION, "email", &Value::String(email.to_string()))?
            .first()
            .map(|doc| doc.decode())
            .transpose()
    }

    fn set_current(&self, user: Option<AuthUser>) {
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            if *current == user {
                return;
            }
            *current = user.clone();
        }
        self.listeners.emit(&(), user);
    }

    fn validate(&self, email: &str, password: &str) -> Result<()> {
        let well_formed = match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace)
            }
            None => false,
        };
        if !well_formed {
            return Err(Error::Authentication("Invalid email address".into()));
        }

        if password.chars().count() < self.min_password_len {
            return Err(Error::Authentication(format!(
                "Password must be at least {} characters",
                self.min_password_len
            )));
        }
        Ok(())
    }
}

/// Lowercase and trim an email for lookup
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthProvider for LocalAuthProvider {
    #[instrument(skip(self, password))]
    fn register(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = normalize_email(email);
        self.validate(&email, password)?;

        if self.find_account(&email)?.is_some() {
            return Err(Error::Authentication("Email already in use".into()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|_| Error::Authentication("Failed to hash password".into()))?
            .to_string();

        let account = Account::new(email, password_hash);
        self.store.set(
            ACCOUNTS_COLLECTION,
            &account.uid.to_string(),
            encode(&account)?,
        )?;
        info!(uid = %account.uid, "Account registered");

        let user = account.to_auth_user();
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    #[instrument(skip(self, password))]
    fn login(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = normalize_email(email);
        let invalid = || Error::Authentication("Invalid email or password".into());

        let account = self.find_account(&email)?.ok_or_else(invalid)?;

        let parsed_hash = PasswordHash::new(&account.password_hash).map_err(|_| {
            warn!(uid = %account.uid, "Stored password hash is unreadable");
            invalid()
        })?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .map_err(|_| invalid())?;

        self.store.update(
            ACCOUNTS_COLLECTION,
            &account.uid.to_string(),
            &[FieldUpdate::set("lastLogin", Utc::now().to_rfc3339())],
        )?;
        info!(uid = %account.uid, "Logged in");

        let user = account.to_auth_user();
        self.set_current(Some(user.clone()));
        Ok(user)
    }

    fn logout(&self) -> Result<()> {
        self.set_current(None);
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn on_auth_state_changed(&self, listener: AuthListener) -> Subscription {
        let listener: Arc<dyn Fn(Option<AuthUser>) + Send + Sync> = Arc::from(listener);
        let subscription = self.listeners.add((), listener.clone());
        listener(self.current_user());
        subscription
    }
}

/// Registration plus profile creation
#[derive(Clone)]
pub struct AccountService {
    auth: Arc<dyn AuthProvider>,
    profiles: ProfileStore,
}

impl AccountService {
    pub fn new(auth: Arc<dyn AuthProvider>, profiles: ProfileStore) -> Self {
        Self { auth, profiles }
    }

    /// Register with the provider, then create the user's profile
    pub fn register(&self, email: &str, password: &str) -> Result<AuthUser> {
        let user = self.auth.register(email, password)?;
        self.profiles.create_profile(&user)?;
        Ok(user)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AuthUser> {
        self.auth.login(email, password)
    }

    pub fn logout(&self) -> Result<()> {
        self.auth.logout()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.auth.current_user()
    }

    pub fn provider(&self) -> &Arc<dyn AuthProvider> {
        &self.auth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn setup() -> (Arc<LocalAuthProvider>, AccountService, ProfileStore) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let auth = Arc::new(LocalAuthProvider::new(store.clone(), &AuthConfig::default()));
        let profiles = ProfileStore::new(store);
        let accounts = AccountService::new(auth.clone(), profiles.clone());
        (auth, accounts, profiles)
    }

    #[test]
    fn test_register_creates_profile_and_signs_in() {
        let (auth, accounts, profiles) = setup();

        let user = accounts.register(" Ada@Example.com ", "secret1").unwrap();

        assert_eq!(user.email, "ada@example.com");
        assert_eq!(auth.current_user(), Some(user.clone()));
        let profile = profiles.get_profile(user.uid).unwrap().unwrap();
        assert_eq!(profile.email, "ada@example.com");
        assert!(profile.room_id.is_none());
    }

    #[test]
    fn test_register_validation() {
        let (_, accounts, _) = setup();

        let err = accounts.register("not-an-email", "secret1").unwrap_err();
        assert_eq!(err.to_string(), "Invalid email address");

        let err = accounts.register("ada@example.com", "12345").unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (_, accounts, _) = setup();
        accounts.register("ada@example.com", "secret1").unwrap();

        let err = accounts.register("ADA@example.com", "secret2").unwrap_err();
        assert_eq!(err.to_string(), "Email already in use");
    }

    #[test]
    fn test_login_logout() {
        let (auth, accounts, _) = setup();
        let registered = accounts.register("ada@example.com", "secret1").unwrap();
        accounts.logout().unwrap();
        assert!(auth.current_user().is_none());

        assert!(accounts.login("ada@example.com", "wrong-password").is_err());
        assert!(accounts.login("bob@example.com", "secret1").is_err());
        assert!(auth.current_user().is_none());

        let user = accounts.login("ada@example.com", "secret1").unwrap();
        assert_eq!(user.uid, registered.uid);
        assert_eq!(auth.current_user(), Some(user));
    }

    #[test]
    fn test_auth_state_listener() {
        let (auth, accounts, _) = setup();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let sub = auth.on_auth_state_changed(Box::new(move |user: Option<AuthUser>| {
            sink.lock().unwrap().push(user.map(|u| u.email));
        }));

        accounts.register("ada@example.com", "secret1").unwrap();
        accounts.logout().unwrap();
        // already signed out: no event
        accounts.logout().unwrap();
        drop(sub);
        accounts.login("ada@example.com", "secret1").unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("ada@example.com".to_string()), None]
        );
    }
}
