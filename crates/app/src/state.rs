//! Application state management

use std::sync::Arc;

use reminders_core::{
    AccountService, AppConfig, AuthProvider, AuthUser, DocumentStore, LocalAuthProvider,
    ProfileStore, Result, RoomService, UserProfile,
};

use crate::navigation::{resolve_route, Route};

/// Services shared by every view model
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<dyn AuthProvider>,
    pub accounts: AccountService,
    pub profiles: ProfileStore,
    pub rooms: RoomService,
}

impl AppState {
    /// Open the configured store and wire the services over it
    pub fn new(config: &AppConfig) -> Result<Self> {
        let store = config.open_store()?;
        Ok(Self::with_store(store, config))
    }

    pub fn with_store(store: Arc<dyn DocumentStore>, config: &AppConfig) -> Self {
        let auth: Arc<dyn AuthProvider> =
            Arc::new(LocalAuthProvider::new(store.clone(), &config.auth));
        let profiles = ProfileStore::new(store.clone());
        let accounts = AccountService::new(auth.clone(), profiles.clone());
        let rooms = RoomService::with_config(store, profiles.clone(), &config.pairing);

        Self {
            auth,
            accounts,
            profiles,
            rooms,
        }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.auth.current_user()
    }

    pub fn current_profile(&self) -> Result<Option<UserProfile>> {
        match self.current_user() {
            Some(user) => self.profiles.get_profile(user.uid),
            None => Ok(None),
        }
    }

    /// Screen for the current auth and room state
    pub fn route(&self) -> Result<Route> {
        let user = self.current_user();
        let profile = self.current_profile()?;
        Ok(resolve_route(user.as_ref(), profile.as_ref()))
    }
}
