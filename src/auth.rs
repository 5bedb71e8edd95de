use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::backend::{into_data, Backend, Method};
use crate::error::{Error, Result};
use crate::models::{AuthPayload, Envelope, IdentityUser, User};
use crate::store::{KeyValueStore, IDENTITY_USER_KEY, TOKEN_KEY, USER_KEY};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

pub fn validate_email(email: &str) -> Result<()> {
    if EMAIL_RE.is_match(email.trim()) {
        Ok(())
    } else {
        Err(Error::validation(format!("'{}' is not a valid email address", email)))
    }
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 6 {
        return Err(Error::validation("password must be at least 6 characters"));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::validation("name is required"));
    }
    Ok(())
}

// --- Identity provider session ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

type Listener<'a> = Box<dyn FnMut(Option<&IdentityUser>) + 'a>;

/// Mirror of the identity provider's signed-in user. Listeners are called
/// once on registration with the current state and again on every sign-in
/// or sign-out until they unsubscribe.
pub struct IdentitySession<'a> {
    current: Option<IdentityUser>,
    listeners: Vec<(u64, Listener<'a>)>,
    next_id: u64,
}

impl<'a> IdentitySession<'a> {
    pub fn new(current: Option<IdentityUser>) -> Self {
        Self { current, listeners: Vec::new(), next_id: 0 }
    }

    pub fn current(&self) -> Option<&IdentityUser> {
        self.current.as_ref()
    }

    pub fn subscribe<F>(&mut self, mut listener: F) -> Subscription
    where
        F: FnMut(Option<&IdentityUser>) + 'a,
    {
        listener(self.current.as_ref());
        self.next_id += 1;
        self.listeners.push((self.next_id, Box::new(listener)));
        Subscription(self.next_id)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != subscription.0);
        self.listeners.len() != before
    }

    pub fn sign_in(&mut self, user: IdentityUser) {
        debug!(uid = %user.uid, "identity session signed in");
        self.current = Some(user);
        self.emit();
    }

    pub fn sign_out(&mut self) {
        if self.current.take().is_some() {
            debug!("identity session signed out");
        }
        self.emit();
    }

    fn emit(&mut self) {
        let current = self.current.as_ref();
        for (_, listener) in self.listeners.iter_mut() {
            listener(current);
        }
    }
}

// --- Bespoke backend session ---

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleProfile {
    pub uid: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Email/password session against the backend. The issued token and user
/// are cached in the store and sent as a bearer credential on protected
/// calls. There is no refresh: once the token expires, calls fail with an
/// authentication error until the user logs in again.
pub struct BackendSession<B: Backend, S: KeyValueStore> {
    backend: B,
    store: S,
    token: Option<String>,
    user: Option<User>,
}

impl<B: Backend, S: KeyValueStore> BackendSession<B, S> {
    pub fn new(backend: B, store: S) -> Result<Self> {
        let token = store.get_value(TOKEN_KEY)?;
        let user = store.get_json(USER_KEY)?;
        Ok(Self { backend, store, token, user })
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn cached_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn register(&mut self, name: &str, email: &str, password: &str) -> Result<User> {
        validate_name(name)?;
        validate_email(email)?;
        validate_password(password)?;
        let body = json!({ "name": name.trim(), "email": email.trim(), "password": password });
        self.authenticate("/auth/register", &body)
    }

    pub fn login(&mut self, email: &str, password: &str) -> Result<User> {
        validate_email(email)?;
        if password.is_empty() {
            return Err(Error::validation("password is required"));
        }
        let body = json!({ "email": email.trim(), "password": password });
        self.authenticate("/auth/login", &body)
    }

    pub fn google(&mut self, profile: &GoogleProfile) -> Result<User> {
        validate_email(&profile.email)?;
        validate_name(&profile.name)?;
        let body = serde_json::to_value(profile)?;
        self.authenticate("/auth/google", &body)
    }

    pub fn profile(&mut self) -> Result<User> {
        let envelope = self.protected(Method::Get, "/auth/profile", None)?;
        let user: User = into_data(envelope)?;
        self.cache_user(&user)?;
        Ok(user)
    }

    pub fn update_profile(&mut self, update: &ProfileUpdate) -> Result<User> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        let body = serde_json::to_value(update)?;
        let envelope = self.protected(Method::Patch, "/auth/profile", Some(&body))?;
        let user: User = into_data(envelope)?;
        self.cache_user(&user)?;
        info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    /// Tells the backend and drops the local session. The local session is
    /// cleared even when the backend call fails.
    pub fn logout(&mut self) -> Result<()> {
        if let Some(token) = self.token.clone() {
            if let Err(err) = self.backend.send(Method::Post, "/auth/logout", None, Some(&token)) {
                warn!(error = %err, "backend logout failed, clearing local session anyway");
            }
        }
        self.clear()
    }

    pub fn delete_account(&mut self) -> Result<()> {
        self.protected(Method::Delete, "/auth/delete-user", None)?;
        info!("account deleted");
        self.clear()
    }

    /// Removes only the backend's database record for the cached user.
    pub fn delete_account_record(&mut self) -> Result<()> {
        let email = self
            .user
            .as_ref()
            .map(|u| u.email.clone())
            .ok_or_else(|| Error::auth("no cached user; log in first"))?;
        let body = json!({ "email": email });
        self.protected(Method::Delete, "/auth/delete-user-db", Some(&body))?;
        info!(%email, "account record deleted");
        self.clear()
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let envelope = self.protected(Method::Get, "/auth/users", None)?;
        into_data(envelope)
    }

    /// Sends a request carrying the session token.
    pub fn protected(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Envelope<Value>> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| Error::auth("no session token; log in first"))?;
        self.backend.send(method, path, body, Some(token))
    }

    fn authenticate(&mut self, path: &str, body: &Value) -> Result<User> {
        let envelope = self.backend.send(Method::Post, path, Some(body), None)?;
        let payload: AuthPayload = into_data(envelope)?;
        self.store.set_value(TOKEN_KEY, &payload.token)?;
        self.token = Some(payload.token);
        self.cache_user(&payload.user)?;
        info!(user_id = %payload.user.id, "backend session started");
        Ok(payload.user)
    }

    fn cache_user(&mut self, user: &User) -> Result<()> {
        self.store.put_json(USER_KEY, user)?;
        self.user = Some(user.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.store.remove_value(TOKEN_KEY)?;
        self.store.remove_value(USER_KEY)?;
        self.token = None;
        self.user = None;
        Ok(())
    }
}

// --- Bridge ---

/// Both auth providers side by side. Their session states are tracked
/// separately and may disagree; callers pick which one they need.
pub struct AuthBridge<'a, B: Backend, S: KeyValueStore> {
    identity: IdentitySession<'a>,
    backend: BackendSession<B, S>,
}

impl<'a, B: Backend, S: KeyValueStore> AuthBridge<'a, B, S> {
    pub fn new(backend: B, store: S) -> Result<Self> {
        let identity_user: Option<IdentityUser> = store.get_json(IDENTITY_USER_KEY)?;
        Ok(Self {
            identity: IdentitySession::new(identity_user),
            backend: BackendSession::new(backend, store)?,
        })
    }

    pub fn identity(&self) -> &IdentitySession<'a> {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut IdentitySession<'a> {
        &mut self.identity
    }

    pub fn backend(&self) -> &BackendSession<B, S> {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut BackendSession<B, S> {
        &mut self.backend
    }

    /// Owner id for per-user local state: the identity provider's uid when
    /// signed in there, otherwise the backend user id.
    pub fn active_user_id(&self) -> Option<String> {
        self.identity
            .current()
            .map(|u| u.uid.clone())
            .or_else(|| self.backend.cached_user().map(|u| u.id.clone()))
    }

    /// Signs in with a Google profile on both providers.
    pub fn sign_in_with_google(&mut self, profile: &GoogleProfile) -> Result<User> {
        let user = self.backend.google(profile)?;
        let identity_user = IdentityUser {
            uid: profile.uid.clone(),
            email: Some(profile.email.clone()),
            display_name: Some(profile.name.clone()),
            photo_url: profile.photo_url.clone(),
        };
        self.backend.store().put_json(IDENTITY_USER_KEY, &identity_user)?;
        self.identity.sign_in(identity_user);
        Ok(user)
    }

    pub fn sign_out(&mut self) -> Result<()> {
        self.backend.store().remove_value(IDENTITY_USER_KEY)?;
        self.identity.sign_out();
        self.backend.logout()
    }
}
