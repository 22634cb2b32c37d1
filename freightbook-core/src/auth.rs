//! Credential sign-in, user profiles and session change notifications.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::TokenConfig;
use crate::error::{FreightError, Result};
use crate::paths;
use crate::session::{Role, Session, UserProfile};
use crate::store::state::{Document, from_document};
use crate::store::{DocumentStore, WriteBatch};

pub const MIN_PASSWORD_LEN: usize = 6;
const BAD_CREDENTIALS: &str = "invalid email or password";

pub type SessionListener = Arc<dyn Fn(Option<&Session>) + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Stored at `credentials/{email}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Credential {
    uid: String,
    password_hash: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: u64,
    pub iat: u64,
    pub jti: String,
    pub aud: String,
    pub iss: String,
}

pub struct AuthService {
    store: Arc<dyn DocumentStore>,
    tokens: TokenConfig,
    current: RwLock<Option<Session>>,
    listeners: DashMap<u64, SessionListener>,
    next_listener: AtomicU64,
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_ascii_lowercase();
    if email.is_empty() || !email.contains('@') || email.contains('/') {
        return Err(FreightError::AuthFailure(format!("`{email}` is not a valid email")));
    }
    Ok(email)
}

fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; 16];
    getrandom::getrandom(&mut salt)
        .map_err(|e| FreightError::AuthFailure(format!("salt generation: {e}")))?;
    let salt = SaltString::encode_b64(&salt)
        .map_err(|e| FreightError::AuthFailure(format!("salt encoding: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| FreightError::AuthFailure(format!("password hashing: {e}")))
}

fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn unix_seconds() -> u64 {
    OffsetDateTime::now_utc().unix_timestamp().max(0) as u64
}

impl AuthService {
    pub fn new(store: Arc<dyn DocumentStore>, tokens: TokenConfig) -> Self {
        Self {
            store,
            tokens,
            current: RwLock::new(None),
            listeners: DashMap::new(),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().ok().and_then(|s| s.clone())
    }

    /// Call `listener` with the new session every time it changes.
    pub fn subscribe(
        &self,
        listener: impl Fn(Option<&Session>) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, Arc::new(listener));
        SubscriptionId(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id.0).is_some()
    }

    fn set_current(&self, session: Option<Session>) {
        match self.current.write() {
            Ok(mut guard) => *guard = session.clone(),
            Err(poisoned) => *poisoned.into_inner() = session.clone(),
        }
        // Listeners run outside every lock so they may call back into the service.
        let listeners: Vec<SessionListener> =
            self.listeners.iter().map(|e| e.value().clone()).collect();
        for listener in listeners {
            listener(session.as_ref());
        }
    }

    fn credential(&self, email: &str) -> Result<Option<Credential>> {
        match self.store.get(&paths::credential(email)?)? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Read the profile of `uid` into a session without signing it in.
    pub fn load_session(&self, uid: &str) -> Result<Session> {
        let doc = self
            .store
            .get(&paths::user(uid)?)?
            .ok_or_else(|| FreightError::NotFound(format!("user {uid}")))?;
        Ok(Session {
            uid: uid.to_string(),
            profile: from_document(doc)?,
        })
    }

    fn create_user(&self, email: &str, password: &str, display_name: &str, role: Role) -> Result<Session> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(FreightError::AuthFailure(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let uid = self.store.new_id();
        let profile = UserProfile {
            email: email.to_string(),
            display_name: display_name.trim().to_string(),
            role,
            company: String::new(),
        };
        let cred = Credential {
            uid: uid.clone(),
            password_hash: hash_password(password)?,
        };
        let mut batch = WriteBatch::new();
        batch.create(paths::credential(email)?, &cred)?;
        batch.insert(paths::user(&uid)?, &profile)?;
        self.store.commit(batch).map_err(|e| match e {
            FreightError::WriteFailure(_) => {
                FreightError::AuthFailure("email is already registered".into())
            }
            other => other,
        })?;
        info!(uid = %uid, role = %role, "user created");
        Ok(Session { uid, profile })
    }

    /// Register a new viewer account and sign it in.
    pub fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        if self.credential(&email)?.is_some() {
            return Err(FreightError::AuthFailure("email is already registered".into()));
        }
        let session = self.create_user(&email, password, display_name, Role::Viewer)?;
        self.set_current(Some(session.clone()));
        Ok(session)
    }

    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email)?;
        let Some(cred) = self.credential(&email)? else {
            warn!("sign-in for unknown email");
            return Err(FreightError::AuthFailure(BAD_CREDENTIALS.into()));
        };
        if !verify_password(password, &cred.password_hash) {
            warn!(uid = %cred.uid, "sign-in with wrong password");
            return Err(FreightError::AuthFailure(BAD_CREDENTIALS.into()));
        }
        let session = self
            .load_session(&cred.uid)
            .map_err(|_| FreightError::AuthFailure(format!("no profile for {}", cred.uid)))?;
        info!(uid = %session.uid, role = %session.role(), "signed in");
        self.set_current(Some(session.clone()));
        Ok(session)
    }

    pub fn sign_out(&self) {
        if self.current().is_some() {
            info!("signed out");
            self.set_current(None);
        }
    }

    /// Create the first admin. Does nothing and returns false once any admin exists.
    pub fn bootstrap_admin(&self, email: &str, password: &str) -> Result<bool> {
        let has_admin = self
            .store
            .list(&paths::users())?
            .into_iter()
            .filter_map(|(_, doc)| from_document::<UserProfile>(doc).ok())
            .any(|p| p.role == Role::Admin);
        if has_admin {
            return Ok(false);
        }

        let email = normalize_email(email)?;
        match self.credential(&email)? {
            Some(cred) => {
                if !verify_password(password, &cred.password_hash) {
                    return Err(FreightError::AuthFailure(BAD_CREDENTIALS.into()));
                }
                self.write_role(&cred.uid, Role::Admin)?;
            }
            None => {
                self.create_user(&email, password, "", Role::Admin)?;
            }
        }
        info!(email = %email, "admin bootstrapped");
        Ok(true)
    }

    fn write_role(&self, uid: &str, role: Role) -> Result<()> {
        let mut fields = Document::new();
        fields.insert("role".into(), Value::String(role.as_str().into()));
        let mut batch = WriteBatch::new();
        batch.update(paths::user(uid)?, fields);
        self.store.commit(batch)
    }

    /// Change another user's role. Only admins may do this.
    pub fn set_role(&self, caller: Option<&Session>, uid: &str, role: Role) -> Result<()> {
        let caller =
            caller.ok_or_else(|| FreightError::PermissionDenied("sign in first".into()))?;
        if caller.role() != Role::Admin {
            return Err(FreightError::PermissionDenied(
                "only admins can change roles".into(),
            ));
        }
        let uid = uid.trim();
        if uid.is_empty() {
            return Err(FreightError::ValidationFailure("user id is required".into()));
        }
        self.load_session(uid)?;
        self.write_role(uid, role)?;
        info!(uid = %uid, role = %role, by = %caller.uid, "role changed");

        if self.current().is_some_and(|s| s.uid == uid) {
            let refreshed = self.load_session(uid)?;
            self.set_current(Some(refreshed));
        }
        Ok(())
    }

    /// Signed token that lets a later process resume `session`.
    pub fn issue_token(&self, session: &Session) -> Result<String> {
        let now = unix_seconds();
        let claims = SessionClaims {
            sub: session.uid.clone(),
            exp: now.saturating_add(self.tokens.ttl_seconds),
            iat: now,
            jti: Uuid::now_v7().simple().to_string(),
            aud: self.tokens.audience.clone(),
            iss: self.tokens.issuer.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.tokens.secret.as_bytes()),
        )
        .map_err(|e| FreightError::AuthFailure(format!("token signing: {e}")))
    }

    /// Verify a token and sign in as its subject with the profile as stored now.
    pub fn resume(&self, token: &str) -> Result<Session> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.tokens.audience.as_str()]);
        validation.set_issuer(&[self.tokens.issuer.as_str()]);
        let data = decode::<SessionClaims>(
            token.trim(),
            &DecodingKey::from_secret(self.tokens.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| FreightError::AuthFailure(format!("session token rejected: {e}")))?;

        let session = self
            .load_session(&data.claims.sub)
            .map_err(|_| FreightError::AuthFailure("session user no longer exists".into()))?;
        self.set_current(Some(session.clone()));
        Ok(session)
    }
}
