use anyhow::{bail, Result};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::contacts::User;
use crate::storage::{self, Storage, KEY_CURRENT_USER, KEY_TOKEN, KEY_USERS};

pub const DEMO_EMAIL: &str = "demo@example.com";
pub const DEMO_PASSWORD: &str = "demo123";
pub const DEMO_USER_ID: &str = "demo-user";

/// Session token written on login. Nothing validates it; it only marks an
/// active session, matching the demo's mock-JWT behavior.
const SESSION_TOKEN: &str = "mock-jwt-token";

/// Avatars assigned round-robin-by-chance at registration.
const AVATAR_POOL: [&str; 5] = [
    "https://images.unsplash.com/photo-1535713875002-d1d0cf377fde?w=150&h=150&fit=crop&crop=face",
    "https://images.unsplash.com/photo-1580489944761-15a19d654956?w=150&h=150&fit=crop&crop=face",
    "https://images.unsplash.com/photo-1633332755192-727a05c4013d?w=150&h=150&fit=crop&crop=face",
    "https://images.unsplash.com/photo-1607746882042-944635dfe10e?w=150&h=150&fit=crop&crop=face",
    "https://images.unsplash.com/photo-1573496359142-b8d87734a5a2?w=150&h=150&fit=crop&crop=face",
];

/// A registered account as persisted locally. The password is plaintext:
/// this is a demo credential lookup, not real authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar: String,
}

impl Account {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            is_online: true,
            last_seen: Some(Utc::now()),
        }
    }
}

/// The hardwired account that works without registering.
pub fn demo_user() -> User {
    User {
        id: DEMO_USER_ID.to_string(),
        name: "Demo User".to_string(),
        email: DEMO_EMAIL.to_string(),
        avatar: "/placeholder.svg".to_string(),
        is_online: true,
        last_seen: Some(Utc::now()),
    }
}

/// Authentication over the local key/value store: the registered-account
/// list, the session token and the signed-in user record.
pub struct SessionManager<S: Storage> {
    storage: S,
}

impl<S: Storage> SessionManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn accounts(&self) -> Vec<Account> {
        storage::load_or_default(&self.storage, KEY_USERS)
    }

    /// The signed-in user, if a previous session is still stored.
    pub fn current_user(&self) -> Option<User> {
        self.storage.read(KEY_TOKEN)?;
        storage::load(&self.storage, KEY_CURRENT_USER)
    }

    /// Look up (email, password) in the registered accounts, falling back
    /// to the demo credentials. Success stores the token and user record.
    pub fn login(&mut self, email: &str, password: &str) -> Result<User> {
        let account = self
            .accounts()
            .into_iter()
            .find(|a| a.email == email && a.password == password);

        let user = match account {
            Some(account) => account.to_user(),
            None if email == DEMO_EMAIL && password == DEMO_PASSWORD => demo_user(),
            None => bail!("Invalid credentials. Try {} / {}", DEMO_EMAIL, DEMO_PASSWORD),
        };

        self.open_session(&user)?;
        Ok(user)
    }

    /// Create an account with a random avatar and sign it in.
    pub fn register(&mut self, name: &str, email: &str, password: &str) -> Result<User> {
        if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            bail!("Name, email and password are required");
        }

        let mut accounts = self.accounts();
        if accounts.iter().any(|a| a.email == email) || email == DEMO_EMAIL {
            bail!("An account with that email already exists");
        }

        let mut rng = rand::thread_rng();
        let account = Account {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
            avatar: AVATAR_POOL[rng.gen_range(0..AVATAR_POOL.len())].to_string(),
        };
        accounts.push(account.clone());
        storage::save(&mut self.storage, KEY_USERS, &accounts)?;

        let user = account.to_user();
        self.open_session(&user)?;
        Ok(user)
    }

    /// The reset flow only pretends: it reports that a link was sent.
    pub fn request_password_reset(&self, email: &str) -> String {
        format!("We've sent a password reset link to {}", email)
    }

    /// Replace the stored record for the signed-in user (profile edit).
    pub fn update_profile(&mut self, user: &User) -> Result<()> {
        storage::save(&mut self.storage, KEY_CURRENT_USER, user)
    }

    pub fn logout(&mut self) -> Result<()> {
        self.storage.remove(KEY_TOKEN)?;
        self.storage.remove(KEY_CURRENT_USER)
    }

    fn open_session(&mut self, user: &User) -> Result<()> {
        self.storage.write(KEY_TOKEN, SESSION_TOKEN)?;
        storage::save(&mut self.storage, KEY_CURRENT_USER, user)
    }
}
