//! # bl-users-simple
//!
//! Argon2-backed implementation of `UserStore`. Passwords are hashed
//! before the user document ever reaches the collection.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use bl_core::models::NewUser;
use bl_core::traits::{Collection, Document, UserStore};

pub struct SimpleUserStore {
    users: Arc<dyn Collection>,
}

impl SimpleUserStore {
    pub fn new(users: Arc<dyn Collection>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl UserStore for SimpleUserStore {
    async fn save(&self, user: NewUser) -> anyhow::Result<Uuid> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(user.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hash failure: {e}"))?
            .to_string();

        let mut doc = Document::new();
        doc.insert("login".to_string(), Value::String(user.login));
        doc.insert(
            "email".to_string(),
            user.email.map(Value::String).unwrap_or(Value::Null),
        );
        doc.insert("password_hash".to_string(), Value::String(hash));
        doc.insert("date".to_string(), json!(Utc::now()));

        let id = self.users.insert(doc).await?;
        tracing::debug!(user = %id, "user persisted");
        Ok(id)
    }
}
