use std::collections::BTreeMap;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use super::{hash_password, verify_password, AuthError, Role};

/// Stored login account.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
}

impl UserAccount {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Account fields safe to return to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub role: Role,
}

/// In-memory login accounts keyed by username.
pub struct UserDirectory {
    accounts: RwLock<BTreeMap<String, UserAccount>>,
    bcrypt_cost: u32,
}

impl UserDirectory {
    pub fn new(bcrypt_cost: u32) -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            bcrypt_cost,
        }
    }

    /// Directory holding the stock `admin` and `user` accounts.
    pub async fn seeded(bcrypt_cost: u32) -> Result<Self, AuthError> {
        let directory = Self::new(bcrypt_cost);
        for (id, username, password, role) in [
            ("admin1", "admin", "admin123", Role::Admin),
            ("user1", "user", "user123", Role::User),
        ] {
            let password_hash = hash_password(password, bcrypt_cost).await?;
            directory.accounts.write().await.insert(
                username.to_string(),
                UserAccount {
                    id: id.to_string(),
                    username: username.to_string(),
                    password_hash,
                    role,
                },
            );
        }
        Ok(directory)
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserProfile, AuthError> {
        let account = self
            .accounts
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;

        if verify_password(password, &account.password_hash).await? {
            Ok(account.profile())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Add an account with the next sequential `user{n}` id.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        role: Role,
    ) -> Result<UserProfile, AuthError> {
        if self.accounts.read().await.contains_key(username) {
            return Err(AuthError::Conflict);
        }
        let password_hash = hash_password(password, self.bcrypt_cost).await?;

        let mut accounts = self.accounts.write().await;
        // re-check after hashing; another registration may have won the name
        if accounts.contains_key(username) {
            return Err(AuthError::Conflict);
        }
        let account = UserAccount {
            id: format!("user{}", accounts.len() + 1),
            username: username.to_string(),
            password_hash,
            role,
        };
        let profile = account.profile();
        accounts.insert(username.to_string(), account);
        info!(user_id = %profile.id, role = role.as_str(), "registered login account");
        Ok(profile)
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[tokio::test]
    async fn seeded_accounts_authenticate() {
        let directory = UserDirectory::seeded(TEST_COST).await.expect("seeds");
        let admin = directory
            .authenticate("admin", "admin123")
            .await
            .expect("admin logs in");
        assert_eq!(admin.id, "admin1");
        assert_eq!(admin.role, Role::Admin);

        let wrong = directory.authenticate("user", "admin123").await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
        let unknown = directory.authenticate("ghost", "x").await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn registration_assigns_sequential_ids_and_rejects_duplicates() {
        let directory = UserDirectory::seeded(TEST_COST).await.expect("seeds");
        let created = directory
            .register("jane.smith@example.com", "secret", Role::Staff)
            .await
            .expect("registers");
        assert_eq!(created.id, "user3");
        assert_eq!(directory.len().await, 3);

        let duplicate = directory.register("admin", "other", Role::User).await;
        assert!(matches!(duplicate, Err(AuthError::Conflict)));

        let profile = directory
            .authenticate("jane.smith@example.com", "secret")
            .await
            .expect("new account logs in");
        assert_eq!(profile.role, Role::Staff);
    }
}
