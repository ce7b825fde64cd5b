//! Email and password accounts.
//!
//! Credentials live in the `accounts` collection as salted SHA-256
//! digests; the public profile is written to `users/{uid}`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::collection::DocumentService;
use crate::db::{Constraint, Direction, DocumentStore};
use crate::error::StoreError;
use crate::models::{Collection, UserProfile};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(String),

    #[error("An account already exists for {0}")]
    EmailInUse(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Account {
    uid: String,
    email: String,
    salt: String,
    password_hash: String,
}

#[derive(Debug, Clone)]
pub struct IdentityProvider {
    accounts: DocumentService<Account>,
    users: DocumentService<UserProfile>,
}

impl IdentityProvider {
    pub fn new(store: DocumentStore) -> Self {
        Self {
            accounts: DocumentService::new(store.clone(), Collection::Accounts.as_str()),
            users: DocumentService::new(store, Collection::Users.as_str()),
        }
    }

    /// Registers an account and writes its profile.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<UserProfile, IdentityError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(IdentityError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        if self.find_account(&email).await?.is_some() {
            return Err(IdentityError::EmailInUse(email));
        }

        let uid = DocumentStore::new_id();
        let salt = generate_salt();
        let account = Account {
            uid: uid.clone(),
            email: email.clone(),
            password_hash: hash_password(&salt, password),
            salt,
        };
        self.accounts.set(&uid, &account).await?;

        let mut profile = UserProfile::new(&uid, &email);
        profile.display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        self.users.set(&uid, &profile).await?;

        tracing::info!("Registered user {}", uid);
        Ok(profile)
    }

    /// Checks a credential and returns the account's profile.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, IdentityError> {
        let email = normalize_email(email).map_err(|_| IdentityError::InvalidCredentials)?;

        let account = self
            .find_account(&email)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;
        if hash_password(&account.salt, password) != account.password_hash {
            tracing::debug!("Rejected sign-in for {}", account.uid);
            return Err(IdentityError::InvalidCredentials);
        }

        let profile = self
            .profile(&account.uid)
            .await?
            .unwrap_or_else(|| UserProfile::new(&account.uid, &account.email));
        Ok(profile)
    }

    pub async fn profile(&self, uid: &str) -> Result<Option<UserProfile>, IdentityError> {
        Ok(self.users.get_by_id(uid).await?.map(|doc| doc.data))
    }

    pub async fn list_users(&self) -> Result<Vec<UserProfile>, IdentityError> {
        let docs = self
            .users
            .get_all(&[Constraint::order_by("email", Direction::Asc)])
            .await?;
        Ok(docs.into_iter().map(|doc| doc.data).collect())
    }

    async fn find_account(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let mut found = self
            .accounts
            .get_all(&[Constraint::eq("email", email), Constraint::limit(1)])
            .await?;
        Ok(found.pop().map(|doc| doc.data))
    }
}

/// Lowercases and checks the rough shape `local@domain.tld`.
fn normalize_email(email: &str) -> Result<String, IdentityError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(IdentityError::Validation(format!(
            "Invalid email address: {}",
            email
        )));
    }
    Ok(email)
}

fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    struct TestContext {
        identity: IdentityProvider,
        users: DocumentService<UserProfile>,
        _temp_dir: TempDir,
    }

    async fn setup_identity() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_db(&temp_dir.path().join("test.db")).await.unwrap();
        let store = DocumentStore::new(pool);
        TestContext {
            identity: IdentityProvider::new(store.clone()),
            users: DocumentService::new(store, "users"),
            _temp_dir: temp_dir,
        }
    }

    #[tokio::test]
    async fn test_sign_up_writes_profile() {
        let ctx = setup_identity().await;

        let profile = ctx
            .identity
            .sign_up("Ada@Example.com", "secret1", Some("Ada"))
            .await
            .unwrap();

        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.display_name.as_deref(), Some("Ada"));

        let stored = ctx.users.get_by_id(&profile.uid).await.unwrap().unwrap();
        assert_eq!(stored.data, profile);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_bad_input() {
        let ctx = setup_identity().await;

        let short = ctx.identity.sign_up("a@example.com", "12345", None).await;
        assert!(matches!(short, Err(IdentityError::Validation(_))));

        let bad_email = ctx.identity.sign_up("not-an-email", "secret1", None).await;
        assert!(matches!(bad_email, Err(IdentityError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_duplicate_email() {
        let ctx = setup_identity().await;
        ctx.identity
            .sign_up("a@example.com", "secret1", None)
            .await
            .unwrap();

        let err = ctx
            .identity
            .sign_up("A@example.com", "secret2", None)
            .await
            .unwrap_err();

        assert!(matches!(err, IdentityError::EmailInUse(_)));
    }

    #[tokio::test]
    async fn test_sign_in() {
        let ctx = setup_identity().await;
        let created = ctx
            .identity
            .sign_up("a@example.com", "secret1", None)
            .await
            .unwrap();

        let profile = ctx
            .identity
            .sign_in(" a@example.com ", "secret1")
            .await
            .unwrap();
        assert_eq!(profile.uid, created.uid);

        let wrong = ctx.identity.sign_in("a@example.com", "secret2").await;
        assert!(matches!(wrong, Err(IdentityError::InvalidCredentials)));

        let unknown = ctx.identity.sign_in("b@example.com", "secret1").await;
        assert!(matches!(unknown, Err(IdentityError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_list_users_sorted_by_email() {
        let ctx = setup_identity().await;
        ctx.identity.sign_up("zed@example.com", "secret1", None).await.unwrap();
        ctx.identity.sign_up("amy@example.com", "secret1", None).await.unwrap();

        let users = ctx.identity.list_users().await.unwrap();
        let emails: Vec<&str> = users.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["amy@example.com", "zed@example.com"]);
    }

    #[test]
    fn test_hash_depends_on_salt() {
        assert_eq!(hash_password("s1", "pw"), hash_password("s1", "pw"));
        assert_ne!(hash_password("s1", "pw"), hash_password("s2", "pw"));
    }
}
