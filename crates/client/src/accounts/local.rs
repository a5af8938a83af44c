//! Accounts stored on this device.
//!
//! Passwords are kept as Argon2id hashes. Local accounts never reach the
//! server; sessions created here are offline sessions without a token.

use std::path::PathBuf;
use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use watch_shop_core::{
    Email, MIN_PASSWORD_LENGTH, RegisterRequest, Role, UserId, UserProfile, password_long_enough,
};

use super::AccountRepository;
use crate::error::ClientError;
use crate::session::Session;
use crate::storage;

/// An account to create on first use if its email is not taken yet.
#[derive(Debug, Clone)]
pub struct SeedAccount {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalAccount {
    profile: UserProfile,
    password_hash: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AccountFile {
    #[serde(default)]
    accounts: Vec<LocalAccount>,
}

/// Local account store, optionally persisted to a JSON file.
#[derive(Debug, Clone)]
pub struct LocalAccounts {
    path: Option<PathBuf>,
    file: Arc<Mutex<AccountFile>>,
}

impl LocalAccounts {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            file: Arc::new(Mutex::new(AccountFile::default())),
        }
    }

    /// Load the accounts stored at `path`; the file is created on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let file: AccountFile = storage::load(&path).await?.unwrap_or_default();
        tracing::debug!(path = %path.display(), accounts = file.accounts.len(), "Local accounts loaded");
        Ok(Self {
            path: Some(path),
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Add `seeds` whose emails are not registered yet. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns an error if a seed is invalid or the file cannot be written.
    pub async fn seed(&self, seeds: &[SeedAccount]) -> Result<usize, ClientError> {
        let mut file = self.file.lock().await;
        let mut next = file.clone();
        let mut added = 0;

        for seed in seeds {
            let email = Email::parse(seed.email.trim())?;
            if next.accounts.iter().any(|a| a.profile.email == email) {
                continue;
            }
            next.accounts.push(new_account(
                &seed.full_name,
                email,
                &seed.phone,
                &seed.password,
                seed.role,
            )?);
            added += 1;
        }

        if added > 0 {
            self.commit(&mut file, next).await?;
        }
        Ok(added)
    }

    /// Number of stored accounts.
    pub async fn len(&self) -> usize {
        self.file.lock().await.accounts.len()
    }

    /// Whether no accounts are stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn commit(&self, file: &mut AccountFile, next: AccountFile) -> Result<(), ClientError> {
        if let Some(path) = &self.path {
            storage::save(path, &next).await?;
        }
        *file = next;
        Ok(())
    }
}

fn new_account(
    full_name: &str,
    email: Email,
    phone: &str,
    password: &str,
    role: Role,
) -> Result<LocalAccount, ClientError> {
    if !password_long_enough(password) {
        return Err(ClientError::WeakPassword {
            min: MIN_PASSWORD_LENGTH,
        });
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| ClientError::PasswordHash)?
        .to_string();

    Ok(LocalAccount {
        profile: UserProfile {
            id: UserId::generate(),
            full_name: full_name.trim().to_owned(),
            email,
            phone: phone.trim().to_owned(),
            role,
            google_id: None,
            avatar: None,
            created_at: Utc::now(),
        },
        password_hash,
    })
}

fn password_matches(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

impl AccountRepository for LocalAccounts {
    async fn register(&self, req: &RegisterRequest) -> Result<Session, ClientError> {
        if req.full_name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty()
        {
            return Err(ClientError::MissingFields);
        }
        let email = Email::parse(req.email.trim())?;

        let mut file = self.file.lock().await;
        if file.accounts.iter().any(|a| a.profile.email == email) {
            return Err(ClientError::DuplicateEmail);
        }

        let account = new_account(&req.full_name, email, &req.phone, &req.password, Role::User)?;
        let profile = account.profile.clone();

        let mut next = file.clone();
        next.accounts.push(account);
        self.commit(&mut file, next).await?;

        tracing::info!(user_id = %profile.id, "Local account registered");
        Ok(Session::offline(profile))
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(ClientError::MissingFields);
        }

        let file = self.file.lock().await;
        let account = file
            .accounts
            .iter()
            .find(|a| a.profile.email.as_str() == email.trim())
            .ok_or(ClientError::InvalidCredentials)?;

        if !password_matches(password, &account.password_hash) {
            return Err(ClientError::InvalidCredentials);
        }

        Ok(Session::offline(account.profile.clone()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "Local User".to_owned(),
            email: email.to_owned(),
            phone: "0901234567".to_owned(),
            password: "secret1".to_owned(),
        }
    }

    fn admin_seed() -> SeedAccount {
        SeedAccount {
            full_name: "Shop Admin".to_owned(),
            email: "admin@test.com".to_owned(),
            phone: String::new(),
            password: "admin-pass".to_owned(),
            role: Role::Admin,
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let accounts = LocalAccounts::in_memory();
        let registered = accounts
            .register(&register_request("local@test.com"))
            .await
            .unwrap();
        assert!(registered.offline);
        assert!(registered.token.is_none());
        assert_eq!(registered.user.role, Role::User);

        let session = accounts.login("local@test.com", "secret1").await.unwrap();
        assert_eq!(session.user.id, registered.user.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let accounts = LocalAccounts::in_memory();
        accounts
            .register(&register_request("dup@test.com"))
            .await
            .unwrap();
        let err = accounts
            .register(&register_request("dup@test.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::DuplicateEmail));
        assert_eq!(accounts.len().await, 1);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let accounts = LocalAccounts::in_memory();

        let mut req = register_request("x@test.com");
        req.full_name = "  ".to_owned();
        assert!(matches!(
            accounts.register(&req).await,
            Err(ClientError::MissingFields)
        ));

        let req = register_request("not-an-email");
        assert!(matches!(
            accounts.register(&req).await,
            Err(ClientError::InvalidEmail(_))
        ));

        let mut req = register_request("x@test.com");
        req.password = "12345".to_owned();
        assert!(matches!(
            accounts.register(&req).await,
            Err(ClientError::WeakPassword { min: MIN_PASSWORD_LENGTH })
        ));
        assert!(accounts.is_empty().await);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password_and_unknown_email() {
        let accounts = LocalAccounts::in_memory();
        accounts
            .register(&register_request("local@test.com"))
            .await
            .unwrap();

        assert!(matches!(
            accounts.login("local@test.com", "wrong-pass").await,
            Err(ClientError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.login("nobody@test.com", "secret1").await,
            Err(ClientError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_seed_only_adds_missing_accounts() {
        let accounts = LocalAccounts::in_memory();
        assert_eq!(accounts.seed(&[admin_seed()]).await.unwrap(), 1);
        assert_eq!(accounts.seed(&[admin_seed()]).await.unwrap(), 0);

        let session = accounts.login("admin@test.com", "admin-pass").await.unwrap();
        assert!(session.is_admin());
    }

    #[tokio::test]
    async fn test_accounts_persist_without_plaintext_passwords() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");

        let accounts = LocalAccounts::open(&path).await.unwrap();
        accounts
            .register(&register_request("saved@test.com"))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("saved@test.com"));
        assert!(!raw.contains("secret1"));

        let reopened = LocalAccounts::open(&path).await.unwrap();
        assert!(reopened.login("saved@test.com", "secret1").await.is_ok());
    }
}
