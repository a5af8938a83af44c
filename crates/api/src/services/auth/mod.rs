//! Session issuer.
//!
//! Local accounts authenticate with an argon2id-hashed password, Google
//! accounts with a verified ID token. Both paths end in the same place: a
//! signed session token plus the public profile.

mod error;
pub mod google;
pub mod password;
pub mod token;

pub use error::AuthError;
pub use google::{GoogleIdentity, GoogleVerifier};
pub use token::{Claims, SessionTokens};

use tracing::{info, instrument};

use watch_shop_core::{AuthResponse, Email, RegisterRequest, Role, UserProfile};

use crate::db::{RepositoryError, UserStore};
use crate::models::UserRecord;
use password::{hash_password, validate_password, verify_password};

/// Authentication service.
///
/// Handles registration, password login, Google sign-in and token lookups.
pub struct AuthService<'a, S> {
    users: &'a S,
    tokens: &'a SessionTokens,
    google: &'a GoogleVerifier,
}

impl<'a, S: UserStore> AuthService<'a, S> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(users: &'a S, tokens: &'a SessionTokens, google: &'a GoogleVerifier) -> Self {
        Self {
            users,
            tokens,
            google,
        }
    }

    // =========================================================================
    // Password Authentication
    // =========================================================================

    /// Register a new `user` account and sign it in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields` if name, email or password is blank.
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::DuplicateEmail` if the email is already registered.
    #[instrument(skip_all, fields(email = %req.email))]
    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, AuthError> {
        if req.full_name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty()
        {
            return Err(AuthError::MissingFields);
        }

        let user = self
            .create_account(
                req.full_name.trim(),
                &req.email,
                req.phone.trim(),
                &req.password,
                Role::User,
            )
            .await?;

        info!(user_id = %user.id, "User registered");
        self.respond(&user)
    }

    /// Create a password account with an explicit role.
    ///
    /// Used by registration, admin seeding and the CLI.
    ///
    /// # Errors
    ///
    /// Same as [`Self::register`], minus the blank-field check.
    pub async fn create_account(
        &self,
        full_name: &str,
        email: &str,
        phone: &str,
        password: &str,
        role: Role,
    ) -> Result<UserRecord, AuthError> {
        let email = Email::parse(email)?;
        validate_password(password)?;

        if self.users.user_by_email(&email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }

        let mut user = UserRecord::new(full_name.to_owned(), email, phone.to_owned(), role);
        user.password_hash = Some(hash_password(password)?);

        self.users.insert_user(&user).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => AuthError::DuplicateEmail,
            other => AuthError::Repository(other),
        })?;

        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields` if either field is blank.
    /// Returns `AuthError::InvalidCredentials` if the email is unknown, the
    /// account has no password, or the password is wrong.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }

        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;
        let user = self
            .users
            .user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, hash)?;

        info!(user_id = %user.id, "User logged in");
        self.respond(&user)
    }

    // =========================================================================
    // Google Sign-In
    // =========================================================================

    /// Sign in with a Google ID token, creating or linking the account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingFields` if the token is blank.
    /// Returns `AuthError::InvalidToken` if Google verification fails.
    #[instrument(skip_all)]
    pub async fn google_sign_in(&self, id_token: &str) -> Result<AuthResponse, AuthError> {
        if id_token.trim().is_empty() {
            return Err(AuthError::MissingFields);
        }

        let identity = self.google.verify(id_token).await?;
        let user = self.link_google_identity(identity).await?;

        info!(user_id = %user.id, "User signed in with Google");
        self.respond(&user)
    }

    async fn link_google_identity(&self, identity: GoogleIdentity) -> Result<UserRecord, AuthError> {
        let email = Email::parse(&identity.email).map_err(|_| AuthError::InvalidToken)?;

        let Some(mut user) = self.users.user_by_email(&email).await? else {
            let name = identity
                .name
                .unwrap_or_else(|| email.as_str().split('@').next().unwrap_or_default().to_owned());
            let mut user = UserRecord::new(name, email.clone(), String::new(), Role::User);
            user.google_id = Some(identity.subject);
            user.avatar = identity.picture;

            return match self.users.insert_user(&user).await {
                Ok(()) => Ok(user),
                // Lost a race with a concurrent first sign-in for the same email.
                Err(RepositoryError::Conflict(_)) => self
                    .users
                    .user_by_email(&email)
                    .await?
                    .ok_or(AuthError::InvalidToken),
                Err(e) => Err(e.into()),
            };
        };

        let mut changed = false;
        if user.google_id.is_none() {
            user.google_id = Some(identity.subject);
            changed = true;
        }
        if user.avatar.as_deref().is_none_or(str::is_empty) && identity.picture.is_some() {
            user.avatar = identity.picture;
            changed = true;
        }
        if changed {
            self.users.update_user(&user).await?;
        }

        Ok(user)
    }

    // =========================================================================
    // Token Lookups
    // =========================================================================

    /// Resolve a validated token's subject to the current profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UserNotFound` if the account no longer exists.
    pub async fn current_user(&self, claims: &Claims) -> Result<UserProfile, AuthError> {
        self.users
            .user_by_id(claims.sub)
            .await?
            .map(|u| u.profile())
            .ok_or(AuthError::UserNotFound)
    }

    fn respond(&self, user: &UserRecord) -> Result<AuthResponse, AuthError> {
        Ok(AuthResponse {
            token: self.tokens.issue(user)?,
            user: user.profile(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::db::JsonFileStore;
    use google::tests::{google_claims, sign, test_verifier};

    struct Fixture {
        store: JsonFileStore,
        tokens: SessionTokens,
        google: GoogleVerifier,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: JsonFileStore::in_memory(),
                tokens: SessionTokens::new(&SecretString::from(
                    "test-secret-key-for-session-tokens".to_owned(),
                )),
                google: test_verifier(),
            }
        }

        fn auth(&self) -> AuthService<'_, JsonFileStore> {
            AuthService::new(&self.store, &self.tokens, &self.google)
        }
    }

    fn register_req(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            full_name: "Alice".to_owned(),
            email: email.to_owned(),
            phone: "0900000000".to_owned(),
            password: password.to_owned(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let fx = Fixture::new();
        let auth = fx.auth();

        let registered = auth.register(&register_req("a@test.com", "secret1")).await.unwrap();
        assert_eq!(registered.user.role, Role::User);
        assert_eq!(registered.user.full_name, "Alice");

        let claims = fx.tokens.validate(&registered.token).unwrap();
        assert_eq!(claims.sub, registered.user.id);

        let logged_in = auth.login("a@test.com", "secret1").await.unwrap();
        assert_eq!(logged_in.user.id, registered.user.id);

        let stored = fx.store.user_by_id(registered.user.id).await.unwrap().unwrap();
        let hash = stored.password_hash.unwrap();
        assert!(!hash.contains("secret1"));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let fx = Fixture::new();
        let auth = fx.auth();

        let mut missing = register_req("a@test.com", "secret1");
        missing.full_name = "  ".to_owned();
        assert!(matches!(auth.register(&missing).await, Err(AuthError::MissingFields)));

        assert!(matches!(
            auth.register(&register_req("not-an-email", "secret1")).await,
            Err(AuthError::InvalidEmail(_))
        ));
        assert!(matches!(
            auth.register(&register_req("a@test.com", "12345")).await,
            Err(AuthError::WeakPassword { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_leaves_store_unchanged() {
        let fx = Fixture::new();
        let auth = fx.auth();

        let first = auth.register(&register_req("dup@test.com", "secret1")).await.unwrap();
        let err = auth.register(&register_req("dup@test.com", "other-pw")).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));

        // The original password still works and the new one does not.
        assert!(auth.login("dup@test.com", "secret1").await.is_ok());
        assert!(matches!(
            auth.login("dup@test.com", "other-pw").await,
            Err(AuthError::InvalidCredentials)
        ));
        let email = Email::parse("dup@test.com").unwrap();
        let stored = fx.store.user_by_email(&email).await.unwrap().unwrap();
        assert_eq!(stored.id, first.user.id);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let fx = Fixture::new();
        let auth = fx.auth();
        auth.register(&register_req("a@test.com", "secret1")).await.unwrap();

        for (email, password) in [
            ("a@test.com", "wrong-pw"),
            ("nobody@test.com", "secret1"),
            ("garbage", "secret1"),
        ] {
            assert!(matches!(
                auth.login(email, password).await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        assert!(matches!(auth.login("", "x").await, Err(AuthError::MissingFields)));
    }

    #[tokio::test]
    async fn test_google_sign_in_creates_then_reuses() {
        let fx = Fixture::new();
        let auth = fx.auth();
        let token = sign(&google_claims("g-42", "gu@test.com"));

        let first = auth.google_sign_in(&token).await.unwrap();
        assert_eq!(first.user.google_id.as_deref(), Some("g-42"));
        assert_eq!(first.user.full_name, "Google User");
        assert!(first.user.avatar.is_some());

        let second = auth.google_sign_in(&token).await.unwrap();
        assert_eq!(second.user.id, first.user.id);

        // Google-only accounts cannot use password login.
        assert!(matches!(
            auth.login("gu@test.com", "anything").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_google_sign_in_links_existing_account() {
        let fx = Fixture::new();
        let auth = fx.auth();
        let local = auth.register(&register_req("both@test.com", "secret1")).await.unwrap();

        let token = sign(&google_claims("g-7", "both@test.com"));
        let linked = auth.google_sign_in(&token).await.unwrap();
        assert_eq!(linked.user.id, local.user.id);
        assert_eq!(linked.user.google_id.as_deref(), Some("g-7"));
        assert!(linked.user.avatar.is_some());
        assert_eq!(linked.user.full_name, "Alice");

        // Password login keeps working for the linked account.
        assert!(auth.login("both@test.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn test_google_sign_in_rejects_bad_token() {
        let fx = Fixture::new();
        assert!(matches!(
            fx.auth().google_sign_in("forged").await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            fx.auth().google_sign_in(" ").await,
            Err(AuthError::MissingFields)
        ));
    }

    #[tokio::test]
    async fn test_current_user() {
        let fx = Fixture::new();
        let auth = fx.auth();
        let registered = auth.register(&register_req("me@test.com", "secret1")).await.unwrap();
        let claims = fx.tokens.validate(&registered.token).unwrap();

        let me = auth.current_user(&claims).await.unwrap();
        assert_eq!(me, registered.user);
    }
}
