//! User account operations: registration, updates, removal and credential checks.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{CreateUser, NewUser, User, UserChanges, UserUpdate};
use super::repository::UserRepository;
use crate::error::{Result, WardenError};
use crate::rbac::Role;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Email validation regex (RFC 5322 simplified).
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("Invalid email regex")
});

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(WardenError::validation("Name is required").with_context("field", "name"));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    if !EMAIL_REGEX.is_match(email) {
        return Err(WardenError::validation("Invalid email format").with_context("field", "email"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(WardenError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ))
        .with_context("field", "password"));
    }
    Ok(())
}

/// User account operations on top of a [`UserRepository`].
#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<dyn UserRepository> {
        &self.repo
    }

    pub async fn find_all(&self) -> Result<Vec<User>> {
        self.repo.find_all().await
    }

    /// The user with `id`, or `RecordNotFound`.
    pub async fn get(&self, id: Uuid) -> Result<User> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| WardenError::not_found("User", id.to_string()))
    }

    /// Register a user. The role defaults to `user`.
    pub async fn create(&self, input: NewUser) -> Result<User> {
        let email = input.email.trim().to_lowercase();
        validate_name(&input.name)?;
        validate_email(&email)?;
        validate_password(&input.password)?;

        if self.repo.find_by_email(&email).await?.is_some() {
            return Err(WardenError::duplicate("A user with this email already exists")
                .with_context("field", "email"));
        }

        let role = input.role.unwrap_or_default();
        let user = self
            .repo
            .create(CreateUser {
                name: input.name.trim().to_string(),
                email,
                password_hash: hash_password(&input.password)?,
                role,
            })
            .await?;

        info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    /// Apply a partial update. An empty update returns the user unchanged.
    pub async fn update(&self, id: Uuid, input: UserUpdate) -> Result<User> {
        if input.is_empty() {
            return self.get(id).await;
        }

        if let Some(name) = &input.name {
            validate_name(name)?;
        }
        let email = input.email.as_deref().map(|e| e.trim().to_lowercase());
        if let Some(email) = &email {
            validate_email(email)?;
        }
        let password_hash = match &input.password {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        let changes = UserChanges {
            name: input.name.map(|n| n.trim().to_string()),
            email,
            password_hash,
            role: input.role,
        };

        let user = self
            .repo
            .update(id, changes)
            .await?
            .ok_or_else(|| WardenError::not_found("User", id.to_string()))?;

        info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(WardenError::not_found("User", id.to_string()));
        }
        info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// The user owning `email` if `password` matches, else `None`.
    pub async fn validate_credentials(&self, email: &str, password: &str) -> Result<Option<User>> {
        let email = email.trim().to_lowercase();
        let Some(stored) = self.repo.find_by_email(&email).await? else {
            debug!("Credential check for unknown email");
            return Ok(None);
        };

        if verify_password(password, &stored.password_hash) {
            Ok(Some(stored.user))
        } else {
            debug!(user_id = %stored.user.id, "Password mismatch");
            Ok(None)
        }
    }

    /// Create an admin account if no user owns `email` yet.
    pub async fn ensure_admin(&self, name: &str, email: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.repo.find_by_email(&email.trim().to_lowercase()).await? {
            return Ok(existing.user);
        }
        self.create(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: Some(Role::Admin),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::users::repository::MemoryUserRepository;
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::Name;
    use fake::Fake;

    fn service() -> UserService {
        UserService::new(Arc::new(MemoryUserRepository::new()))
    }

    fn new_user() -> NewUser {
        NewUser {
            name: Name().fake(),
            email: SafeEmail().fake(),
            password: "correct horse".to_string(),
            role: None,
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("secret1").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret1", &hash));
        assert!(!verify_password("secret2", &hash));
        assert!(!verify_password("secret1", "not-a-hash"));
    }

    #[test]
    fn test_email_validation() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("not an email").is_err());
        assert!(validate_email("").is_err());
    }

    #[tokio::test]
    async fn test_create_defaults_to_user_role() {
        let svc = service();
        let user = svc.create(new_user()).await.unwrap();
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_email() {
        let svc = service();
        let input = new_user();
        svc.create(input.clone()).await.unwrap();

        let mut again = input;
        again.email = again.email.to_uppercase();
        let err = svc.create(again).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let svc = service();

        let mut short = new_user();
        short.password = "12345".to_string();
        assert_eq!(svc.create(short).await.unwrap_err().code(), ErrorCode::ValidationError);

        let mut blank = new_user();
        blank.name = "   ".to_string();
        assert_eq!(svc.create(blank).await.unwrap_err().code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_update_partial() {
        let svc = service();
        let user = svc.create(new_user()).await.unwrap();

        let updated = svc
            .update(
                user.id,
                UserUpdate {
                    name: Some("Renamed".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.email, user.email);
    }

    #[tokio::test]
    async fn test_update_empty_returns_unchanged() {
        let svc = service();
        let user = svc.create(new_user()).await.unwrap();
        let same = svc.update(user.id, UserUpdate::default()).await.unwrap();
        assert_eq!(same, user);
    }

    #[tokio::test]
    async fn test_update_and_delete_missing() {
        let svc = service();
        let id = Uuid::new_v4();
        let update = UserUpdate {
            name: Some("x".to_string()),
            ..Default::default()
        };
        assert_eq!(svc.update(id, update).await.unwrap_err().code(), ErrorCode::RecordNotFound);
        assert_eq!(svc.delete(id).await.unwrap_err().code(), ErrorCode::RecordNotFound);
    }

    #[tokio::test]
    async fn test_validate_credentials() {
        let svc = service();
        let input = new_user();
        let user = svc.create(input.clone()).await.unwrap();

        let found = svc
            .validate_credentials(&input.email, &input.password)
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));

        assert!(svc
            .validate_credentials(&input.email, "wrong password")
            .await
            .unwrap()
            .is_none());
        assert!(svc
            .validate_credentials("nobody@example.com", &input.password)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_password_change_takes_effect() {
        let svc = service();
        let input = new_user();
        let user = svc.create(input.clone()).await.unwrap();

        svc.update(
            user.id,
            UserUpdate {
                password: Some("brand new secret".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(svc.validate_credentials(&input.email, &input.password).await.unwrap().is_none());
        assert!(svc
            .validate_credentials(&input.email, "brand new secret")
            .await
            .unwrap()
            .is_some());
    }
}
