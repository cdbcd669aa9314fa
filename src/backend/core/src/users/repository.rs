//! User persistence.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use super::models::{CreateUser, StoredUser, User, UserChanges};
use crate::db::UserRow;
use crate::error::{ErrorCode, Result, WardenError};
use crate::rbac::Role;

/// Storage for user accounts.
///
/// `create` and `update` report an email collision as `DuplicateRecord`.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_all(&self) -> Result<Vec<User>>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>>;

    async fn create(&self, user: CreateUser) -> Result<User>;

    /// Apply `changes`; `None` when no user has `id`.
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>>;

    /// Delete the user; `false` when no user has `id`.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// PostgreSQL
// ═══════════════════════════════════════════════════════════════════════════════

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at, updated_at";

/// User repository backed by the `users` table.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl TryFrom<UserRow> for StoredUser {
    type Error = WardenError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = row.role.parse::<Role>().map_err(|e| {
            WardenError::with_internal(
                ErrorCode::DatabaseError,
                "Stored user record is invalid",
                format!("user {}: {}", row.id, e),
            )
        })?;

        Ok(StoredUser {
            user: User {
                id: row.id,
                name: row.name,
                email: row.email,
                role,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
            password_hash: row.password_hash,
        })
    }
}

fn into_user(row: UserRow) -> Result<User> {
    StoredUser::try_from(row).map(|stored| stored.user)
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_all(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_user).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredUser::try_from).transpose()
    }

    async fn create(&self, user: CreateUser) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await?;

        into_user(row)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                role = COALESCE($5, role),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.role.map(|r| r.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_user).transpose()
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════════════════════════════════════════

/// Process-local user repository.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, StoredUser>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn email_taken(users: &HashMap<Uuid, StoredUser>, email: &str, except: Option<Uuid>) -> bool {
        users
            .values()
            .any(|u| u.user.email == email && Some(u.user.id) != except)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_all(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().values().map(|u| u.user.clone()).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().get(&id).map(|u| u.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.user.email == email)
            .cloned())
    }

    async fn create(&self, user: CreateUser) -> Result<User> {
        let mut users = self.users.write();
        if Self::email_taken(&users, &user.email, None) {
            return Err(WardenError::duplicate("A user with this email already exists"));
        }

        let now = Utc::now();
        let stored = StoredUser {
            user: User {
                id: Uuid::new_v4(),
                name: user.name,
                email: user.email,
                role: user.role,
                created_at: now,
                updated_at: now,
            },
            password_hash: user.password_hash,
        };
        let created = stored.user.clone();
        users.insert(created.id, stored);
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>> {
        let mut users = self.users.write();
        if let Some(email) = &changes.email {
            if Self::email_taken(&users, email, Some(id)) {
                return Err(WardenError::duplicate("A user with this email already exists"));
            }
        }

        let Some(stored) = users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = changes.name {
            stored.user.name = name;
        }
        if let Some(email) = changes.email {
            stored.user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            stored.password_hash = hash;
        }
        if let Some(role) = changes.role {
            stored.user.role = role;
        }
        stored.user.updated_at = Utc::now();

        Ok(Some(stored.user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.users.write().remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            name: "Test".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_memory_duplicate_email() {
        let repo = MemoryUserRepository::new();
        repo.create(new_user("a@example.com")).await.unwrap();
        let err = repo.create(new_user("a@example.com")).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);
    }

    #[tokio::test]
    async fn test_memory_update_missing_user() {
        let repo = MemoryUserRepository::new();
        let updated = repo.update(Uuid::new_v4(), UserChanges::default()).await.unwrap();
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn test_memory_update_email_collision() {
        let repo = MemoryUserRepository::new();
        repo.create(new_user("a@example.com")).await.unwrap();
        let b = repo.create(new_user("b@example.com")).await.unwrap();

        let changes = UserChanges {
            email: Some("a@example.com".to_string()),
            ..Default::default()
        };
        let err = repo.update(b.id, changes).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::DuplicateRecord);

        // Keeping one's own email is not a collision.
        let own = UserChanges {
            email: Some("b@example.com".to_string()),
            ..Default::default()
        };
        assert!(repo.update(b.id, own).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_delete() {
        let repo = MemoryUserRepository::new();
        let user = repo.create(new_user("a@example.com")).await.unwrap();
        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(repo.find_by_id(user.id).await.unwrap().is_none());
    }
}
