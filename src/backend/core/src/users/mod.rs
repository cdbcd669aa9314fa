//! User accounts: models, persistence and account operations.

pub mod models;
pub mod repository;
pub mod service;

pub use models::{NewUser, StoredUser, User, UserUpdate};
pub use repository::{MemoryUserRepository, PgUserRepository, UserRepository};
pub use service::UserService;
