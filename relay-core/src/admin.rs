//! Admin password, stored as an argon2 PHC hash in a small JSON file.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("password must be at least 6 characters")]
    TooShort,

    #[error("password hash error: {0}")]
    Hash(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("admin file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl From<argon2::password_hash::Error> for AdminError {
    fn from(e: argon2::password_hash::Error) -> Self {
        AdminError::Hash(e.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AdminFile {
    password_hash: String,
}

#[derive(Debug, Clone)]
pub struct AdminCredentials {
    path: PathBuf,
}

impl AdminCredentials {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create the admin file from `initial_password` unless it already exists.
    pub async fn ensure(&self, initial_password: &str) -> Result<(), AdminError> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        tracing::info!(path = %self.path.display(), "Creating admin credential file");
        self.write_hash(initial_password).await
    }

    /// Replace the stored password.
    pub async fn set_password(&self, new_password: &str) -> Result<(), AdminError> {
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AdminError::TooShort);
        }
        self.write_hash(new_password).await?;
        tracing::info!("Admin password changed");
        Ok(())
    }

    /// False for a wrong password; errors only when the file cannot be read.
    pub async fn verify(&self, password: &str) -> Result<bool, AdminError> {
        let raw = tokio::fs::read(&self.path).await?;
        let file: AdminFile = serde_json::from_slice(&raw)?;
        let parsed = PasswordHash::new(&file.password_hash)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    async fn write_hash(&self, password: &str) -> Result<(), AdminError> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)?
            .to_string();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_vec(&AdminFile { password_hash })?;
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }
}
