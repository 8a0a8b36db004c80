//! Environment state persistence.
//!
//! Each named environment ("dev", "prod", ...) is a flat map of variables
//! persisted as dotenv `KEY=VALUE` files inside the project's environment
//! folder: non-secret values in `.env.<name>`, secret-classified values
//! (keys with the `SECRET_` prefix) encrypted in the `.env.<name>.user`
//! sibling. Writes merge with what is already on disk; an unrelated key is
//! never dropped.

mod crypto;

pub use crypto::{Encryptor, CRYPTO_PREFIX};

use crate::errors::EnvError;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A snapshot of one named environment: variable name to plaintext value.
pub type EnvMap = HashMap<String, String>;

/// Prefix classifying a key as secret at write time.
pub const SECRET_PREFIX: &str = "SECRET_";

/// Default environment folder, relative to the project root.
pub const DEFAULT_ENV_FOLDER: &str = "env";

/// Store for named environment snapshots.
#[derive(Debug, Clone)]
pub struct EnvStore {
    encryptor: Encryptor,
}

impl EnvStore {
    /// Creates a store whose secrets are encrypted with a key derived from
    /// the given project key.
    #[must_use]
    pub fn new(project_key: &str) -> Self {
        Self {
            encryptor: Encryptor::new(project_key),
        }
    }

    /// Returns the path of the primary file for an environment.
    #[must_use]
    pub fn env_file(project_path: &Path, env_folder: &Path, name: &str) -> PathBuf {
        project_path.join(env_folder).join(format!(".env.{name}"))
    }

    /// Returns the path of the secret sibling file for an environment.
    #[must_use]
    pub fn user_file(project_path: &Path, env_folder: &Path, name: &str) -> PathBuf {
        project_path
            .join(env_folder)
            .join(format!(".env.{name}.user"))
    }

    /// Lists the environment names present in the environment folder.
    ///
    /// A missing folder is an empty project, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Io`] if the folder exists but cannot be read.
    pub fn list_env(&self, project_path: &Path, env_folder: &Path) -> Result<Vec<String>, EnvError> {
        let dir = project_path.join(env_folder);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|cause| EnvError::Io {
            path: dir.clone(),
            cause,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|cause| EnvError::Io {
                path: dir.clone(),
                cause,
            })?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_prefix(".env.") {
                if !name.is_empty() && !name.ends_with(".user") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Reads the merged snapshot of an environment.
    ///
    /// Values from the secret sibling override the primary file; encrypted
    /// values are decrypted transparently. Plaintext values found in the
    /// sibling (files written before encryption was introduced) pass
    /// through unchanged. Missing files read as an empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError`] on unreadable or malformed files, or when a
    /// tagged value fails to decrypt.
    pub fn read_env(
        &self,
        project_path: &Path,
        env_folder: &Path,
        name: &str,
    ) -> Result<EnvMap, EnvError> {
        let mut snapshot = read_dotenv_file(&Self::env_file(project_path, env_folder, name))?;

        let user_path = Self::user_file(project_path, env_folder, name);
        for (key, value) in read_dotenv_file(&user_path)? {
            let value = if Encryptor::is_encrypted(&value) {
                self.encryptor.decrypt(&value)?
            } else {
                value
            };
            snapshot.insert(key, value);
        }

        Ok(snapshot)
    }

    /// Writes a snapshot, merging it over whatever is already persisted.
    ///
    /// Secret-classified keys go encrypted into the `.user` sibling; all
    /// other keys go in plain text into the primary file. Existing keys
    /// not present in `snapshot` are preserved.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError`] if the folder or files cannot be written, or
    /// if a secret value fails to encrypt.
    pub fn write_env(
        &self,
        project_path: &Path,
        env_folder: &Path,
        name: &str,
        snapshot: &EnvMap,
    ) -> Result<(), EnvError> {
        let mut merged = self.read_env(project_path, env_folder, name)?;
        for (key, value) in snapshot {
            merged.insert(key.clone(), value.clone());
        }

        let dir = project_path.join(env_folder);
        fs::create_dir_all(&dir).map_err(|cause| EnvError::Io {
            path: dir.clone(),
            cause,
        })?;

        let mut plain: Vec<(&String, &String)> = Vec::new();
        let mut secret: Vec<(&String, &String)> = Vec::new();
        for entry in &merged {
            if entry.0.starts_with(SECRET_PREFIX) {
                secret.push(entry);
            } else {
                plain.push(entry);
            }
        }
        plain.sort();
        secret.sort();

        let env_path = Self::env_file(project_path, env_folder, name);
        let mut plain_lines = String::new();
        for (key, value) in plain {
            plain_lines.push_str(&format_line(key, value));
        }
        fs::write(&env_path, plain_lines).map_err(|cause| EnvError::Io {
            path: env_path,
            cause,
        })?;

        let user_path = Self::user_file(project_path, env_folder, name);
        if secret.is_empty() {
            debug!(env = %name, "no secret values to persist");
            return Ok(());
        }
        let mut secret_lines = String::new();
        for (key, value) in secret {
            let encrypted = self.encryptor.encrypt(value)?;
            secret_lines.push_str(&format_line(key, &encrypted));
        }
        fs::write(&user_path, secret_lines).map_err(|cause| EnvError::Io {
            path: user_path,
            cause,
        })?;

        Ok(())
    }
}

/// Replaces every secret value from the snapshot with `***` in a text.
///
/// Used to keep secret-classified values out of log lines and messages.
#[must_use]
pub fn mask_secret_values(text: &str, snapshot: &EnvMap) -> String {
    let mut masked = text.to_string();
    for (key, value) in snapshot {
        if key.starts_with(SECRET_PREFIX) && !value.is_empty() {
            masked = masked.replace(value, "***");
        }
    }
    masked
}

/// Parses a dotenv file into a map; a missing file reads as empty.
fn read_dotenv_file(path: &Path) -> Result<EnvMap, EnvError> {
    if !path.exists() {
        return Ok(EnvMap::new());
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| EnvError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut map = EnvMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| EnvError::Malformed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        map.insert(key, value);
    }
    Ok(map)
}

/// Renders one `KEY=VALUE` line, quoting values the dotenv format cannot
/// carry bare.
fn format_line(key: &str, value: &str) -> String {
    let needs_quoting = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\''));
    if needs_quoting {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("{key}=\"{escaped}\"\n")
    } else {
        format!("{key}={value}\n")
    }
}
