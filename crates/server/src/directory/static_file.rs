//! Directory backed by a YAML file loaded at startup.
//!
//! ```yaml
//! users:
//!   - name: alice
//!     password: "$argon2id$v=19$..."
//!     full_name: Alice Liddell
//!     given_name: Alice
//!     family_name: Liddell
//!     email: alice@example.com
//!     groups: [staff]
//! groups:
//!   - name: staff
//!     gid: 2000
//! ```

use super::{Directory, DirectoryError, Principal};
use crate::password::verify_password;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
struct UserRecord {
    name: String,
    password: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
    email: String,
    #[serde(default)]
    groups: Vec<String>,
}

impl UserRecord {
    fn principal(&self) -> Principal {
        Principal {
            subject: self.name.clone(),
            full_name: self.full_name.clone(),
            given_name: self.given_name.clone(),
            family_name: self.family_name.clone(),
            email: self.email.clone(),
            groups: self.groups.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Group {
    pub name: String,
    #[serde(default)]
    pub gid: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct UserFile {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    groups: Vec<Group>,
}

#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: HashMap<String, UserRecord>,
    groups: HashMap<String, Group>,
}

impl StaticDirectory {
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let file: UserFile = Config::builder()
            .add_source(File::from(path).format(FileFormat::Yaml))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|source| DirectoryError::Load {
                path: path.to_path_buf(),
                source,
            })?;
        let directory = Self::from_file(file)?;
        tracing::info!(
            path = %path.display(),
            users = directory.users.len(),
            groups = directory.groups.len(),
            "loaded static directory"
        );
        Ok(directory)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, DirectoryError> {
        let file: UserFile = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| DirectoryError::Invalid(e.to_string()))?;
        Self::from_file(file)
    }

    fn from_file(file: UserFile) -> Result<Self, DirectoryError> {
        let mut users = HashMap::with_capacity(file.users.len());
        for user in file.users {
            if user.name.is_empty() || user.email.is_empty() {
                return Err(DirectoryError::Invalid(
                    "every user needs a name and an email".into(),
                ));
            }
            if users.contains_key(&user.name) {
                return Err(DirectoryError::Invalid(format!(
                    "duplicate user `{}`",
                    user.name
                )));
            }
            users.insert(user.name.clone(), user);
        }
        let groups = file
            .groups
            .into_iter()
            .map(|g| (g.name.clone(), g))
            .collect();
        Ok(Self { users, groups })
    }

    pub fn lookup_group(&self, name: &str) -> Result<&Group, DirectoryError> {
        self.groups
            .get(name)
            .ok_or_else(|| DirectoryError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl Directory for StaticDirectory {
    fn verify_credentials(&self, name: &str, password: &str) -> Result<Principal, DirectoryError> {
        match self.users.get(name) {
            Some(user) if !password.is_empty() && verify_password(password, &user.password) => {
                Ok(user.principal())
            }
            _ => Err(DirectoryError::InvalidCredentials(name.to_string())),
        }
    }

    fn lookup_principal(&self, name: &str) -> Result<Principal, DirectoryError> {
        self.users
            .get(name)
            .map(UserRecord::principal)
            .ok_or_else(|| DirectoryError::NotFound(name.to_string()))
    }
}
