//! Connection credentials read from the process environment.

use std::fmt;

use serde::Serialize;

use crate::drivers::common::tls::SslMode;
use crate::error::{MigrateError, Result};

/// Which side of the migration a connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Source,
    Target,
}

impl Role {
    /// Prefix of the environment variables holding this side's credentials.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Role::Source => "SOURCE_DB",
            Role::Target => "TARGET_DB",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Source => f.write_str("source"),
            Role::Target => f.write_str("target"),
        }
    }
}

/// Credentials for one database endpoint.
///
/// `dsn` is either a libpq key/value string (`host=db port=5432 dbname=app`)
/// or a `postgres://` URL. `username` and `password` always win over values
/// embedded in the DSN.
#[derive(Clone)]
pub struct Credentials {
    pub role: Role,
    pub username: String,
    pub password: String,
    pub dsn: String,
    /// Schema used to resolve unqualified table names.
    pub schema: Option<String>,
    pub ssl_mode: SslMode,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("role", &self.role)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("dsn", &self.dsn)
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl Credentials {
    /// Read `<PREFIX>_USERNAME`, `<PREFIX>_PASSWORD`, `<PREFIX>_DSN` and the
    /// optional `<PREFIX>_SCHEMA` / `<PREFIX>_SSLMODE` from the environment.
    pub fn from_env(role: Role) -> Result<Self> {
        Self::from_lookup(role, |key| std::env::var(key).ok())
    }

    /// Same as [`Credentials::from_env`] with an explicit variable lookup.
    pub fn from_lookup<F>(role: Role, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = role.env_prefix();
        let optional = |suffix: &str| {
            lookup(&format!("{}_{}", prefix, suffix))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |suffix: &str| {
            optional(suffix).ok_or_else(|| {
                MigrateError::Config(format!(
                    "environment variable {}_{} is required for the {} database",
                    prefix, suffix, role
                ))
            })
        };

        let ssl_mode = match optional("SSLMODE") {
            Some(mode) => SslMode::parse(&mode)?,
            None => SslMode::default(),
        };

        Ok(Self {
            role,
            username: required("USERNAME")?,
            password: lookup(&format!("{}_PASSWORD", prefix)).ok_or_else(|| {
                MigrateError::Config(format!(
                    "environment variable {}_PASSWORD is required for the {} database",
                    prefix, role
                ))
            })?,
            dsn: required("DSN")?,
            schema: optional("SCHEMA"),
            ssl_mode,
        })
    }
}
