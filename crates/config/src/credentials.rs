//! Access credentials read from the environment.

use std::ffi::OsString;
use std::fmt;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Environment variable holding the access key id
pub const ACCESS_KEY_ID: &str = "ACCESS_KEY_ID";

/// Environment variable holding the access key secret
pub const ACCESS_KEY_SECRET: &str = "ACCESS_KEY_SECRET";

/// Errors raised while reading credentials
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("environment variable {0} must be set to a non-empty value")]
    Missing(&'static str),

    #[error("failed to read credentials from environment: {0}")]
    Env(String),
}

#[derive(Deserialize)]
struct RawCredentials {
    access_key_id: Option<String>,
    access_key_secret: Option<String>,
}

/// Access key pair used to sign every API call
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    access_key_secret: String,
}

impl Credentials {
    /// Build credentials from explicit values
    pub fn new(access_key_id: impl Into<String>, access_key_secret: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    /// Read `ACCESS_KEY_ID` and `ACCESS_KEY_SECRET` from the process environment
    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_vars(env_vars())
    }

    /// Read credentials from a set of environment-style variables.
    ///
    /// A value counts as present only when it is defined and not blank.
    pub fn from_vars<I>(vars: I) -> Result<Self, CredentialsError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let raw: RawCredentials =
            envy::from_iter(vars).map_err(|e| CredentialsError::Env(e.to_string()))?;

        let access_key_id = present(raw.access_key_id).ok_or(CredentialsError::Missing(ACCESS_KEY_ID))?;
        let access_key_secret =
            present(raw.access_key_secret).ok_or(CredentialsError::Missing(ACCESS_KEY_SECRET))?;

        debug!(access_key_id = %mask(&access_key_id), "Loaded access credentials");

        Ok(Self {
            access_key_id,
            access_key_secret,
        })
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn access_key_secret(&self) -> &str {
        &self.access_key_secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &mask(&self.access_key_id))
            .field("access_key_secret", &"<redacted>")
            .finish()
    }
}

/// The process environment, skipping variables that are not valid UTF-8
pub fn env_vars() -> impl Iterator<Item = (String, String)> {
    utf8_pairs(std::env::vars_os())
}

fn utf8_pairs<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Keep the first four characters of a key id for log correlation
fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{}****", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_reads_both_values() {
        let creds = Credentials::from_vars(vars(&[
            ("ACCESS_KEY_ID", "LTAI5tExample"),
            ("ACCESS_KEY_SECRET", "secret"),
            ("PATH", "/usr/bin"),
        ]))
        .unwrap();

        assert_eq!(creds.access_key_id(), "LTAI5tExample");
        assert_eq!(creds.access_key_secret(), "secret");
    }

    #[test]
    fn test_missing_id() {
        let err = Credentials::from_vars(vars(&[("ACCESS_KEY_SECRET", "secret")])).unwrap_err();
        assert!(matches!(err, CredentialsError::Missing(ACCESS_KEY_ID)));
    }

    #[test]
    fn test_blank_secret_is_missing() {
        let err = Credentials::from_vars(vars(&[
            ("ACCESS_KEY_ID", "LTAI5tExample"),
            ("ACCESS_KEY_SECRET", "  "),
        ]))
        .unwrap_err();
        assert!(matches!(err, CredentialsError::Missing(ACCESS_KEY_SECRET)));
    }

    #[test]
    fn test_zero_and_false_are_real_values() {
        let creds = Credentials::from_vars(vars(&[
            ("ACCESS_KEY_ID", "0"),
            ("ACCESS_KEY_SECRET", "false"),
        ]))
        .unwrap();
        assert_eq!(creds.access_key_id(), "0");
        assert_eq!(creds.access_key_secret(), "false");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let raw = vec![
            (OsString::from_vec(b"BAD\xff".to_vec()), OsString::from("1")),
            (OsString::from("OTHER"), OsString::from_vec(b"\xfe".to_vec())),
            (OsString::from("ACCESS_KEY_ID"), OsString::from("LTAI5tExample")),
            (OsString::from("ACCESS_KEY_SECRET"), OsString::from("secret")),
        ];

        let pairs: Vec<(String, String)> = utf8_pairs(raw).collect();
        assert_eq!(pairs.len(), 2);

        let creds = Credentials::from_vars(pairs).unwrap();
        assert_eq!(creds.access_key_id(), "LTAI5tExample");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials::new("LTAI5tExample", "very-secret");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("very-secret"));
        assert!(!debug.contains("LTAI5tExample"));
        assert!(debug.contains("LTAI****"));
    }
}
