//! Credential resolution.
//!
//! The token is given either literally or as the path of a file holding it.
//! When no value is configured, the `BATCHRUN_TOKEN` environment variable is
//! used instead. Whatever the origin, the token must be non-empty, contain
//! no whitespace and be at least [`MIN_TOKEN_LEN`] characters long.

use std::path::Path;

use crate::error::SetupError;

/// Environment variable consulted when no token is configured. Also the
/// variable a [`crate::executor::ProcessExecutor`] exports to its children.
pub const TOKEN_ENV: &str = "BATCHRUN_TOKEN";

pub const MIN_TOKEN_LEN: usize = 16;

/// Resolve the token from a configured value, falling back to the
/// environment.
pub fn resolve(configured: Option<&str>) -> Result<String, SetupError> {
    resolve_from(configured, std::env::var(TOKEN_ENV).ok())
}

/// [`resolve`] with the environment value passed in.
fn resolve_from(configured: Option<&str>, env: Option<String>) -> Result<String, SetupError> {
    let raw = match (configured, env) {
        (Some(value), _) => value.to_string(),
        (None, Some(value)) => value,
        (None, None) => return Err(SetupError::TokenMissing { env: TOKEN_ENV }),
    };
    let token = load(&raw)?;
    validate(&token)?;
    Ok(token)
}

/// Read the token from `value` when it names a file, otherwise use it as is.
fn load(value: &str) -> Result<String, SetupError> {
    let path = Path::new(value);
    if !path.is_file() {
        return Ok(value.trim().to_string());
    }
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| SetupError::TokenInvalid(format!("cannot read {}: {e}", path.display())))
}

pub fn validate(token: &str) -> Result<(), SetupError> {
    if token.is_empty() {
        return Err(SetupError::TokenInvalid("token is empty".into()));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(SetupError::TokenInvalid("token contains whitespace".into()));
    }
    if token.chars().count() < MIN_TOKEN_LEN {
        return Err(SetupError::TokenInvalid(format!(
            "token is shorter than {MIN_TOKEN_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "abcdefghijklmnopqrstuvwxyz012345";

    #[test]
    fn literal_token() {
        assert_eq!(resolve(Some(GOOD)).unwrap(), GOOD);
    }

    #[test]
    fn token_from_file_is_trimmed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, format!("{GOOD}\n")).unwrap();
        assert_eq!(resolve(path.to_str()).unwrap(), GOOD);
    }

    #[test]
    fn file_with_bad_token_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "two words here and more words").unwrap();
        assert!(matches!(resolve(path.to_str()), Err(SetupError::TokenInvalid(_))));
    }

    #[test]
    fn configured_value_wins_over_environment() {
        let token = resolve_from(Some(GOOD), Some("environment-token-0123".into())).unwrap();
        assert_eq!(token, GOOD);
    }

    #[test]
    fn falls_back_to_environment() {
        assert_eq!(resolve_from(None, Some(GOOD.into())).unwrap(), GOOD);
        assert!(matches!(
            resolve_from(None, Some("short".into())),
            Err(SetupError::TokenInvalid(_))
        ));
    }

    #[test]
    fn environment_may_name_a_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, format!("  {GOOD}\n")).unwrap();
        let env = path.to_str().map(str::to_string);
        assert_eq!(resolve_from(None, env).unwrap(), GOOD);
    }

    #[test]
    fn nothing_configured_is_missing() {
        assert!(matches!(
            resolve_from(None, None),
            Err(SetupError::TokenMissing { env: TOKEN_ENV })
        ));
    }

    #[test]
    fn validation_rules() {
        assert!(validate(GOOD).is_ok());
        assert!(matches!(validate(""), Err(SetupError::TokenInvalid(_))));
        assert!(matches!(validate("short"), Err(SetupError::TokenInvalid(_))));
        assert!(matches!(
            validate("abcdefgh ijklmnopqrst"),
            Err(SetupError::TokenInvalid(_))
        ));
    }
}
