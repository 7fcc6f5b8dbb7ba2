//! Environment lookups for configuration values
//!
//! Two concerns live here: `${VAR_NAME}` substitution in configuration
//! strings, and the Hub's own environment variables (`HF_ENDPOINT`,
//! `HF_TOKEN`, `HF_HOME`, ...).

use once_cell::sync::Lazy;
use regex::Regex;
use std::env;
use std::path::PathBuf;

use crate::config::ConfigError;

/// Hub endpoint override
pub const HF_ENDPOINT: &str = "HF_ENDPOINT";
/// Access token
pub const HF_TOKEN: &str = "HF_TOKEN";
/// Access token, legacy name
pub const HUGGING_FACE_HUB_TOKEN: &str = "HUGGING_FACE_HUB_TOKEN";
/// Root of the Hub's local state
pub const HF_HOME: &str = "HF_HOME";
/// Explicit location of the stored token file
pub const HF_TOKEN_PATH: &str = "HF_TOKEN_PATH";
/// Location of the hffs configuration file
pub const HFFS_CONFIG: &str = "HFFS_CONFIG";

/// Regex pattern for matching environment variable references: ${VAR_NAME}
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var pattern"));

/// Substitute environment variable references in a string.
///
/// Variables are referenced using the `${VAR_NAME}` syntax.
/// Returns an error listing all missing variables if any are not set.
///
/// # Examples
///
/// ```ignore
/// use hffs::env::substitute_env_vars;
///
/// std::env::set_var("MY_SECRET", "secret_value");
/// let result = substitute_env_vars("token: ${MY_SECRET}").unwrap();
/// assert_eq!(result, "token: secret_value");
/// ```
pub fn substitute_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut missing_vars: Vec<String> = Vec::new();

    let result = ENV_VAR_PATTERN.replace_all(input, |caps: &regex::Captures<'_>| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                if !missing_vars.iter().any(|v| v == var_name) {
                    missing_vars.push(var_name.to_string());
                }
                String::new()
            }
        }
    });

    if !missing_vars.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Missing environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result.into_owned())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Endpoint from `HF_ENDPOINT`, if set
pub fn hub_endpoint() -> Option<String> {
    non_empty_var(HF_ENDPOINT).map(|e| e.trim_end_matches('/').to_string())
}

/// Token from `HF_TOKEN`, falling back to `HUGGING_FACE_HUB_TOKEN`
pub fn hub_token() -> Option<String> {
    non_empty_var(HF_TOKEN).or_else(|| non_empty_var(HUGGING_FACE_HUB_TOKEN))
}

/// Root of the Hub's local state: `$HF_HOME` or `~/.cache/huggingface`
pub fn hf_home() -> Option<PathBuf> {
    if let Some(home) = non_empty_var(HF_HOME) {
        return Some(PathBuf::from(home));
    }
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".cache").join("huggingface"))
}

/// Location of the stored token file
pub fn token_path() -> Option<PathBuf> {
    non_empty_var(HF_TOKEN_PATH)
        .map(PathBuf::from)
        .or_else(|| hf_home().map(|home| home.join("token")))
}

/// Configuration file named by `HFFS_CONFIG`
pub fn config_path() -> Option<PathBuf> {
    non_empty_var(HFFS_CONFIG).map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_no_substitution_needed() {
        let input = "plain text without variables";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, input);
    }

    #[test]
    fn test_single_variable_substitution() {
        env::set_var("HFFS_TEST_VAR_SINGLE", "hello");
        let result = substitute_env_vars("prefix_${HFFS_TEST_VAR_SINGLE}_suffix").unwrap();
        assert_eq!(result, "prefix_hello_suffix");
        env::remove_var("HFFS_TEST_VAR_SINGLE");
    }

    #[test]
    fn test_same_variable_multiple_times() {
        env::set_var("HFFS_TEST_VAR_REPEAT", "value");
        let result =
            substitute_env_vars("${HFFS_TEST_VAR_REPEAT}-${HFFS_TEST_VAR_REPEAT}").unwrap();
        assert_eq!(result, "value-value");
        env::remove_var("HFFS_TEST_VAR_REPEAT");
    }

    #[test]
    fn test_value_is_not_substituted_again() {
        env::set_var("HFFS_TEST_VAR_NESTED", "${HFFS_TEST_VAR_NESTED}");
        let result = substitute_env_vars("${HFFS_TEST_VAR_NESTED}").unwrap();
        assert_eq!(result, "${HFFS_TEST_VAR_NESTED}");
        env::remove_var("HFFS_TEST_VAR_NESTED");
    }

    #[test]
    fn test_multiple_missing_variables_error() {
        let result = substitute_env_vars("${HFFS_MISSING_A_12345} and ${HFFS_MISSING_B_12345}");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("HFFS_MISSING_A_12345"));
        assert!(err.to_string().contains("HFFS_MISSING_B_12345"));
    }

    #[test]
    fn test_partial_match_not_substituted() {
        let result = substitute_env_vars("$VAR and {VAR} remain unchanged").unwrap();
        assert_eq!(result, "$VAR and {VAR} remain unchanged");
    }

    #[test]
    fn test_token_path_under_hf_home() {
        env::set_var(HF_HOME, "/tmp/hffs-test-home");
        env::remove_var(HF_TOKEN_PATH);
        assert_eq!(
            token_path(),
            Some(PathBuf::from("/tmp/hffs-test-home/token"))
        );
        env::remove_var(HF_HOME);
    }
}
