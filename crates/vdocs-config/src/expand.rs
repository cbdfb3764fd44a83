//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in a string.
///
/// `${VAR}` errors if VAR is unset. Strings without `${` are returned
/// unchanged, so bare `$VAR` is never expanded.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, UnsetVar> {
        std::env::var(var).map(Some).map_err(|_| UnsetVar(var.to_owned()))
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.0),
    })
}

/// Name of a variable that is referenced but not set.
struct UnsetVar(String);

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_expand_simple_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("VDOCS_EXPAND_SIMPLE", "/srv/content");
        }
        let result = expand_env("${VDOCS_EXPAND_SIMPLE}", "storage.root").unwrap();
        assert_eq!(result, "/srv/content");
        unsafe {
            std::env::remove_var("VDOCS_EXPAND_SIMPLE");
        }
    }

    #[test]
    fn test_expand_with_default() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("VDOCS_EXPAND_UNSET");
        }
        let result = expand_env("${VDOCS_EXPAND_UNSET:-0.0.0.0}", "server.host").unwrap();
        assert_eq!(result, "0.0.0.0");
    }

    #[test]
    fn test_expand_embedded_vars() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("VDOCS_EXPAND_BASE", "/etc/vdocs");
        }
        let result = expand_env("${VDOCS_EXPAND_BASE}/registry.yaml", "registry.path").unwrap();
        assert_eq!(result, "/etc/vdocs/registry.yaml");
        unsafe {
            std::env::remove_var("VDOCS_EXPAND_BASE");
        }
    }

    #[test]
    fn test_expand_missing_var_error() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("VDOCS_EXPAND_MISSING");
        }
        let err = expand_env("${VDOCS_EXPAND_MISSING}", "storage.root").unwrap_err();

        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("VDOCS_EXPAND_MISSING"));
        assert!(err.to_string().contains("storage.root"));
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        assert_eq!(expand_env("$HOME/docs", "storage.root").unwrap(), "$HOME/docs");
    }
}
