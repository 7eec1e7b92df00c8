use std::path::PathBuf;

/// Process settings, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Workspace opened before the first request, if any.
    pub workspace: Option<PathBuf>,
    /// Tracing filter directives.
    pub log_filter: String,
    /// Title prefix for `questions.copy` when the request gives none.
    pub copy_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: "evalbankd=info".to_string(),
            copy_prefix: String::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        Self {
            workspace: lookup("EVALBANK_WORKSPACE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            log_filter: lookup("EVALBANK_LOG").unwrap_or(default.log_filter),
            copy_prefix: lookup("EVALBANK_COPY_PREFIX").unwrap_or(default.copy_prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        let config = Config::from_lookup(|_| None);
        assert!(config.workspace.is_none());
        assert_eq!(config.log_filter, "evalbankd=info");
        assert_eq!(config.copy_prefix, "");
    }

    #[test]
    fn blank_workspace_is_ignored() {
        let env: HashMap<&str, &str> = [
            ("EVALBANK_WORKSPACE", "  "),
            ("EVALBANK_COPY_PREFIX", "Copy of "),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert!(config.workspace.is_none());
        assert_eq!(config.copy_prefix, "Copy of ");
    }
}
