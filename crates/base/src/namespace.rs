//! Discovery of the namespace the agent runs in.

use std::{
    fmt,
    path::{Path, PathBuf},
};

/// Environment variable that overrides namespace discovery, used when the
/// agent runs outside a cluster.
pub const DEBUG_NAMESPACE_ENV: &str = "DEBUG_NAMESPACE";

/// File mounted into every pod by the service-account admission plugin.
pub const SERVICE_ACCOUNT_NAMESPACE_FILE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// The namespace holding the administrative credentials and the agent's own
/// objects (TLS secret, webhook service).
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct HomeNamespace(String);

impl HomeNamespace {
    #[inline]
    pub fn new(namespace: impl Into<String>) -> Self { Self(namespace.into()) }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }

    /// An unresolved home namespace is the empty string.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Display for HomeNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for HomeNamespace {
    fn as_ref(&self) -> &str { &self.0 }
}

/// Resolves the home namespace from `DEBUG_NAMESPACE`, then from the mounted
/// service-account file. Falls back to the empty string.
#[must_use]
pub fn resolve_home_namespace() -> HomeNamespace {
    resolve_home_namespace_from(
        std::env::var(DEBUG_NAMESPACE_ENV).ok(),
        &PathBuf::from(SERVICE_ACCOUNT_NAMESPACE_FILE),
    )
}

pub fn resolve_home_namespace_from(env_override: Option<String>, file: &Path) -> HomeNamespace {
    if let Some(namespace) = env_override.filter(|ns| !ns.is_empty()) {
        return HomeNamespace(namespace);
    }

    match std::fs::read_to_string(file) {
        Ok(content) => HomeNamespace(content.trim().to_string()),
        Err(err) => {
            tracing::warn!(path = %file.display(), "Unable to read service account namespace, error: {err}");
            HomeNamespace::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("secretool-{name}-{}", std::process::id()));
        std::fs::write(&path, content).expect("Should write scratch file");
        path
    }

    #[test]
    fn test_env_override_wins() {
        let file = scratch_file("env-override", "from-file");
        let ns = resolve_home_namespace_from(Some("debug-ns".to_string()), &file);
        assert_eq!(ns.as_str(), "debug-ns");
        std::fs::remove_file(file).ok();
    }

    #[test]
    fn test_empty_env_override_is_ignored() {
        let file = scratch_file("empty-override", "kube-tools\n");
        let ns = resolve_home_namespace_from(Some(String::new()), &file);
        assert_eq!(ns.as_str(), "kube-tools");
        std::fs::remove_file(file).ok();
    }

    #[test]
    fn test_missing_file_yields_empty() {
        let ns = resolve_home_namespace_from(None, Path::new("/nonexistent/secretool/namespace"));
        assert!(ns.is_empty());
        assert_eq!(ns.to_string(), "");
    }
}
