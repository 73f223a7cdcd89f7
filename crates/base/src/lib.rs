pub mod consts;
pub mod namespace;

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

pub use self::namespace::{HomeNamespace, resolve_home_namespace};

pub const PROJECT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub static PROJECT_SEMVER: LazyLock<semver::Version> = LazyLock::new(|| {
    semver::Version::parse(PROJECT_VERSION).unwrap_or(semver::Version {
        major: 0,
        minor: 0,
        patch: 0,
        pre: semver::Prerelease::EMPTY,
        build: semver::BuildMetadata::EMPTY,
    })
});

pub const PROJECT_NAME: &str = "secretool";
pub const PROJECT_NAME_WITH_INITIAL_CAPITAL: &str = "Secretool";

pub const CLI_PROGRAM_NAME: &str = "secretool";
pub const CLI_CONFIG_NAME: &str = "config.yaml";

/// System-wide configuration directory.
pub static SYSTEM_CONFIG_DIR: LazyLock<PathBuf> =
    LazyLock::new(|| [Path::new("/etc"), Path::new(PROJECT_NAME)].iter().collect());

/// Directories searched for `config.yaml`, in priority order: `~/.secretool`,
/// `/etc/secretool` and the current working directory.
#[must_use]
pub fn project_config_directories() -> Vec<PathBuf> {
    let mut dirs = Vec::with_capacity(3);
    if let Some(user_dirs) = directories::UserDirs::new() {
        dirs.push([user_dirs.home_dir(), Path::new(&format!(".{PROJECT_NAME}"))].iter().collect());
    }
    dirs.push(SYSTEM_CONFIG_DIR.clone());
    dirs.push(PathBuf::from("."));
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_config_directories_order() {
        let dirs = project_config_directories();
        assert_eq!(dirs.last(), Some(&PathBuf::from(".")));
        assert!(dirs.contains(&PathBuf::from("/etc/secretool")));
        if dirs.len() == 3 {
            assert!(dirs[0].ends_with(".secretool"));
        }
    }
}
