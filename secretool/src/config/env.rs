//! Environment overrides for configuration keys.
//!
//! Every key is overridable by the variable named after it, uppercased, with
//! `.` replaced by `_` (`serverPort` -> `SERVERPORT`, `log.level` ->
//! `LOG_LEVEL`). Lists are comma separated.

use std::{path::PathBuf, str::FromStr};

use super::{Config, Error};

fn variable_name(key: &str) -> String { key.replace('.', "_").to_uppercase() }

struct Overrides<F> {
    lookup: F,
}

impl<F> Overrides<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn raw(&self, key: &str) -> Option<(String, String)> {
        let variable = variable_name(key);
        (self.lookup)(&variable).map(|value| (variable, value))
    }

    fn parsed<T>(&self, key: &str, target: &mut T) -> Result<(), Error>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if let Some((variable, value)) = self.raw(key) {
            *target = value.trim().parse().map_err(|err: T::Err| Error::InvalidEnvValue {
                variable,
                value: value.clone(),
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }

    fn boolean(&self, key: &str, target: &mut bool) -> Result<(), Error> {
        if let Some((variable, value)) = self.raw(key) {
            *target = match value.trim().to_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(Error::InvalidEnvValue {
                        variable,
                        value,
                        reason: "expect one of `true`, `false`, `1`, `0`".to_string(),
                    });
                }
            };
        }
        Ok(())
    }

    fn string(&self, key: &str, target: &mut String) {
        if let Some((_, value)) = self.raw(key) {
            *target = value;
        }
    }

    fn path(&self, key: &str, target: &mut Option<PathBuf>) {
        if let Some((_, value)) = self.raw(key) {
            *target = if value.is_empty() { None } else { Some(PathBuf::from(value)) };
        }
    }

    fn list(&self, key: &str, target: &mut Vec<String>) {
        if let Some((_, value)) = self.raw(key) {
            *target = value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ToString::to_string)
                .collect();
        }
    }
}

/// Applies overrides found through `lookup` to `config`.
pub(super) fn apply<F>(config: &mut Config, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    let overrides = Overrides { lookup };

    overrides.list("watchNamespaces", &mut config.watch_namespaces);
    overrides.list("dockerSecretNames", &mut config.docker_secret_names);
    overrides.parsed("setMethod", &mut config.set_method)?;
    overrides.list("notManagerOwners", &mut config.not_manager_owners);
    overrides.parsed("serverPort", &mut config.server_port)?;
    overrides.string("serviceName", &mut config.service_name);
    overrides.boolean("autoTLS", &mut config.auto_tls)?;
    overrides.path("certFile", &mut config.cert_file);
    overrides.path("privateKeyFile", &mut config.private_key_file);
    overrides.path("rootCA", &mut config.root_ca);

    overrides.parsed("log.level", &mut config.log.level)?;
    overrides.path("log.filePath", &mut config.log.file_path);
    overrides.boolean("log.emitJournald", &mut config.log.emit_journald)?;
    overrides.boolean("log.emitStdout", &mut config.log.emit_stdout)?;
    overrides.boolean("log.emitStderr", &mut config.log.emit_stderr)?;

    Ok(())
}
