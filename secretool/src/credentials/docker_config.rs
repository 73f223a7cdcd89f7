use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The JSON payload stored under `.dockerconfigjson`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DockerConfigJson {
    #[serde(default)]
    pub auths: BTreeMap<String, DockerAuth>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DockerAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl DockerConfigJson {
    #[inline]
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> { serde_json::from_slice(data) }

    /// Registry hosts this configuration authenticates to.
    pub fn hosts(&self) -> impl Iterator<Item = &str> { self.auths.keys().map(String::as_str) }
}
