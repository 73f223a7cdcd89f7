use std::{fmt, str::FromStr};

use snafu::Snafu;

/// Which mutator path the agent runs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SetMethod {
    /// Admission webhook mutating workloads at creation.
    #[default]
    WebHook,

    /// Controllers patching live workloads after creation.
    Update,
}

impl fmt::Display for SetMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let val = match self {
            Self::WebHook => "WebHook",
            Self::Update => "Update",
        };
        f.write_str(val)
    }
}

impl FromStr for SetMethod {
    type Err = ParseSetMethodError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "webhook" => Ok(Self::WebHook),
            "update" => Ok(Self::Update),
            _ => Err(ParseSetMethodError::Invalid { value: value.to_string() }),
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ParseSetMethodError {
    #[snafu(display("'{value}' is not a valid setMethod, expect `WebHook` or `Update`"))]
    Invalid { value: String },
}
