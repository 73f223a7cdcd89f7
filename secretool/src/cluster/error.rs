use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    #[snafu(display("{kind} '{name}' not found"))]
    NotFound { kind: String, name: String },

    #[snafu(display("{kind} '{name}' already exists"))]
    AlreadyExists { kind: String, name: String },

    #[snafu(display("{kind} '{name}' is invalid: {message}"))]
    Invalid { kind: String, name: String, message: String },

    #[snafu(display("Request for {kind} '{name}' was rejected: {message}"))]
    Rejected { kind: String, name: String, message: String },

    #[snafu(display("Request for {kind} '{name}' failed, error: {source}"))]
    Request {
        kind: String,
        name: String,
        #[snafu(source(from(kube::Error, Box::new)))]
        source: Box<kube::Error>,
    },

    #[snafu(display("Failed to encode {kind} '{name}', error: {source}"))]
    Encode { kind: String, name: String, source: serde_json::Error },
}

impl ApiError {
    /// Classifies a client error by HTTP status: `404` is
    /// [`ApiError::NotFound`], `422` is [`ApiError::Invalid`].
    pub fn from_kube(kind: &str, name: &str, source: kube::Error) -> Self {
        let (kind, name) = (kind.to_string(), name.to_string());
        match &source {
            kube::Error::Api(response) if response.code == 404 => Self::NotFound { kind, name },
            kube::Error::Api(response) if response.code == 422 => {
                Self::Invalid { kind, name, message: response.message.clone() }
            }
            _ => Self::Request { kind, name, source: Box::new(source) },
        }
    }

    /// Like [`ApiError::from_kube`], additionally reporting a `409 Conflict`
    /// on create as [`ApiError::AlreadyExists`].
    pub fn from_kube_create(kind: &str, name: &str, source: kube::Error) -> Self {
        match &source {
            kube::Error::Api(response) if response.code == 409 => {
                Self::AlreadyExists { kind: kind.to_string(), name: name.to_string() }
            }
            _ => Self::from_kube(kind, name, source),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }

    #[inline]
    #[must_use]
    pub const fn is_already_exists(&self) -> bool { matches!(self, Self::AlreadyExists { .. }) }

    /// The API server refused the object itself; resending it cannot succeed.
    #[inline]
    #[must_use]
    pub const fn is_invalid(&self) -> bool { matches!(self, Self::Invalid { .. }) }
}
