//! Container image references.
//!
//! The reference is cut at the first `:` before the registry host is taken,
//! so `reg.example.com:5000/app:v1` has host `reg.example.com` and a bare
//! `library/nginx` has host `library`. No default registry is assumed.

/// An image reference split into registry host, repository path and tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ImageReference<'a> {
    pub host: &'a str,

    /// Everything between the host and the first `:`, without the leading
    /// `/`. Empty when the reference has no `/` before its first `:`.
    pub path: &'a str,

    /// Everything after the first `:`.
    pub tag: Option<&'a str>,
}

impl<'a> ImageReference<'a> {
    /// Returns `None` when the host segment is empty.
    #[must_use]
    pub fn parse(image: &'a str) -> Option<Self> {
        let (repository, tag) = match image.split_once(':') {
            Some((repository, tag)) => (repository, Some(tag)),
            None => (image, None),
        };
        let (host, path) = repository.split_once('/').unwrap_or((repository, ""));
        if host.is_empty() {
            return None;
        }
        Some(Self { host, path, tag })
    }
}

/// Registry host used to look up credentials for `image`.
#[inline]
#[must_use]
pub fn registry_host(image: &str) -> Option<&str> {
    ImageReference::parse(image).map(|reference| reference.host)
}
