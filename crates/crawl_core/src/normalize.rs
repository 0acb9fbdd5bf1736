use std::fmt;

use serde::{Serialize, Serializer};
use url::Url;

use crate::UrlError;

/// Absolute http(s) URL in canonical form; the identity key for dedup.
///
/// Canonicalisation lower-cases scheme and host, drops the default port, the
/// fragment and an empty query, and strips one trailing `/` from non-root
/// paths. The query string is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedUrl(Url);

impl NormalizedUrl {
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed).map_err(|err| UrlError::Malformed {
            input: trimmed.to_string(),
            message: err.to_string(),
        })?;
        Self::from_url(url)
    }

    /// Resolve `href` against `base`, the address the page was actually
    /// served from. The base is not normalised: stripping its trailing slash
    /// would change what relative references point at.
    pub fn resolve(base: &Url, href: &str) -> Result<Self, UrlError> {
        let trimmed = href.trim();
        let url = base.join(trimmed).map_err(|err| UrlError::Malformed {
            input: trimmed.to_string(),
            message: err.to_string(),
        })?;
        Self::from_url(url)
    }

    pub fn from_url(mut url: Url) -> Result<Self, UrlError> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(UrlError::UnsupportedScheme(other.to_string())),
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(UrlError::MissingHost(url.to_string()));
        }

        url.set_fragment(None);
        if url.query() == Some("") {
            url.set_query(None);
        }
        let path = url.path();
        if path.len() > 1 && path.ends_with('/') {
            let trimmed = path[..path.len() - 1].to_string();
            url.set_path(&trimmed);
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Host name, used as the rate-limiting key.
    pub fn domain(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.0.path()
    }

    /// Lower-cased extension of the last path segment, if it has one.
    pub fn extension(&self) -> Option<String> {
        let last = self.0.path_segments()?.last()?;
        let (stem, ext) = last.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl Serialize for NormalizedUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.as_str())
    }
}
