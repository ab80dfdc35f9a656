use std::path::{Path, PathBuf};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// The object holding one or more chunks.
///
/// A chunk source is an absolute URL.
/// Filesystem paths are accepted on creation and converted to `file://` URLs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChunkSource(Url);

/// An invalid chunk source.
#[derive(Debug, Clone, Error)]
#[error("invalid chunk source `{0}`")]
pub struct InvalidChunkSourceError(String);

impl InvalidChunkSourceError {
    /// Create a new invalid chunk source error.
    #[must_use]
    pub fn new(source: String) -> Self {
        Self(source)
    }
}

impl ChunkSource {
    /// Create a new chunk source from a URL or a filesystem path.
    ///
    /// Relative paths are resolved against the current working directory.
    ///
    /// # Errors
    /// Returns [`InvalidChunkSourceError`] if `source` is empty or is neither a URL nor a representable path.
    pub fn new(source: &str) -> Result<Self, InvalidChunkSourceError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(InvalidChunkSourceError::new(source.to_string()));
        }
        match Url::parse(source) {
            // Single letter schemes are Windows drive letters.
            Ok(url) if url.scheme().len() > 1 => Ok(Self(url)),
            Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => Self::from_path(source),
            Err(_) => Err(InvalidChunkSourceError::new(source.to_string())),
        }
    }

    /// Create a new chunk source from a filesystem path.
    ///
    /// # Errors
    /// Returns [`InvalidChunkSourceError`] if the path cannot be made absolute or converted to a URL.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, InvalidChunkSourceError> {
        let path = path.as_ref();
        let invalid = || InvalidChunkSourceError::new(path.display().to_string());
        let path = std::path::absolute(path).map_err(|_| invalid())?;
        Url::from_file_path(&path).map(Self).map_err(|()| invalid())
    }

    /// Create a new chunk source from a URL.
    #[must_use]
    pub fn from_url(url: Url) -> Self {
        Self(url)
    }

    /// Return the underlying URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Return the URL scheme, e.g. `https` or `file`.
    #[must_use]
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Return the chunk source as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns true if the chunk source is an `http` or `https` URL.
    #[must_use]
    pub fn is_http(&self) -> bool {
        matches!(self.scheme(), "http" | "https")
    }

    /// Returns true if the chunk source is a `file` URL.
    #[must_use]
    pub fn is_file(&self) -> bool {
        self.scheme() == "file"
    }

    /// Return the filesystem path of a `file` chunk source.
    #[must_use]
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.is_file() {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }
}

impl TryFrom<&str> for ChunkSource {
    type Error = InvalidChunkSourceError;

    fn try_from(source: &str) -> Result<Self, Self::Error> {
        Self::new(source)
    }
}

impl TryFrom<String> for ChunkSource {
    type Error = InvalidChunkSourceError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Self::new(&source)
    }
}

impl From<ChunkSource> for String {
    fn from(source: ChunkSource) -> Self {
        source.0.into()
    }
}

impl From<Url> for ChunkSource {
    fn from(url: Url) -> Self {
        Self(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_source_url() {
        let source = ChunkSource::new("https://data.example.org/granule.h5").unwrap();
        assert!(source.is_http());
        assert!(!source.is_file());
        assert_eq!(source.scheme(), "https");
        assert_eq!(source.to_string(), "https://data.example.org/granule.h5");
        assert_eq!(source.to_file_path(), None);
    }

    #[test]
    fn chunk_source_path() {
        let source = ChunkSource::new("/tmp/granule.h5").unwrap();
        assert!(source.is_file());
        assert_eq!(source.as_str(), "file:///tmp/granule.h5");
        assert_eq!(
            source.to_file_path(),
            Some(PathBuf::from("/tmp/granule.h5"))
        );

        let relative = ChunkSource::new("granule.h5").unwrap();
        assert!(relative.is_file());
        assert!(relative.as_str().ends_with("/granule.h5"));
    }

    #[test]
    fn chunk_source_invalid() {
        assert!(ChunkSource::new("").is_err());
        assert!(ChunkSource::new("   ").is_err());
        assert!(ChunkSource::new("http://[::1").is_err());
    }

    #[test]
    fn chunk_source_serde() {
        let source: ChunkSource =
            serde_json::from_str(r#""http://localhost/data.h5""#).unwrap();
        assert_eq!(source.as_str(), "http://localhost/data.h5");
        assert_eq!(
            serde_json::to_string(&source).unwrap(),
            r#""http://localhost/data.h5""#
        );
        assert!(serde_json::from_str::<ChunkSource>(r#""""#).is_err());
    }
}
