//! Media fetching behind the [`MediaSource`] trait.

use std::path::PathBuf;
use std::time::Duration;

use ureq::Agent;

/// Request timeout for media fetches.
const DEFAULT_TIMEOUT: u64 = 30;

/// Error fetching a media file.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FetchError {
    /// HTTP transport failed (network error, timeout, ...).
    #[error("HTTP request failed")]
    Http(#[from] ureq::Error),

    /// Server returned an error status.
    #[error("HTTP error: {status} for '{path}'")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The requested media path.
        path: String,
    },

    /// Local file read failed.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

/// Fetch a media file by the path it is referenced under.
///
/// Paths are store-relative (`worlds/art/goblin.webp`) or absolute URLs;
/// implementations decide how to resolve them.
pub trait MediaSource {
    /// Fetch the file contents.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

/// [`MediaSource`] fetching over HTTP from the host server.
pub struct HttpMediaSource {
    agent: Agent,
    base_url: String,
}

impl HttpMediaSource {
    /// Create a source resolving relative paths against `base_url`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_owned()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }
}

impl MediaSource for HttpMediaSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.url_for(path);
        let response = self.agent.get(&url).call()?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            return Err(FetchError::Status {
                status,
                path: path.to_owned(),
            });
        }

        Ok(body.read_to_vec()?)
    }
}

/// [`MediaSource`] reading from a local data directory.
pub struct DirectoryMediaSource {
    root: PathBuf,
}

impl DirectoryMediaSource {
    /// Create a source resolving paths under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MediaSource for DirectoryMediaSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self.root.join(path.trim_start_matches('/'));
        Ok(std::fs::read(full)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("art")).unwrap();
        std::fs::write(dir.path().join("art/token.png"), b"bytes").unwrap();

        let source = DirectoryMediaSource::new(dir.path());
        assert_eq!(source.fetch("art/token.png").unwrap(), b"bytes");
        assert_eq!(source.fetch("/art/token.png").unwrap(), b"bytes");
    }

    #[test]
    fn directory_source_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectoryMediaSource::new(dir.path());
        assert!(matches!(source.fetch("nope.png"), Err(FetchError::Io(_))));
    }

    #[test]
    fn http_source_builds_urls() {
        let source = HttpMediaSource::new("http://localhost:30000/");
        assert_eq!(
            source.url_for("worlds/art/map.webp"),
            "http://localhost:30000/worlds/art/map.webp"
        );
        assert_eq!(
            source.url_for("https://cdn.example.com/x.png"),
            "https://cdn.example.com/x.png"
        );
    }
}
