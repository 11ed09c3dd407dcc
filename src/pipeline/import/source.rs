//! Asset sources: materialize raw image bytes for an upload reference.
//!
//! The verification core only ever sees bytes. Where those bytes live (local
//! upload directory, remote object storage) is the source's concern. Every
//! source enforces a size cap, and remote fetches fail closed on timeout.

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use super::asset::ImageAsset;
use super::AssetError;
use crate::pipeline_config::FetchConfig;

/// Supplies image bytes for an upload reference.
///
/// Implementations are blocking; async callers dispatch them with
/// `spawn_blocking`.
pub trait AssetSource: Send + Sync {
    fn fetch(&self, reference: &str) -> Result<ImageAsset, AssetError>;
}

// ── LocalAssetSource ──────────────────────────────────────

/// Reads uploads from a directory. References are paths relative to `root`.
pub struct LocalAssetSource {
    root: PathBuf,
    max_bytes: usize,
}

impl LocalAssetSource {
    pub fn new(root: &Path, max_bytes: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            max_bytes,
        }
    }

    /// Resolve a reference under the root, rejecting absolute paths and `..`.
    fn resolve(&self, reference: &str) -> Result<PathBuf, AssetError> {
        let relative = Path::new(reference);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if reference.trim().is_empty() || escapes {
            return Err(AssetError::PathTraversal(reference.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl AssetSource for LocalAssetSource {
    fn fetch(&self, reference: &str) -> Result<ImageAsset, AssetError> {
        let path = self.resolve(reference)?;
        let metadata = match std::fs::metadata(&path) {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(AssetError::NotFound(reference.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssetError::NotFound(reference.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let size = metadata.len() as usize;
        if size > self.max_bytes {
            return Err(AssetError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }

        tracing::debug!(reference, size, "Reading local upload");
        Ok(ImageAsset::from_path(&path)?)
    }
}

// ── RemoteAssetSource ─────────────────────────────────────

/// Downloads uploads over HTTP(S) (e.g. object-storage URLs).
pub struct RemoteAssetSource {
    timeout: Duration,
    max_bytes: usize,
    client: OnceLock<reqwest::blocking::Client>,
}

impl RemoteAssetSource {
    pub fn new(timeout: Duration, max_bytes: usize) -> Self {
        Self {
            timeout,
            max_bytes,
            client: OnceLock::new(),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.timeout(), config.max_bytes)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// The blocking client is built on first use, on the calling (blocking) thread.
    fn client(&self) -> Result<&reqwest::blocking::Client, AssetError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| AssetError::HttpClient(e.to_string()))?;
        Ok(self.client.get_or_init(|| built))
    }
}

impl AssetSource for RemoteAssetSource {
    fn fetch(&self, reference: &str) -> Result<ImageAsset, AssetError> {
        let response = self.client()?.get(reference).send().map_err(|e| {
            if e.is_timeout() {
                AssetError::Timeout(self.timeout.as_secs())
            } else {
                AssetError::HttpClient(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::HttpStatus {
                status: status.as_u16(),
                url: reference.to_string(),
            });
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(AssetError::TooLarge {
                    size: len as usize,
                    max: self.max_bytes,
                });
            }
        }

        let declared_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
            .unwrap_or_default();
        let filename = filename_from_url(response.url().path());

        // Read at most max_bytes + 1 so an oversized body without a
        // Content-Length header is still rejected.
        let mut bytes = Vec::new();
        response
            .take(self.max_bytes as u64 + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    AssetError::Timeout(self.timeout.as_secs())
                } else {
                    AssetError::Io(e)
                }
            })?;
        if bytes.len() > self.max_bytes {
            return Err(AssetError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        tracing::debug!(
            size = bytes.len(),
            mime = %declared_mime,
            "Downloaded remote upload"
        );
        Ok(ImageAsset::new(bytes, &declared_mime, &filename))
    }
}

/// Last non-empty path segment of a URL path.
fn filename_from_url(path: &str) -> String {
    path.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("upload")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_fetch_reads_file_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("front.jpg"), [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

        let source = LocalAssetSource::new(dir.path(), 1024);
        let asset = source.fetch("front.jpg").unwrap();
        assert_eq!(asset.len(), 4);
        assert_eq!(asset.declared_mime, "image/jpeg");
    }

    #[test]
    fn local_fetch_nested_reference() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("user-1")).unwrap();
        std::fs::write(dir.path().join("user-1/back.png"), [0x89, 0x50, 0x4E, 0x47]).unwrap();

        let source = LocalAssetSource::new(dir.path(), 1024);
        let asset = source.fetch("./user-1/back.png").unwrap();
        assert_eq!(asset.declared_filename, "back.png");
    }

    #[test]
    fn local_fetch_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalAssetSource::new(dir.path(), 1024);
        let err = source.fetch("nope.jpg").unwrap_err();
        assert!(matches!(err, AssetError::NotFound(_)));
    }

    #[test]
    fn local_fetch_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("folder")).unwrap();
        let source = LocalAssetSource::new(dir.path(), 1024);
        let err = source.fetch("folder").unwrap_err();
        assert!(matches!(err, AssetError::NotFound(_)));
    }

    #[test]
    fn local_fetch_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let source = LocalAssetSource::new(dir.path(), 1024);
        assert!(matches!(
            source.fetch("../secret.jpg").unwrap_err(),
            AssetError::PathTraversal(_)
        ));
        assert!(matches!(
            source.fetch("/etc/passwd").unwrap_err(),
            AssetError::PathTraversal(_)
        ));
        assert!(matches!(
            source.fetch("").unwrap_err(),
            AssetError::PathTraversal(_)
        ));
    }

    #[test]
    fn local_fetch_enforces_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.jpg"), vec![0u8; 2048]).unwrap();

        let source = LocalAssetSource::new(dir.path(), 1024);
        let err = source.fetch("big.jpg").unwrap_err();
        assert!(matches!(err, AssetError::TooLarge { size: 2048, max: 1024 }));
    }

    /// Serve one connection on localhost: read the request, wait `delay`,
    /// then write `response`.
    fn serve_once(response: &'static [u8], delay: Duration) -> String {
        use std::io::Write;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            std::thread::sleep(delay);
            let _ = stream.write_all(response);
        });
        format!("http://{addr}/ids/front.png")
    }

    #[test]
    fn remote_source_built_from_fetch_config() {
        let config = FetchConfig {
            timeout_secs: 7,
            max_bytes: 4096,
        };
        let source = RemoteAssetSource::from_config(&config);
        assert_eq!(source.timeout(), Duration::from_secs(7));
        assert_eq!(source.max_bytes(), 4096);

        let defaults = RemoteAssetSource::from_config(&FetchConfig::default());
        assert_eq!(defaults.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn remote_fetch_reads_body_and_mime() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: image/png; charset=binary\r\nContent-Length: 4\r\nConnection: close\r\n\r\n\x89PNG",
            Duration::ZERO,
        );
        let source = RemoteAssetSource::from_config(&FetchConfig::default());
        let asset = source.fetch(&url).unwrap();
        assert_eq!(asset.len(), 4);
        assert_eq!(asset.declared_mime, "image/png");
        assert_eq!(asset.declared_filename, "front.png");
    }

    #[test]
    fn remote_fetch_enforces_configured_cap() {
        let url = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 2048\r\nConnection: close\r\n\r\n",
            Duration::ZERO,
        );
        let source = RemoteAssetSource::from_config(&FetchConfig {
            timeout_secs: 5,
            max_bytes: 1024,
        });
        let err = source.fetch(&url).unwrap_err();
        assert!(matches!(err, AssetError::TooLarge { size: 2048, max: 1024 }));
    }

    #[test]
    fn remote_fetch_times_out_with_configured_timeout() {
        let url = serve_once(b"HTTP/1.1 200 OK\r\n\r\n", Duration::from_secs(3));
        let source = RemoteAssetSource::from_config(&FetchConfig {
            timeout_secs: 1,
            max_bytes: 1024,
        });
        let err = source.fetch(&url).unwrap_err();
        assert!(matches!(err, AssetError::Timeout(1)), "{err}");
    }

    #[test]
    fn remote_fetch_maps_error_status() {
        let url = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            Duration::ZERO,
        );
        let source = RemoteAssetSource::from_config(&FetchConfig::default());
        let err = source.fetch(&url).unwrap_err();
        assert!(matches!(err, AssetError::HttpStatus { status: 404, .. }));
    }

    #[test]
    fn filename_from_url_takes_last_segment() {
        assert_eq!(filename_from_url("/bucket/ids/front.jpg"), "front.jpg");
        assert_eq!(filename_from_url("/bucket/ids/"), "ids");
        assert_eq!(filename_from_url("/"), "upload");
    }
}
