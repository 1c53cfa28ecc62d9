//! MCP Resources Support
//!
//! Expose local files as MCP resources that AI clients can browse and read.
//! The engine only sees the [`ResourceProvider`] trait; [`FileResourceProvider`]
//! is the file-backed implementation used by the binary.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::mcp::mime;

/// Scheme prefix for file-backed resource URIs.
pub const RESOURCE_URI_PREFIX: &str = "file://";

/// Directories registered by default when they exist under the resource root.
pub const COMMON_RESOURCE_DIRS: &[&str] =
    &["templates", "examples", "scripts", "workflows", "docs"];

/// A resource exposed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResourceMeta>,
}

/// Backing file information attached to resources and their contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    pub size: u64,
    pub path: String,
}

/// Resource contents. Exactly one of `text` or `blob` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>, // base64 encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResourceMeta>,
}

/// Result of resources/list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResourcesResult {
    pub resources: Vec<Resource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Result of resources/read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContents>,
}

/// Source of URI-addressed, read-only resources.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// List every resource currently available.
    async fn list_resources(&self) -> Result<Vec<Resource>>;

    /// Read the contents of a single resource.
    async fn read_resource(&self, uri: &str) -> Result<ResourceContents>;
}

/// Serves files registered by URI from the local filesystem.
#[derive(Debug, Clone)]
pub struct FileResourceProvider {
    base_path: PathBuf,
    paths: HashMap<String, PathBuf>,
    descriptions: HashMap<String, String>,
}

impl FileResourceProvider {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            paths: HashMap::new(),
            descriptions: HashMap::new(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Number of registered resources.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Register a single file under `uri`.
    ///
    /// Relative paths resolve against the base path. An empty description is
    /// not stored, so listings fall back to `File: <basename>`.
    pub fn register_resource(
        &mut self,
        uri: impl Into<String>,
        path: impl AsRef<Path>,
        description: &str,
    ) {
        let uri = uri.into();
        let path = self.resolve(path.as_ref());
        if description.is_empty() {
            self.descriptions.remove(&uri);
        } else {
            self.descriptions.insert(uri.clone(), description.to_string());
        }
        self.paths.insert(uri, path);
    }

    /// Register every file below `dir` (relative to the base path).
    ///
    /// Each file gets the URI `<prefix>/<relative path>` with forward slashes.
    /// Returns the number of files registered.
    pub fn register_directory(
        &mut self,
        uri_prefix: &str,
        dir: impl AsRef<Path>,
    ) -> Result<usize> {
        let root = self.resolve(dir.as_ref());

        let meta = std::fs::metadata(&root).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::InvalidPath(format!("directory does not exist: {}", root.display()))
            } else {
                Error::Io(e)
            }
        })?;
        if !meta.is_dir() {
            return Err(Error::InvalidPath(format!(
                "path is not a directory: {}",
                root.display()
            )));
        }

        let prefix = uri_prefix.trim_end_matches('/');
        let mut count = 0;

        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if entry.file_type().is_dir() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            let uri = format!("{}/{}", prefix, relative);

            self.descriptions
                .insert(uri.clone(), format!("File: {}", file_name(entry.path())));
            self.paths.insert(uri, entry.into_path());
            count += 1;
        }

        debug!("Registered {} resources under {}", count, prefix);
        Ok(count)
    }

    /// Register `file://<dir>` for each of `dirs` that exists under the base path.
    ///
    /// Missing directories and walk failures are logged and skipped.
    pub fn register_common_directories<S: AsRef<str>>(&mut self, dirs: &[S]) -> usize {
        let mut total = 0;
        for dir in dirs {
            let dir = dir.as_ref();
            if !self.base_path.join(dir).is_dir() {
                debug!("Skipping resource directory {} (not present)", dir);
                continue;
            }
            let prefix = format!("{}{}", RESOURCE_URI_PREFIX, dir);
            match self.register_directory(&prefix, dir) {
                Ok(count) => total += count,
                Err(e) => warn!("Failed to register resource directory {}: {}", dir, e),
            }
        }
        total
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Find the backing path for a URI, trying the percent-decoded form second.
    fn lookup(&self, uri: &str) -> Option<&PathBuf> {
        self.paths.get(uri).or_else(|| {
            let decoded = percent_decode_str(uri).decode_utf8_lossy();
            if decoded != uri {
                self.paths.get(decoded.as_ref())
            } else {
                None
            }
        })
    }
}

#[async_trait]
impl ResourceProvider for FileResourceProvider {
    async fn list_resources(&self) -> Result<Vec<Resource>> {
        let mut resources = Vec::with_capacity(self.paths.len());

        for (uri, path) in &self.paths {
            let meta = match fs::metadata(path).await {
                Ok(meta) => meta,
                Err(e) => {
                    debug!("Skipping resource {}: {}", uri, e);
                    continue;
                }
            };

            let name = file_name(path);
            let description = self
                .descriptions
                .get(uri)
                .cloned()
                .unwrap_or_else(|| format!("File: {}", name));

            resources.push(Resource {
                uri: uri.clone(),
                name,
                description: Some(description),
                mime_type: Some(
                    mime::from_extension(path)
                        .unwrap_or(mime::OCTET_STREAM)
                        .to_string(),
                ),
                meta: Some(ResourceMeta {
                    size: meta.len(),
                    path: path.to_string_lossy().to_string(),
                }),
            });
        }

        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        Ok(resources)
    }

    async fn read_resource(&self, uri: &str) -> Result<ResourceContents> {
        if uri.is_empty() {
            return Err(Error::InvalidResourceUri(uri.to_string()));
        }

        let path = self
            .lookup(uri)
            .ok_or_else(|| Error::ResourceNotFound(uri.to_string()))?;

        let mut file = fs::File::open(path)
            .await
            .map_err(|e| Error::from_resource_io(uri, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| Error::from_resource_io(uri, e))?
            .len();

        let mime_type = match mime::from_extension(path) {
            Some(mime) => mime.to_string(),
            None => {
                let mut head = Vec::with_capacity(mime::SNIFF_LEN);
                (&mut file)
                    .take(mime::SNIFF_LEN as u64)
                    .read_to_end(&mut head)
                    .await?;
                file.seek(SeekFrom::Start(0)).await?;
                mime::detect_content_type(&head).to_string()
            }
        };

        let mut content = Vec::with_capacity(size as usize);
        file.read_to_end(&mut content).await?;

        let (text, blob) = if is_text_mime_type(&mime_type) {
            (Some(String::from_utf8_lossy(&content).into_owned()), None)
        } else {
            (None, Some(STANDARD.encode(&content)))
        };

        Ok(ResourceContents {
            uri: uri.to_string(),
            mime_type: Some(mime_type),
            text,
            blob,
            meta: Some(ResourceMeta {
                size,
                path: path.to_string_lossy().to_string(),
            }),
        })
    }
}

/// Whether content of this MIME type should be returned as text.
pub fn is_text_mime_type(mime_type: &str) -> bool {
    const TEXT_MARKERS: &[&str] = &[
        "json",
        "xml",
        "javascript",
        "typescript",
        "yaml",
        "markdown",
        "css",
        "csv",
    ];

    mime_type.starts_with("text/")
        || TEXT_MARKERS.iter().any(|m| mime_type.contains(m))
        || mime_type == "application/x-sh"
        || mime_type == "application/x-shellscript"
}

/// Build a `file://` URI for a path, normalizing separators.
pub fn build_resource_uri(path: &str) -> String {
    let normalized = path.replace('\\', "/");
    if normalized.starts_with('/') {
        format!("{}{}", RESOURCE_URI_PREFIX, normalized)
    } else {
        format!("{}/{}", RESOURCE_URI_PREFIX, normalized)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
