//! Model locations and canonical texture URLs.
//!
//! Texture references in a model are plain strings: absolute paths, paths
//! relative to the model, paths relative to the working directory, or names
//! of content embedded in the model file. They are resolved into a canonical
//! URL, which is the de-duplication key for texture jobs.

use std::path::{Path, PathBuf};

const FILE_SCHEME: &str = "file://";

/// Lexically normalize a `/`-separated path.
///
/// Drops `.` and empty segments and resolves `..` against the preceding
/// segment. A leading `/` is kept. `..` above the root is dropped.
fn normalize(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let rooted = replaced.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in replaced.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else if !rooted {
                    segments.push("..");
                }
            }
            _ => segments.push(segment),
        }
    }

    let joined = segments.join("/");
    if rooted { format!("/{joined}") } else { joined }
}

/// Split a URL into `scheme://authority` and the path that follows it.
fn split_url(url: &str) -> (&str, &str) {
    match url.find("://") {
        Some(scheme_end) => {
            let after = scheme_end + 3;
            match url[after..].find('/') {
                Some(pos) => url.split_at(after + pos),
                None => (url, ""),
            }
        }
        None => ("", url),
    }
}

/// Append a relative path to a directory URL, normalizing the result.
fn join_url(dir_url: &str, relative: &str) -> String {
    let (prefix, path) = split_url(dir_url);
    let combined = format!("{path}/{relative}");
    let mut joined = normalize(&combined);
    if !joined.starts_with('/') {
        joined.insert(0, '/');
    }
    format!("{prefix}{joined}")
}

fn file_url(path: &Path) -> String {
    let text = path.to_string_lossy();
    format!("{FILE_SCHEME}{}", normalize(&text))
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(e) => {
            log::warn!("Cannot read working directory ({e}), keeping {}", path.display());
            path.to_path_buf()
        }
    }
}

// ---------------------------------------------------------------------------
// TextureUrl
// ---------------------------------------------------------------------------

/// Canonical URL of a texture source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureUrl(String);

impl TextureUrl {
    /// Wrap an already canonical URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The URL text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the URL names a file on the local file system.
    pub fn is_local(&self) -> bool {
        self.0.starts_with(FILE_SCHEME)
    }

    /// Local file path, if the URL is a `file://` URL.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.0.strip_prefix(FILE_SCHEME).map(PathBuf::from)
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        let (_, path) = split_url(&self.0);
        path.rsplit('/').next().unwrap_or(path)
    }

    /// File name without its last extension (`brick.albedo.png` -> `brick.albedo`).
    pub fn complete_base_name(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => name,
            Some(pos) => &name[..pos],
        }
    }

    /// Last extension, without the dot. Empty when there is none.
    pub fn extension(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => "",
            Some(pos) => &name[pos + 1..],
        }
    }
}

impl std::fmt::Display for TextureUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ModelLocation
// ---------------------------------------------------------------------------

/// Where a model came from, used as the base for its texture references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelLocation {
    url: String,
    local_path: Option<PathBuf>,
}

impl ModelLocation {
    /// Parse a model URL or path.
    ///
    /// Strings without a scheme and `file://` URLs are local; relative local
    /// paths are made absolute against the working directory.
    pub fn new(url: &str) -> Self {
        if let Some(path) = url.strip_prefix(FILE_SCHEME) {
            return Self::from_path(Path::new(path));
        }
        if url.contains("://") {
            let (prefix, path) = split_url(url);
            return Self {
                url: format!("{prefix}{}", normalize(path)),
                local_path: None,
            };
        }
        Self::from_path(Path::new(url))
    }

    /// Location of a model file on disk.
    pub fn from_path(path: &Path) -> Self {
        let absolute = absolutize(path);
        let url = file_url(&absolute);
        let local_path = url.strip_prefix(FILE_SCHEME).map(PathBuf::from);
        Self { url, local_path }
    }

    /// Canonical model URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the model lives on the local file system.
    pub fn is_local(&self) -> bool {
        self.local_path.is_some()
    }

    /// Local model file path.
    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    /// URL of the folder containing the model.
    pub fn base_url(&self) -> &str {
        let (prefix, path) = split_url(&self.url);
        match path.rfind('/') {
            Some(pos) => &self.url[..prefix.len() + pos],
            None => prefix,
        }
    }

    /// Model file name without its extension.
    pub fn file_stem(&self) -> &str {
        let (_, path) = split_url(&self.url);
        let name = path.rsplit('/').next().unwrap_or(path);
        match name.rfind('.') {
            Some(0) | None => name,
            Some(pos) => &name[..pos],
        }
    }

    /// Resolve a texture reference found in this model.
    ///
    /// Precedence: embedded content lives under the model URL; an existing
    /// absolute local path is used as is; a relative path that exists next to
    /// the running process is used; anything else is assumed to sit next to
    /// the model.
    pub fn resolve_texture(&self, reference: &str, embedded: bool) -> TextureUrl {
        let cleaned = reference.replace('\\', "/");

        if embedded {
            let name = normalize(&cleaned);
            return TextureUrl(format!("{}/{}", self.url, name.trim_start_matches('/')));
        }

        if let Some(url) = Self::resolve_existing_local(&cleaned) {
            return url;
        }

        let relative = if Path::new(&cleaned).is_absolute() || cleaned.starts_with('/') {
            // An absolute path that does not exist; look for the file next to the model.
            cleaned.rsplit('/').next().unwrap_or(&cleaned).to_string()
        } else {
            cleaned
        };
        TextureUrl(join_url(self.base_url(), &relative))
    }

    fn resolve_existing_local(reference: &str) -> Option<TextureUrl> {
        if reference.contains("://") && !reference.starts_with(FILE_SCHEME) {
            return Some(TextureUrl(reference.to_string()));
        }
        let path = Path::new(reference.strip_prefix(FILE_SCHEME).unwrap_or(reference));
        if path.is_absolute() {
            return path.exists().then(|| TextureUrl(file_url(path)));
        }
        let beside_process = absolutize(path);
        if beside_process.exists() {
            log::debug!("Resolved {reference} against the working directory");
            return Some(TextureUrl(file_url(&beside_process)));
        }
        None
    }

    /// Folder of `texture` relative to the model folder.
    ///
    /// Empty when the texture is not nested below the model folder.
    pub fn archival_fragment(&self, texture: &TextureUrl) -> PathBuf {
        let Some(model_path) = &self.local_path else {
            return PathBuf::new();
        };
        let Some(texture_path) = texture.to_file_path() else {
            return PathBuf::new();
        };
        let (Some(model_dir), Some(texture_dir)) = (model_path.parent(), texture_path.parent())
        else {
            return PathBuf::new();
        };
        texture_dir
            .strip_prefix(model_dir)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ModelLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}
