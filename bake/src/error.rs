//! Error and warning types for baking.

use std::path::PathBuf;

use oven_core::compute::Cancelled;
use oven_core::mesh::{EncodeError, FinalizeError};

/// Failures of a single texture conversion job.
#[derive(Debug)]
pub enum TextureError {
    /// The source file could not be read.
    Load {
        /// Source path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The source bytes are not a decodable image.
    Decode(String),
    /// The converter could not produce baked bytes.
    Encode(String),
    /// The baked file could not be written.
    Write {
        /// Output path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The source is remote and no content was supplied.
    RemoteSource(String),
    /// The job observed cancellation before finishing.
    Cancelled,
    /// The converter panicked.
    Panicked(String),
}

impl std::fmt::Display for TextureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Decode(msg) => write!(f, "failed to decode texture: {msg}"),
            Self::Encode(msg) => write!(f, "failed to encode texture: {msg}"),
            Self::Write { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
            Self::RemoteSource(url) => write!(f, "cannot fetch remote texture {url}"),
            Self::Cancelled => f.write_str("texture job cancelled"),
            Self::Panicked(msg) => write!(f, "texture converter panicked: {msg}"),
        }
    }
}

impl std::error::Error for TextureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Load { source, .. } | Self::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<Cancelled> for TextureError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

impl From<image::ImageError> for TextureError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Errors that abort a bake.
#[derive(Debug)]
pub enum BakeError {
    /// A mesh broke the attribute-length or index contract.
    ContractViolation {
        /// Mesh label.
        mesh: String,
        /// Encoder error describing the violation.
        source: EncodeError,
    },
    /// A mesh was already compressed by an earlier bake.
    AlreadyCompressed {
        /// Mesh label.
        mesh: String,
    },
    /// No mesh could be turned into geometry.
    Finalize {
        /// Mesh label.
        mesh: String,
        /// Finalization error of that mesh.
        source: FinalizeError,
    },
    /// A texture reference points at an already baked texture.
    AlreadyBakedTexture {
        /// Canonical texture URL.
        url: String,
    },
    /// A texture conversion job failed.
    TextureConversion {
        /// Canonical texture URL.
        url: String,
        /// Job error.
        source: TextureError,
    },
    /// Copying an original texture into the archive folder failed.
    ArchivalIo {
        /// Destination path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The output folder could not be created.
    OutputFolder {
        /// Output folder.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The bake was aborted by its owner.
    Aborted,
}

impl std::fmt::Display for BakeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContractViolation { mesh, source } => write!(f, "mesh {mesh}: {source}"),
            Self::AlreadyCompressed { mesh } => {
                write!(f, "mesh {mesh}: cannot re-bake a file that contains compressed mesh")
            }
            Self::Finalize { mesh, source } => {
                write!(f, "mesh {mesh}: failed to finalize geometry: {source}")
            }
            Self::AlreadyBakedTexture { url } => {
                write!(f, "cannot re-bake a file that references an already baked texture: {url}")
            }
            Self::TextureConversion { url, source } => {
                write!(f, "failed to bake texture {url}: {source}")
            }
            Self::ArchivalIo { path, source } => {
                write!(f, "failed to archive original texture to {}: {source}", path.display())
            }
            Self::OutputFolder { path, source } => {
                write!(f, "failed to create output folder {}: {source}", path.display())
            }
            Self::Aborted => f.write_str("bake aborted"),
        }
    }
}

impl std::error::Error for BakeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ContractViolation { source, .. } => Some(source),
            Self::Finalize { source, .. } => Some(source),
            Self::TextureConversion { source, .. } => Some(source),
            Self::ArchivalIo { source, .. } | Self::OutputFolder { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Non-fatal problems reported alongside a bake.
#[derive(Debug, Clone, PartialEq)]
pub enum BakeWarning {
    /// A part with index lists that are not multiples of three was skipped.
    MalformedPart {
        /// Mesh label.
        mesh: String,
        /// Part index.
        part: usize,
    },
    /// A texture in a format the baker cannot convert was left out.
    UnsupportedTextureFormat {
        /// Canonical texture URL.
        url: String,
    },
    /// A mesh failed to finalize and was left out of the tree.
    MeshSkipped {
        /// Mesh label.
        mesh: String,
        /// Finalization error.
        reason: FinalizeError,
    },
}

impl std::fmt::Display for BakeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPart { mesh, part } => {
                write!(f, "mesh {mesh}: skipped part {part} with invalid index data")
            }
            Self::UnsupportedTextureFormat { url } => {
                write!(f, "texture {url} has an unsupported format and was not baked")
            }
            Self::MeshSkipped { mesh, reason } => write!(f, "mesh {mesh} skipped: {reason}"),
        }
    }
}

/// Errors loading a [`BakeConfig`](crate::BakeConfig).
#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Read {
        /// Config path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for a bake config.
    Parse {
        /// Config path.
        path: PathBuf,
        /// TOML error.
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => write!(f, "failed to read {}: {source}", path.display()),
            Self::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}
