//! Shared test doubles for bake integration tests.
//!
//! - [`ScriptedConverter`] decides per source URL whether a conversion
//!   succeeds, fails, panics, or blocks until cancelled.
//! - [`DeferredWorker`] queues dispatched jobs until the test runs them, so
//!   completion and cancellation ordering is deterministic.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use oven_bake::{
    BakeConfig, BakeContext, ConversionRequest, TextureConverter, TextureError,
};
use oven_core::compute::{Work, WorkerSource};
use oven_core::mesh::{Mesh, MeshPart};

// ============================================================================
// Scripted converter
// ============================================================================

/// What the converter does for a given URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Return the source bytes unchanged.
    Succeed,
    /// Return a decode error.
    Fail,
    /// Spin until the job is cancelled, then report cancellation.
    BlockUntilCancelled,
    /// Panic inside the converter.
    Panic,
}

/// Converter whose behaviour is scripted per URL suffix.
#[derive(Default)]
pub struct ScriptedConverter {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behaviour for every URL ending in `suffix`.
    pub fn with(mut self, suffix: &str, script: Script) -> Self {
        self.scripts.insert(suffix.to_string(), script);
        self
    }

    /// URLs passed to `convert`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn script_for(&self, url: &str) -> Script {
        self.scripts
            .iter()
            .find(|(suffix, _)| url.ends_with(suffix.as_str()))
            .map(|(_, script)| *script)
            .unwrap_or(Script::Succeed)
    }
}

impl TextureConverter for ScriptedConverter {
    fn convert(&self, request: ConversionRequest<'_>) -> Result<Vec<u8>, TextureError> {
        self.calls.lock().push(request.url.to_string());
        match self.script_for(request.url) {
            Script::Succeed => Ok(request.source.to_vec()),
            Script::Fail => Err(TextureError::Decode(format!("scripted failure for {}", request.url))),
            Script::BlockUntilCancelled => {
                let deadline = Instant::now() + Duration::from_secs(10);
                while !request.cancel.is_cancelled() {
                    if Instant::now() > deadline {
                        return Err(TextureError::Encode("never cancelled".into()));
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(TextureError::Cancelled)
            }
            Script::Panic => panic!("decoder blew up on {}", request.url),
        }
    }
}

// ============================================================================
// Deferred worker
// ============================================================================

/// Worker source that holds jobs until the test runs them.
#[derive(Default)]
pub struct DeferredWorker {
    queue: Mutex<VecDeque<Work>>,
}

impl DeferredWorker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run the oldest queued job. Returns `false` if none was queued.
    pub fn run_next(&self) -> bool {
        let work = self.queue.lock().pop_front();
        match work {
            Some(work) => {
                work();
                true
            }
            None => false,
        }
    }

    /// Run the job at `index` in queue order.
    pub fn run_at(&self, index: usize) -> bool {
        let work = self.queue.lock().remove(index);
        match work {
            Some(work) => {
                work();
                true
            }
            None => false,
        }
    }

    /// Run every queued job.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }
}

impl WorkerSource for DeferredWorker {
    fn dispatch(&self, work: Work) {
        self.queue.lock().push_back(work);
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Build a context around the given worker and converter.
pub fn context(
    output_dir: &Path,
    workers: Arc<dyn WorkerSource>,
    converter: Arc<dyn TextureConverter>,
) -> BakeContext {
    BakeContext::new(
        BakeConfig::default().with_output_dir(output_dir),
        workers,
        converter,
    )
}

/// A unit quad made of two triangles using `material`.
pub fn quad_mesh(material: &str) -> Mesh {
    Mesh::new(vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
    ])
    .with_part(MeshPart::new(material).with_triangles(vec![0, 1, 2, 0, 2, 3]))
}

/// Encoded PNG of a solid colour.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    let mut cursor = std::io::Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageFormat::Png)
        .expect("encode png");
    cursor.into_inner()
}

/// Write a file, creating parent folders.
pub fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent");
    }
    std::fs::write(path, bytes).expect("write file");
}
