//! De-duplicating registry of asynchronous texture conversion jobs.
//!
//! The registry lives on the control thread of one bake. Every distinct
//! canonical texture URL gets exactly one job and one output file name; the
//! job runs on a worker and reports back over an mpsc channel, and all
//! bookkeeping happens when the control thread drains that channel.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;

use oven_core::compute::{CancellationToken, WorkerSource};
use oven_core::texture::{BAKED_TEXTURE_EXT, TextureUsage, is_baked_format, is_supported_format};

use crate::config::BakeContext;
use crate::converter::{ConversionRequest, TextureConverter};
use crate::error::{BakeError, BakeWarning, TextureError};
use crate::location::{ModelLocation, TextureUrl};

/// Supplies the source bytes of a texture that is not read from disk.
pub type ContentSupplier = Box<dyn FnOnce() -> Arc<Vec<u8>> + Send + 'static>;

/// Lifecycle of one texture job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureJobStatus {
    /// Created, not yet handed to a worker.
    Pending,
    /// Dispatched to a worker.
    Running,
    /// Baked file written.
    Succeeded,
    /// Conversion or archival failed.
    Failed,
    /// Cancelled, or finished after the bake was aborted.
    Aborted,
}

impl TextureJobStatus {
    /// Whether the job has reached its final status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

/// Overall state of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryStatus {
    /// Jobs are still active.
    Busy,
    /// Every job succeeded.
    Finished,
    /// All jobs settled after a failure or an abort.
    Aborted,
}

/// A texture reference after URL resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureReference {
    /// Canonical source URL.
    pub url: TextureUrl,
    /// How the referencing material uses it.
    pub usage: TextureUsage,
    /// Whether the content is stored inside the model file.
    pub embedded: bool,
}

impl TextureReference {
    /// Create a reference to an external texture.
    pub fn new(url: TextureUrl, usage: TextureUsage) -> Self {
        Self {
            url,
            usage,
            embedded: false,
        }
    }

    /// Mark the reference as embedded in the model.
    #[must_use]
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }
}

// ---------------------------------------------------------------------------
// Worker side
// ---------------------------------------------------------------------------

struct JobOutput {
    path: PathBuf,
    original: Arc<Vec<u8>>,
}

struct JobCompletion {
    url: TextureUrl,
    result: Result<JobOutput, TextureError>,
}

/// Everything a worker needs to run one conversion. Owned by the worker.
struct ConversionJob {
    url: TextureUrl,
    usage: TextureUsage,
    output_name: String,
    output_path: PathBuf,
    content: Option<ContentSupplier>,
    cancel: CancellationToken,
    converter: Arc<dyn TextureConverter>,
    completions: mpsc::Sender<JobCompletion>,
}

impl ConversionJob {
    fn run(mut self) {
        oven_core::profile_scope!("texture_job");
        let content = self.content.take();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| self.execute(content)))
            .unwrap_or_else(|payload| Err(TextureError::Panicked(panic_message(&*payload))));
        let completion = JobCompletion {
            url: self.url,
            result,
        };
        if self.completions.send(completion).is_err() {
            log::debug!("Registry dropped before texture job finished");
        }
    }

    fn execute(&self, content: Option<ContentSupplier>) -> Result<JobOutput, TextureError> {
        self.cancel.checkpoint()?;
        let original = match content {
            Some(supplier) => supplier(),
            None => match self.url.to_file_path() {
                Some(path) => {
                    let bytes = std::fs::read(&path)
                        .map_err(|source| TextureError::Load { path, source })?;
                    Arc::new(bytes)
                }
                None => return Err(TextureError::RemoteSource(self.url.to_string())),
            },
        };

        self.cancel.checkpoint()?;
        let baked = self.converter.convert(ConversionRequest {
            source: &original,
            url: self.url.as_str(),
            usage: self.usage,
            output_name: &self.output_name,
            cancel: &self.cancel,
        })?;

        self.cancel.checkpoint()?;
        std::fs::write(&self.output_path, &baked).map_err(|source| TextureError::Write {
            path: self.output_path.clone(),
            source,
        })?;

        Ok(JobOutput {
            path: self.output_path.clone(),
            original,
        })
    }
}

/// Text of a panic payload.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct ActiveJob {
    cancel: CancellationToken,
    cancel_issued: bool,
    embedded: bool,
}

/// Tracks the texture jobs of one bake.
pub struct TextureJobRegistry {
    location: ModelLocation,
    output_dir: PathBuf,
    original_output_dir: Option<PathBuf>,
    workers: Arc<dyn WorkerSource>,
    converter: Arc<dyn TextureConverter>,

    remapped: HashMap<TextureUrl, String>,
    name_counts: HashMap<String, usize>,
    taken_names: HashSet<String>,
    archived: HashSet<PathBuf>,
    statuses: HashMap<TextureUrl, TextureJobStatus>,
    active: HashMap<TextureUrl, ActiveJob>,

    sender: mpsc::Sender<JobCompletion>,
    receiver: mpsc::Receiver<JobCompletion>,

    aborted: bool,
    errors: Vec<BakeError>,
    warnings: Vec<BakeWarning>,
    output_files: Vec<PathBuf>,
    jobs_dispatched: usize,
    cancellations_issued: usize,
}

impl TextureJobRegistry {
    /// Create a registry for a model at `location`.
    pub fn new(location: ModelLocation, context: &BakeContext) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            location,
            output_dir: context.config.output_dir.clone(),
            original_output_dir: context.config.original_output_dir.clone(),
            workers: Arc::clone(&context.workers),
            converter: Arc::clone(&context.converter),
            remapped: HashMap::new(),
            name_counts: HashMap::new(),
            taken_names: HashSet::new(),
            archived: HashSet::new(),
            statuses: HashMap::new(),
            active: HashMap::new(),
            sender,
            receiver,
            aborted: false,
            errors: Vec::new(),
            warnings: Vec::new(),
            output_files: Vec::new(),
            jobs_dispatched: 0,
            cancellations_issued: 0,
        }
    }

    /// Submit a texture reference and get the baked file name for it.
    ///
    /// Returns immediately; the conversion runs on a worker. A URL that was
    /// already submitted returns its existing name without a new job.
    /// Returns `None` when the texture will not be baked: the registry is
    /// aborted, the format is unsupported, or the texture is already baked.
    pub fn submit(
        &mut self,
        reference: &TextureReference,
        content: Option<ContentSupplier>,
    ) -> Option<String> {
        let url = &reference.url;
        if self.aborted {
            log::debug!("Ignoring texture {url}, bake is aborted");
            return None;
        }
        if let Some(name) = self.remapped.get(url) {
            return Some(name.clone());
        }

        let extension = url.extension();
        if is_baked_format(extension) {
            self.fail(BakeError::AlreadyBakedTexture {
                url: url.to_string(),
            });
            return None;
        }
        if !is_supported_format(extension) {
            let warning = BakeWarning::UnsupportedTextureFormat {
                url: url.to_string(),
            };
            if !self.warnings.contains(&warning) {
                log::warn!("{warning}");
                self.warnings.push(warning);
            }
            return None;
        }

        let name = self.assign_name(url);
        log::debug!("Re-mapping {url} -> {name}");
        self.remapped.insert(url.clone(), name.clone());
        self.statuses.insert(url.clone(), TextureJobStatus::Pending);

        let cancel = CancellationToken::new();
        let job = ConversionJob {
            url: url.clone(),
            usage: reference.usage,
            output_path: self.output_dir.join(&name),
            output_name: name.clone(),
            content,
            cancel: cancel.clone(),
            converter: Arc::clone(&self.converter),
            completions: self.sender.clone(),
        };
        self.active.insert(
            url.clone(),
            ActiveJob {
                cancel,
                cancel_issued: false,
                embedded: reference.embedded,
            },
        );
        self.statuses.insert(url.clone(), TextureJobStatus::Running);
        self.jobs_dispatched += 1;
        self.workers.dispatch(Box::new(move || job.run()));

        Some(name)
    }

    /// Pick an output name from the source base name, suffixing `-N` when the
    /// base name was already used by another URL.
    ///
    /// The counter keeps going past suffixed names that a source with that
    /// literal base name (`diffuse-1.png`) already took.
    fn assign_name(&mut self, url: &TextureUrl) -> String {
        let base = url.complete_base_name();
        let count = self.name_counts.entry(base.to_string()).or_insert(0);
        loop {
            let name = if *count == 0 {
                format!("{base}.{BAKED_TEXTURE_EXT}")
            } else {
                format!("{base}-{count}.{BAKED_TEXTURE_EXT}")
            };
            *count += 1;
            if self.taken_names.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Abort the registry: refuse new submissions and cancel active jobs.
    ///
    /// Idempotent; every active job is cancelled at most once.
    pub fn abort(&mut self) {
        if !self.aborted {
            log::debug!("Aborting texture jobs ({} active)", self.active.len());
            self.aborted = true;
        }
        for (url, job) in &mut self.active {
            if job.cancel_issued {
                continue;
            }
            job.cancel_issued = true;
            if job.cancel.cancel() {
                log::debug!("Cancelled texture job {url}");
                self.cancellations_issued += 1;
            }
        }
    }

    fn fail(&mut self, error: BakeError) {
        log::error!("{error}");
        self.errors.push(error);
        self.abort();
    }

    /// Handle every completion that has already arrived. Never blocks.
    ///
    /// Returns the number of completions handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(completion) = self.receiver.try_recv() {
            self.handle_completion(completion);
            handled += 1;
        }
        handled
    }

    /// Block until one job completes and handle it.
    ///
    /// Returns `false` without blocking when no job is active. Requires the
    /// worker source to eventually run every dispatched job.
    pub fn wait_one(&mut self) -> bool {
        if self.active.is_empty() {
            return false;
        }
        match self.receiver.recv() {
            Ok(completion) => {
                self.handle_completion(completion);
                true
            }
            Err(_) => false,
        }
    }

    fn handle_completion(&mut self, completion: JobCompletion) {
        let JobCompletion { url, result } = completion;
        let Some(job) = self.active.remove(&url) else {
            log::warn!("Completion for unknown texture job {url}");
            return;
        };

        let status = match result {
            Ok(output) => {
                self.output_files.push(output.path);
                if self.aborted {
                    log::debug!("Texture {url} finished after abort, result discarded");
                    TextureJobStatus::Aborted
                } else if !job.embedded
                    && let Err(e) = self.archive_original(&url, &output.original)
                {
                    self.fail(e);
                    TextureJobStatus::Failed
                } else {
                    log::debug!("Baked texture {url}");
                    TextureJobStatus::Succeeded
                }
            }
            Err(TextureError::Cancelled) => {
                log::debug!("Texture job {url} acknowledged cancellation");
                TextureJobStatus::Aborted
            }
            Err(source) => {
                self.fail(BakeError::TextureConversion {
                    url: url.to_string(),
                    source,
                });
                TextureJobStatus::Failed
            }
        };
        self.statuses.insert(url, status);
    }

    /// Copy the original bytes of an external texture into the archive folder.
    fn archive_original(&mut self, url: &TextureUrl, bytes: &[u8]) -> Result<(), BakeError> {
        let Some(root) = &self.original_output_dir else {
            return Ok(());
        };
        let dir = root.join(self.location.archival_fragment(url));
        let path = self.archive_path(&dir, url);
        std::fs::create_dir_all(&dir)
            .and_then(|()| std::fs::write(&path, bytes))
            .map_err(|source| BakeError::ArchivalIo {
                path: path.clone(),
                source,
            })?;
        log::debug!("Archived original {url} to {}", path.display());
        self.output_files.push(path);
        Ok(())
    }

    /// Archive destination for `url` inside `dir`.
    ///
    /// Keeps the source file name unless another original already went
    /// there, which happens for same-named textures outside the model
    /// folder. Those are renamed after their baked output name.
    fn archive_path(&mut self, dir: &std::path::Path, url: &TextureUrl) -> PathBuf {
        let path = dir.join(url.file_name());
        if self.archived.insert(path.clone()) {
            return path;
        }
        let stem = self
            .remapped
            .get(url)
            .and_then(|name| name.strip_suffix(&format!(".{BAKED_TEXTURE_EXT}")))
            .unwrap_or_else(|| url.complete_base_name())
            .to_string();
        let extension = url.extension();
        let mut counter = 0usize;
        loop {
            let file_name = match counter {
                0 => format!("{stem}.{extension}"),
                n => format!("{stem}-{n}.{extension}"),
            };
            let path = dir.join(file_name);
            if self.archived.insert(path.clone()) {
                return path;
            }
            counter += 1;
        }
    }

    /// Overall status.
    ///
    /// Not finished while any job is active; once all jobs settled, aborted
    /// if any failure or abort was recorded.
    pub fn status(&self) -> RegistryStatus {
        if !self.active.is_empty() {
            RegistryStatus::Busy
        } else if self.aborted || !self.errors.is_empty() {
            RegistryStatus::Aborted
        } else {
            RegistryStatus::Finished
        }
    }

    /// Whether an abort was requested or caused by a failure.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Number of jobs that have not reported back.
    pub fn active_jobs(&self) -> usize {
        self.active.len()
    }

    /// Status of the job for `url`, if one was created.
    pub fn job_status(&self, url: &TextureUrl) -> Option<TextureJobStatus> {
        self.statuses.get(url).copied()
    }

    /// Output name assigned to `url`.
    pub fn remapped_name(&self, url: &TextureUrl) -> Option<&str> {
        self.remapped.get(url).map(String::as_str)
    }

    /// Number of jobs handed to workers.
    pub fn jobs_dispatched(&self) -> usize {
        self.jobs_dispatched
    }

    /// Number of cancellation requests issued to jobs.
    pub fn cancellations_issued(&self) -> usize {
        self.cancellations_issued
    }

    /// Recorded errors.
    pub fn errors(&self) -> &[BakeError] {
        &self.errors
    }

    /// Recorded warnings.
    pub fn warnings(&self) -> &[BakeWarning] {
        &self.warnings
    }

    /// Files written so far: baked textures and archived originals.
    pub fn output_files(&self) -> &[PathBuf] {
        &self.output_files
    }

    /// Move out errors, warnings and output files.
    pub(crate) fn take_results(&mut self) -> (Vec<BakeError>, Vec<BakeWarning>, Vec<PathBuf>) {
        (
            std::mem::take(&mut self.errors),
            std::mem::take(&mut self.warnings),
            std::mem::take(&mut self.output_files),
        )
    }
}

impl std::fmt::Debug for TextureJobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureJobRegistry")
            .field("location", &self.location)
            .field("active", &self.active.len())
            .field("aborted", &self.aborted)
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}
