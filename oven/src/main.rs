//! Oven command-line baker.
//!
//! Loads each input model, bakes them concurrently on a shared worker pool
//! and writes `<model>.baked` node trees plus KTX textures to the output
//! folder.

mod args;
mod import;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, mpsc};

use clap::Parser;

use oven_bake::{
    BakeConfig, BakeContext, BakeCoordinator, BakeNotification, BakeResult, ConfigError,
    KtxTextureConverter,
};
use oven_core::compute::{WorkerSource, WorkerThreads};

use args::Args;
use import::ImportError;

/// Extension of the serialized node tree.
const TREE_EXT: &str = "baked";

// ============================================================================
// Errors
// ============================================================================

/// Errors that stop the whole run or a single model.
#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Workers(std::io::Error),
    Import { path: PathBuf, source: ImportError },
    Serialize(bincode::Error),
    WriteTree { path: PathBuf, source: std::io::Error },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config error: {e}"),
            Self::Workers(e) => write!(f, "failed to start worker threads: {e}"),
            Self::Import { path, source } => {
                write!(f, "failed to import {}: {source}", path.display())
            }
            Self::Serialize(e) => write!(f, "failed to serialize node tree: {e}"),
            Self::WriteTree { path, source } => {
                write!(f, "failed to write {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Workers(e) => Some(e),
            Self::Import { source, .. } => Some(source),
            Self::Serialize(e) => Some(e.as_ref()),
            Self::WriteTree { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ============================================================================
// Entry point
// ============================================================================

fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_filter()))
        .init();
    oven_core::set_thread_name!("Main");

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Bake every input. Returns `false` if any model failed.
fn run(args: &Args) -> Result<bool, CliError> {
    let config = args.bake_config()?;
    let context = build_context(&config)?;

    let (sender, receiver) = mpsc::channel();
    let mut all_ok = true;
    let mut bakes = Vec::new();

    for input in &args.inputs {
        match import::load_model(input) {
            Ok(model) => {
                let mut bake =
                    BakeCoordinator::new(model, context.clone()).with_notifier(sender.clone());
                bake.start();
                bakes.push(bake);
            }
            Err(source) => {
                log::error!(
                    "{}",
                    CliError::Import {
                        path: input.clone(),
                        source
                    }
                );
                all_ok = false;
            }
        }
    }
    drop(sender);

    for mut bake in bakes {
        bake.wait();
        let stem = bake.model().location.file_stem().to_string();
        let result = bake.into_result();
        match write_outputs(&config.output_dir, &stem, &result) {
            Ok(true) => {}
            Ok(false) => all_ok = false,
            Err(e) => {
                log::error!("{e}");
                all_ok = false;
            }
        }
    }

    for notification in receiver.try_iter() {
        match notification {
            BakeNotification::Finished { model } => log::debug!("Finished: {model}"),
            BakeNotification::Aborted { model, errors } => {
                log::debug!("Aborted: {model} ({errors} errors)")
            }
        }
    }

    Ok(all_ok)
}

fn build_context(config: &BakeConfig) -> Result<BakeContext, CliError> {
    let workers = if config.worker_threads == 0 {
        WorkerThreads::with_available_parallelism()
    } else {
        WorkerThreads::new(config.worker_threads)
    }
    .map_err(CliError::Workers)?;
    log::info!("Baking with {} worker threads", workers.len());

    let workers: Arc<dyn WorkerSource> = Arc::new(workers);
    Ok(BakeContext::new(
        config.clone(),
        workers,
        Arc::new(KtxTextureConverter::new(config.texture_mip_levels)),
    ))
}

/// Report a finished bake and write its node tree.
///
/// Returns `false` when the bake was aborted.
fn write_outputs(output_dir: &Path, stem: &str, result: &BakeResult) -> Result<bool, CliError> {
    for warning in &result.warnings {
        log::warn!("{stem}: {warning}");
    }
    for file in &result.output_files {
        println!("{}", file.display());
    }

    let Some(tree) = &result.tree else {
        for error in &result.errors {
            log::error!("{stem}: {error}");
        }
        return Ok(false);
    };

    let bytes = bincode::serialize(&tree.root).map_err(CliError::Serialize)?;
    let path = output_dir.join(format!("{stem}.{TREE_EXT}"));
    std::fs::write(&path, bytes).map_err(|source| CliError::WriteTree {
        path: path.clone(),
        source,
    })?;
    println!("{}", path.display());
    log::info!(
        "{stem}: {} objects, {} connections",
        tree.objects().map_or(0, |o| o.children.len()),
        tree.connections.len()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oven_bake::BakeModel;
    use oven_bake::ModelLocation;
    use oven_core::compute::InlineWorker;
    use oven_core::mesh::generators::generate_quad;
    use oven_core::scene::SceneNode;

    #[test]
    fn test_write_outputs_serializes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let context = BakeContext::new(
            BakeConfig::default().with_output_dir(dir.path()),
            Arc::new(InlineWorker),
            Arc::new(KtxTextureConverter::default()),
        );
        let model = BakeModel::new(ModelLocation::from_path(&dir.path().join("quad.gltf")))
            .with_mesh(generate_quad(1.0, 1.0, "default"));
        let mut bake = BakeCoordinator::bake(model, context);
        bake.wait();
        let result = bake.into_result();

        assert!(write_outputs(dir.path(), "quad", &result).unwrap());
        let bytes = std::fs::read(dir.path().join("quad.baked")).unwrap();
        let root: SceneNode = bincode::deserialize(&bytes).unwrap();
        assert_eq!(root, result.tree.unwrap().root);
    }

    #[test]
    fn test_aborted_bake_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let result = BakeResult {
            tree: None,
            output_files: Vec::new(),
            errors: vec![oven_bake::BakeError::Aborted],
            warnings: Vec::new(),
        };
        assert!(!write_outputs(dir.path(), "broken", &result).unwrap());
        assert!(!dir.path().join("broken.baked").exists());
    }
}
