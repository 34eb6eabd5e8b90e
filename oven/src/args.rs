//! Command line arguments.

use std::path::{Path, PathBuf};

use clap::Parser;

use oven_bake::{BakeConfig, ConfigError};

/// Config file picked up from the working directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "oven.toml";

/// Oven asset baker arguments.
#[derive(Parser, Debug)]
#[command(
    name = "oven",
    about = "Bake 3D models into compressed, distributable assets",
    long_about = "Compresses every mesh of a glTF/GLB model, re-bakes its textures to KTX \
        on worker threads and writes the baked node tree next to them.\n\n\
        EXAMPLES:\n  \
          oven -i chair.glb -o baked\n  \
          oven -i a.gltf -i b.glb -o baked --originals originals --threads 4",
    version
)]
pub struct Args {
    /// Model to bake (repeatable).
    #[arg(short = 'i', long = "input", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output folder; overrides the config file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Folder for copies of original external textures.
    #[arg(long)]
    pub originals: Option<PathBuf>,

    /// Bake config file (defaults to ./oven.toml when present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Worker thread count; 0 uses every CPU.
    #[arg(long)]
    pub threads: Option<usize>,

    /// Log debug output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Load the config file and apply command line overrides.
    pub fn bake_config(&self) -> Result<BakeConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => BakeConfig::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                BakeConfig::load_or_default(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => BakeConfig::default(),
        };
        Ok(self.apply_overrides(base))
    }

    fn apply_overrides(&self, mut config: BakeConfig) -> BakeConfig {
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(originals) = &self.originals {
            config.original_output_dir = Some(originals.clone());
        }
        if let Some(threads) = self.threads {
            config.worker_threads = threads;
        }
        config
    }

    /// Default log filter.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_input() {
        assert!(Args::try_parse_from(["oven"]).is_err());
    }

    #[test]
    fn test_repeatable_inputs() {
        let args = Args::try_parse_from(["oven", "-i", "a.glb", "--input", "b.gltf"]).unwrap();
        assert_eq!(args.inputs, vec![PathBuf::from("a.glb"), PathBuf::from("b.gltf")]);
        assert_eq!(args.log_filter(), "info");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bake.toml");
        std::fs::write(&config_path, "output_dir = \"from_file\"\nworker_threads = 8\n").unwrap();

        let args = Args::try_parse_from([
            "oven",
            "-i",
            "a.glb",
            "--config",
            config_path.to_str().unwrap(),
            "--threads",
            "2",
            "--originals",
            "orig",
            "-v",
        ])
        .unwrap();
        let config = args.bake_config().unwrap();
        assert_eq!(config.output_dir, PathBuf::from("from_file"));
        assert_eq!(config.worker_threads, 2);
        assert_eq!(config.original_output_dir, Some(PathBuf::from("orig")));
        assert_eq!(args.log_filter(), "debug");
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let args =
            Args::try_parse_from(["oven", "-i", "a.glb", "--config", "/no/such/oven.toml"]).unwrap();
        assert!(matches!(args.bake_config(), Err(ConfigError::Read { .. })));
    }
}
