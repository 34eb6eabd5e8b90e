//! Per-model bake state machine.
//!
//! `Idle -> Compressing -> AwaitingTextures -> Finished | Aborted`. Mesh
//! compression runs synchronously on the control thread; texture jobs run on
//! workers and are observed through [`BakeCoordinator::poll`] or
//! [`BakeCoordinator::wait`]. Exactly one terminal state is reached, once.

use std::path::PathBuf;
use std::sync::mpsc::Sender;

use oven_core::mesh::{CompressedGeometry, CompressionOutcome, EncodeError, MaterialIdLookup, compress_mesh};
use oven_core::profile_scope;
use oven_core::texture::TextureUsage;

use crate::config::BakeContext;
use crate::error::{BakeError, BakeWarning};
use crate::model::BakeModel;
use crate::registry::{ContentSupplier, RegistryStatus, TextureJobRegistry, TextureReference};
use crate::tree::{BakedTree, MaterialTable, NodeTreeBuilder};

/// State of a bake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BakeState {
    /// Created, not started.
    Idle,
    /// Compressing meshes.
    Compressing,
    /// Waiting for texture jobs to settle.
    AwaitingTextures,
    /// Tree built, every texture baked.
    Finished,
    /// Stopped by an error or an abort request.
    Aborted,
}

impl BakeState {
    /// Whether this is `Finished` or `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }
}

/// Terminal event sent to an optional listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BakeNotification {
    /// The bake finished; the tree is ready.
    Finished {
        /// Model URL.
        model: String,
    },
    /// The bake was aborted.
    Aborted {
        /// Model URL.
        model: String,
        /// Number of recorded errors.
        errors: usize,
    },
}

/// Everything a bake produced.
#[derive(Debug)]
pub struct BakeResult {
    /// Node tree, only present when the bake finished.
    pub tree: Option<BakedTree>,
    /// Baked textures and archived originals written to disk.
    pub output_files: Vec<PathBuf>,
    /// Errors; empty when the bake finished.
    pub errors: Vec<BakeError>,
    /// Non-fatal problems.
    pub warnings: Vec<BakeWarning>,
}

impl BakeResult {
    /// Whether the bake finished without errors.
    pub fn is_success(&self) -> bool {
        self.tree.is_some() && self.errors.is_empty()
    }
}

enum MeshOutcome {
    Geometry(CompressedGeometry),
    Empty,
    Skipped,
}

/// Drives the bake of one model.
pub struct BakeCoordinator {
    model: BakeModel,
    context: BakeContext,
    state: BakeState,
    registry: TextureJobRegistry,
    materials: MaterialTable,
    meshes: Vec<MeshOutcome>,
    texture_bindings: Vec<(usize, TextureUsage, String)>,
    abort_requested: bool,
    notifier: Option<Sender<BakeNotification>>,
    tree: Option<BakedTree>,
    errors: Vec<BakeError>,
    warnings: Vec<BakeWarning>,
    output_files: Vec<PathBuf>,
}

impl BakeCoordinator {
    /// Create an idle coordinator.
    pub fn new(model: BakeModel, context: BakeContext) -> Self {
        let registry = TextureJobRegistry::new(model.location.clone(), &context);
        let materials = MaterialTable::for_model(&model);
        Self {
            model,
            context,
            state: BakeState::Idle,
            registry,
            materials,
            meshes: Vec::new(),
            texture_bindings: Vec::new(),
            abort_requested: false,
            notifier: None,
            tree: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            output_files: Vec::new(),
        }
    }

    /// Send the terminal notification to `sender`.
    #[must_use]
    pub fn with_notifier(mut self, sender: Sender<BakeNotification>) -> Self {
        self.notifier = Some(sender);
        self
    }

    /// Create a coordinator and start it.
    ///
    /// Returns once meshes are compressed and texture jobs are dispatched.
    pub fn bake(model: BakeModel, context: BakeContext) -> Self {
        let mut coordinator = Self::new(model, context);
        coordinator.start();
        coordinator
    }

    /// Start the bake. Does nothing unless idle.
    pub fn start(&mut self) {
        if self.state != BakeState::Idle {
            return;
        }
        log::info!("Baking {}", self.model.location);

        let output_dir = &self.context.config.output_dir;
        if let Err(source) = std::fs::create_dir_all(output_dir) {
            self.record_error(BakeError::OutputFolder {
                path: output_dir.clone(),
                source,
            });
            self.finish(BakeState::Aborted);
            return;
        }

        self.state = BakeState::Compressing;
        if !self.compress_meshes() {
            self.finish(BakeState::Aborted);
            return;
        }

        self.submit_textures();
        self.state = BakeState::AwaitingTextures;
        self.check_completion();
    }

    /// Compress every mesh. Returns `false` when the bake must abort.
    fn compress_meshes(&mut self) -> bool {
        profile_scope!("compress_meshes");
        let mut produced_geometry = false;
        let mut first_failure = None;

        for mesh in &self.model.meshes {
            let name = mesh.display_name().to_string();
            for (index, part) in mesh.parts.iter().enumerate() {
                if !part.is_well_formed() {
                    self.warnings.push(BakeWarning::MalformedPart {
                        mesh: name.clone(),
                        part: index,
                    });
                }
            }

            let material_ids = self.materials.part_material_ids(&self.model, mesh);
            let lookup = |part: usize| -> u16 { material_ids.get(part).copied().unwrap_or(0) };
            let lookup: MaterialIdLookup<'_> = &lookup;

            match compress_mesh(mesh, Some(lookup)) {
                Ok(CompressionOutcome::Compressed(geometry)) => {
                    log::debug!(
                        "Compressed {name}: {} faces, {} points, {} bytes",
                        geometry.face_count,
                        geometry.point_count,
                        geometry.data.len()
                    );
                    produced_geometry = true;
                    self.meshes.push(MeshOutcome::Geometry(geometry));
                }
                Ok(CompressionOutcome::Empty) => {
                    log::debug!("{name} has no valid triangles, no geometry emitted");
                    self.meshes.push(MeshOutcome::Empty);
                }
                Err(EncodeError::AlreadyCompressed) => {
                    let error = BakeError::AlreadyCompressed { mesh: name };
                    log::error!("{error}");
                    self.errors.push(error);
                    return false;
                }
                Err(EncodeError::Finalize(reason)) => {
                    let warning = BakeWarning::MeshSkipped {
                        mesh: name.clone(),
                        reason: reason.clone(),
                    };
                    log::warn!("{warning}");
                    self.warnings.push(warning);
                    first_failure.get_or_insert((name, reason));
                    self.meshes.push(MeshOutcome::Skipped);
                }
                Err(source) => {
                    let error = BakeError::ContractViolation { mesh: name, source };
                    log::error!("{error}");
                    self.errors.push(error);
                    return false;
                }
            }
        }

        if !produced_geometry && let Some((mesh, source)) = first_failure {
            self.record_error(BakeError::Finalize { mesh, source });
            return false;
        }
        true
    }

    /// Submit the textures of every used material.
    fn submit_textures(&mut self) {
        let location = &self.model.location;
        for (index, material) in self.materials.materials(&self.model).enumerate() {
            for texture in material.referenced_textures() {
                let embedded = self.model.embedded_texture(&texture.path).cloned();
                let mut reference = TextureReference::new(
                    location.resolve_texture(&texture.path, embedded.is_some()),
                    texture.usage,
                );
                if embedded.is_some() {
                    reference = reference.embedded();
                }
                let content = embedded.map(|bytes| Box::new(move || bytes) as ContentSupplier);
                if let Some(name) = self.registry.submit(&reference, content) {
                    self.texture_bindings.push((index, texture.usage, name));
                }
            }
        }
        log::debug!(
            "Submitted {} texture references, {} jobs",
            self.texture_bindings.len(),
            self.registry.jobs_dispatched()
        );
    }

    /// Re-evaluate completion after jobs settled.
    fn check_completion(&mut self) {
        if self.state != BakeState::AwaitingTextures {
            return;
        }
        match self.registry.status() {
            RegistryStatus::Busy => {}
            RegistryStatus::Finished if !self.abort_requested => {
                self.tree = Some(self.build_tree());
                self.finish(BakeState::Finished);
            }
            RegistryStatus::Finished | RegistryStatus::Aborted => {
                self.finish(BakeState::Aborted);
            }
        }
    }

    fn build_tree(&mut self) -> BakedTree {
        profile_scope!("build_tree");
        let mut builder = NodeTreeBuilder::new(self.context.config.unit_scale_factor);
        for material in self.materials.materials(&self.model) {
            builder.add_material(material);
        }
        let outcomes = std::mem::take(&mut self.meshes);
        for (mesh, outcome) in self.model.meshes.iter().zip(outcomes) {
            let geometry = match outcome {
                MeshOutcome::Geometry(geometry) => Some(geometry),
                MeshOutcome::Empty => None,
                MeshOutcome::Skipped => continue,
            };
            builder.add_mesh(geometry, self.materials.used_by(&self.model, mesh));
        }
        for (material, usage, name) in &self.texture_bindings {
            builder.bind_texture(*material, *usage, name);
        }
        builder.build()
    }

    fn record_error(&mut self, error: BakeError) {
        log::error!("{error}");
        self.errors.push(error);
    }

    /// Enter a terminal state and notify the listener. Only the first call has an effect.
    fn finish(&mut self, state: BakeState) {
        if self.state.is_terminal() {
            return;
        }
        let (errors, warnings, files) = self.registry.take_results();
        self.errors.extend(errors);
        self.warnings.extend(warnings);
        self.output_files.extend(files);
        self.state = state;

        let model = self.model.location.url().to_string();
        let notification = match state {
            BakeState::Finished => {
                log::info!("Finished baking {model} ({} files)", self.output_files.len());
                BakeNotification::Finished { model }
            }
            _ => {
                log::error!("Aborted baking {model} with {} errors", self.errors.len());
                BakeNotification::Aborted {
                    model,
                    errors: self.errors.len(),
                }
            }
        };
        if let Some(notifier) = self.notifier.take()
            && notifier.send(notification).is_err()
        {
            log::debug!("Bake listener is gone");
        }
    }

    /// Abort the bake. Idempotent; no effect once terminal.
    pub fn abort(&mut self) {
        if self.abort_requested || self.state.is_terminal() {
            return;
        }
        self.abort_requested = true;
        self.record_error(BakeError::Aborted);
        self.registry.abort();
        match self.state {
            BakeState::Idle => self.finish(BakeState::Aborted),
            _ => self.check_completion(),
        }
    }

    /// Handle finished texture jobs without blocking and return the state.
    pub fn poll(&mut self) -> BakeState {
        self.registry.poll();
        self.check_completion();
        self.state
    }

    /// Block until the bake reaches a terminal state.
    pub fn wait(&mut self) -> BakeState {
        loop {
            self.registry.poll();
            self.check_completion();
            if self.state != BakeState::AwaitingTextures || !self.registry.wait_one() {
                break;
            }
        }
        self.check_completion();
        self.state
    }

    /// Current state.
    pub fn state(&self) -> BakeState {
        self.state
    }

    /// The model being baked.
    pub fn model(&self) -> &BakeModel {
        &self.model
    }

    /// Texture registry of this bake.
    pub fn registry(&self) -> &TextureJobRegistry {
        &self.registry
    }

    /// Node tree, once finished.
    pub fn tree(&self) -> Option<&BakedTree> {
        self.tree.as_ref()
    }

    /// Errors recorded so far.
    pub fn errors(&self) -> &[BakeError] {
        &self.errors
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[BakeWarning] {
        &self.warnings
    }

    /// Output files, complete once terminal.
    pub fn output_files(&self) -> &[PathBuf] {
        &self.output_files
    }

    /// Consume the coordinator.
    pub fn into_result(self) -> BakeResult {
        BakeResult {
            tree: self.tree,
            output_files: self.output_files,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

impl std::fmt::Debug for BakeCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BakeCoordinator")
            .field("model", &self.model.location)
            .field("state", &self.state)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BakeConfig;
    use crate::converter::{ConversionRequest, TextureConverter};
    use crate::error::TextureError;
    use crate::location::ModelLocation;
    use oven_core::compute::InlineWorker;
    use oven_core::material::BakeMaterial;
    use oven_core::mesh::{Mesh, MeshPart};
    use std::sync::Arc;
    use std::sync::mpsc;

    struct EchoConverter;

    impl TextureConverter for EchoConverter {
        fn convert(&self, request: ConversionRequest<'_>) -> Result<Vec<u8>, TextureError> {
            Ok(request.source.to_vec())
        }
    }

    fn context(dir: &std::path::Path) -> BakeContext {
        BakeContext::new(
            BakeConfig::default().with_output_dir(dir),
            Arc::new(InlineWorker),
            Arc::new(EchoConverter),
        )
    }

    fn quad(material: &str) -> Mesh {
        Mesh::new(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ])
        .with_part(MeshPart::new(material).with_triangles(vec![0, 1, 2, 0, 2, 3]))
    }

    fn model() -> BakeModel {
        BakeModel::new(ModelLocation::new("https://host/chair.fbx"))
    }

    #[test]
    fn test_finishes_and_notifies_once() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let mut bake = BakeCoordinator::new(
            model().with_mesh(quad("m")).with_material(BakeMaterial::new("m")),
            context(dir.path()),
        )
        .with_notifier(tx);
        bake.start();
        assert_eq!(bake.state(), BakeState::Finished);
        bake.start();
        bake.abort();
        assert_eq!(bake.poll(), BakeState::Finished);
        assert!(bake.errors().is_empty());

        let notes: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            notes,
            vec![BakeNotification::Finished {
                model: "https://host/chair.fbx".into()
            }]
        );
    }

    #[test]
    fn test_abort_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut bake = BakeCoordinator::new(model().with_mesh(quad("m")), context(dir.path()));
        bake.abort();
        bake.abort();
        assert_eq!(bake.state(), BakeState::Aborted);
        assert!(matches!(bake.errors(), [BakeError::Aborted]));
        bake.start();
        assert_eq!(bake.state(), BakeState::Aborted);
        assert!(bake.tree().is_none());
    }

    #[test]
    fn test_contract_violation_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let broken = quad("m").with_normals(vec![[0.0, 0.0, 1.0]]);
        let bake = BakeCoordinator::bake(model().with_mesh(broken), context(dir.path()));
        assert_eq!(bake.state(), BakeState::Aborted);
        assert!(matches!(bake.errors(), [BakeError::ContractViolation { .. }]));
        assert_eq!(bake.registry().jobs_dispatched(), 0);
    }

    #[test]
    fn test_malformed_part_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = quad("m").with_part(MeshPart::new("m").with_triangles(vec![0, 1]));
        let result = BakeCoordinator::bake(model().with_mesh(mesh), context(dir.path())).into_result();
        assert!(result.is_success());
        assert_eq!(
            result.warnings,
            vec![BakeWarning::MalformedPart {
                mesh: "<unnamed mesh>".into(),
                part: 1
            }]
        );
    }

    #[test]
    fn test_degenerate_mesh_skipped_when_sibling_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let degenerate = Mesh::new(vec![[0.0; 3]; 3])
            .with_part(MeshPart::new("m").with_triangles(vec![0, 1, 2]))
            .with_label("flat");
        let result = BakeCoordinator::bake(
            model().with_mesh(degenerate.clone()).with_mesh(quad("m")),
            context(dir.path()),
        )
        .into_result();
        assert!(result.is_success());
        assert!(matches!(
            result.warnings.as_slice(),
            [BakeWarning::MeshSkipped { mesh, .. }] if mesh == "flat"
        ));
        let tree = result.tree.unwrap();
        assert_eq!(tree.object_count("Model"), 1);

        let alone = BakeCoordinator::bake(model().with_mesh(degenerate), context(dir.path()));
        assert_eq!(alone.state(), BakeState::Aborted);
        assert!(matches!(alone.errors(), [BakeError::Finalize { .. }]));
    }

    #[test]
    fn test_output_folder_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("taken");
        std::fs::write(&file, b"x").unwrap();
        let bake = BakeCoordinator::bake(model().with_mesh(quad("m")), context(&file.join("sub")));
        assert_eq!(bake.state(), BakeState::Aborted);
        assert!(matches!(bake.errors(), [BakeError::OutputFolder { .. }]));
    }

    #[test]
    fn test_embedded_texture_is_supplied() {
        let dir = tempfile::tempdir().unwrap();
        let mut bake = BakeCoordinator::bake(
            model()
                .with_mesh(quad("m"))
                .with_material(BakeMaterial::new("m").with_texture(TextureUsage::Albedo, "tex/a.png"))
                .with_embedded_texture("tex/a.png", vec![9, 9]),
            context(dir.path()),
        );
        assert_eq!(bake.wait(), BakeState::Finished);
        assert_eq!(std::fs::read(dir.path().join("a.ktx")).unwrap(), vec![9, 9]);
        assert_eq!(bake.tree().unwrap().object_count("Texture"), 1);
    }
}
