//! End-to-end bake tests driving the coordinator with scripted collaborators.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;

use rstest::rstest;

use common::{DeferredWorker, Script, ScriptedConverter, context, png_bytes, quad_mesh, write_file};
use oven_bake::{
    BakeConfig, BakeContext, BakeCoordinator, BakeError, BakeModel, BakeNotification, BakeState,
    KtxTextureConverter, ModelLocation, TextureError, TextureJobStatus, TextureUrl,
};
use oven_core::compute::{InlineWorker, WorkerSource, WorkerThreads};
use oven_core::material::BakeMaterial;
use oven_core::mesh::{ChannelKind, Mesh, MeshPart, decode_geometry};
use oven_core::texture::TextureUsage;

fn local_model(dir: &Path) -> BakeModel {
    BakeModel::new(ModelLocation::from_path(&dir.join("chair.fbx")))
}

fn texture_url(dir: &Path, relative: &str) -> TextureUrl {
    ModelLocation::from_path(&dir.join("chair.fbx")).resolve_texture(relative, false)
}

/// Two parts of two triangles each, using `first` and `second`.
fn two_part_mesh(first: &str, second: &str) -> Mesh {
    Mesh::new(vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [2.0, 0.0, 0.0],
        [2.0, 1.0, 0.0],
    ])
    .with_part(MeshPart::new(first).with_triangles(vec![0, 1, 2, 0, 2, 3]))
    .with_part(MeshPart::new(second).with_triangles(vec![1, 4, 5, 1, 5, 2]))
}

// ============================================================================
// End-to-end scenarios
// ============================================================================

#[test]
fn test_single_part_mesh_without_textures() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let converter = Arc::new(ScriptedConverter::new());
    let model = local_model(src.path())
        .with_mesh(quad_mesh("wood"))
        .with_material(BakeMaterial::new("wood"));

    let mut bake = BakeCoordinator::bake(
        model,
        context(out.path(), Arc::new(InlineWorker), converter.clone()),
    );
    assert_eq!(bake.wait(), BakeState::Finished);
    let result = bake.into_result();

    assert!(result.errors.is_empty());
    assert!(result.output_files.is_empty());
    assert!(converter.calls().is_empty());

    let tree = result.tree.unwrap();
    assert_eq!(tree.object_count("Geometry"), 1);
    assert_eq!(tree.object_count("Model"), 1);
    assert_eq!(tree.object_count("Material"), 1);
    assert_eq!(tree.object_count("Texture"), 0);

    let blob = tree
        .objects()
        .and_then(|o| o.child("Geometry"))
        .and_then(|g| g.child("CompressedMesh"))
        .and_then(|c| c.properties[0].as_bytes())
        .unwrap();
    let decoded = decode_geometry(blob).unwrap();
    assert_eq!(decoded.faces.len(), 2);
    assert_eq!(decoded.point_count, 4);
    assert!(decoded.channel(ChannelKind::MaterialId).is_none());
}

#[test]
fn test_two_parts_sharing_one_texture() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_file(&src.path().join("textures/shared.png"), b"shared pixels");

    let converter = Arc::new(ScriptedConverter::new());
    let model = local_model(src.path())
        .with_mesh(two_part_mesh("a", "b"))
        .with_material(BakeMaterial::new("a").with_texture(TextureUsage::Albedo, "textures/shared.png"))
        .with_material(BakeMaterial::new("b").with_texture(TextureUsage::Albedo, "textures/shared.png"));

    let mut bake = BakeCoordinator::bake(
        model,
        context(out.path(), Arc::new(InlineWorker), converter.clone()),
    );
    assert_eq!(bake.wait(), BakeState::Finished);
    assert_eq!(bake.registry().jobs_dispatched(), 1);
    assert_eq!(converter.calls().len(), 1);

    let result = bake.into_result();
    assert_eq!(result.output_files, vec![out.path().join("shared.ktx")]);
    let tree = result.tree.unwrap();
    assert_eq!(tree.object_count("Material"), 2);
    assert_eq!(tree.object_count("Texture"), 1);

    let objects = tree.objects().unwrap();
    let texture = objects.child("Texture").unwrap();
    assert_eq!(
        texture.child("RelativeFilename").unwrap().properties[0].as_str(),
        Some("shared.ktx")
    );
    let texture_id = texture.id.unwrap();
    let material_ids: Vec<_> = objects.children_named("Material").filter_map(|m| m.id).collect();
    for material_id in material_ids {
        assert!(
            tree.connections
                .iter()
                .any(|c| c.child == texture_id && c.parent == material_id && c.property == Some("DiffuseColor"))
        );
    }

    // Per-face material ids follow the emitted material order.
    let blob = objects
        .child("Geometry")
        .and_then(|g| g.child("CompressedMesh"))
        .and_then(|c| c.properties[0].as_bytes())
        .unwrap();
    let decoded = decode_geometry(blob).unwrap();
    let ids = decoded.channel(ChannelKind::MaterialId).unwrap();
    assert_eq!(ids.values.as_u16(), Some(&[0u16, 0, 1, 1][..]));
}

#[test]
fn test_empty_geometry_is_not_an_error() {
    let out = tempfile::tempdir().unwrap();
    let mesh = Mesh::new(vec![[0.0; 3]; 3]).with_part(MeshPart::new("m").with_triangles(vec![0, 1]));
    let model = BakeModel::new(ModelLocation::new("https://host/empty.fbx"))
        .with_mesh(mesh)
        .with_material(BakeMaterial::new("m"));

    let mut bake = BakeCoordinator::bake(
        model,
        context(out.path(), Arc::new(InlineWorker), Arc::new(ScriptedConverter::new())),
    );
    assert_eq!(bake.wait(), BakeState::Finished);
    let result = bake.into_result();
    assert!(result.errors.is_empty());
    assert_eq!(result.warnings.len(), 1);
    let tree = result.tree.unwrap();
    assert_eq!(tree.object_count("Geometry"), 0);
    assert_eq!(tree.object_count("Model"), 1);
}

// ============================================================================
// Mesh failures
// ============================================================================

#[test]
fn test_already_compressed_mesh_submits_no_textures() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_file(&src.path().join("wood.png"), b"px");
    let converter = Arc::new(ScriptedConverter::new());
    let worker = DeferredWorker::new();
    let model = local_model(src.path())
        .with_mesh(quad_mesh("wood").with_compressed(true).with_label("chair"))
        .with_material(BakeMaterial::new("wood").with_texture(TextureUsage::Albedo, "wood.png"));

    let bake = BakeCoordinator::bake(model, context(out.path(), worker.clone(), converter.clone()));
    assert_eq!(bake.state(), BakeState::Aborted);
    assert!(matches!(bake.errors(), [BakeError::AlreadyCompressed { mesh }] if mesh == "chair"));
    assert_eq!(bake.registry().jobs_dispatched(), 0);
    assert_eq!(worker.pending(), 0);
    assert!(converter.calls().is_empty());
    assert!(bake.tree().is_none());
}

// ============================================================================
// Texture deduplication
// ============================================================================

#[test]
fn test_colliding_base_names_get_distinct_outputs() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_file(&src.path().join("a/diffuse.png"), b"first");
    write_file(&src.path().join("b/diffuse.png"), b"second");

    let model = local_model(src.path())
        .with_mesh(two_part_mesh("a", "b"))
        .with_material(BakeMaterial::new("a").with_texture(TextureUsage::Albedo, "a/diffuse.png"))
        .with_material(BakeMaterial::new("b").with_texture(TextureUsage::Albedo, "b/diffuse.png"));

    let mut bake = BakeCoordinator::bake(
        model,
        context(out.path(), Arc::new(InlineWorker), Arc::new(ScriptedConverter::new())),
    );
    assert_eq!(bake.wait(), BakeState::Finished);

    let first = texture_url(src.path(), "a/diffuse.png");
    let second = texture_url(src.path(), "b/diffuse.png");
    assert_eq!(bake.registry().remapped_name(&first), Some("diffuse.ktx"));
    assert_eq!(bake.registry().remapped_name(&second), Some("diffuse-1.ktx"));
    assert_eq!(std::fs::read(out.path().join("diffuse.ktx")).unwrap(), b"first");
    assert_eq!(std::fs::read(out.path().join("diffuse-1.ktx")).unwrap(), b"second");
    assert_eq!(bake.tree().unwrap().object_count("Texture"), 2);
}

#[test]
fn test_bakes_do_not_share_dedup_state() {
    let src = tempfile::tempdir().unwrap();
    write_file(&src.path().join("one/wood.png"), b"1");
    write_file(&src.path().join("two/wood.png"), b"2");
    let out_one = tempfile::tempdir().unwrap();
    let out_two = tempfile::tempdir().unwrap();

    let model = |folder: &str| {
        BakeModel::new(ModelLocation::from_path(&src.path().join(folder).join("m.fbx")))
            .with_mesh(quad_mesh("w"))
            .with_material(BakeMaterial::new("w").with_texture(TextureUsage::Albedo, "wood.png"))
    };
    let worker = DeferredWorker::new();
    let converter = Arc::new(ScriptedConverter::new());
    let mut one = BakeCoordinator::bake(model("one"), context(out_one.path(), worker.clone(), converter.clone()));
    let mut two = BakeCoordinator::bake(model("two"), context(out_two.path(), worker.clone(), converter.clone()));
    assert_eq!(worker.run_all(), 2);

    assert_eq!(one.poll(), BakeState::Finished);
    assert_eq!(two.poll(), BakeState::Finished);
    assert_eq!(std::fs::read(out_one.path().join("wood.ktx")).unwrap(), b"1");
    assert_eq!(std::fs::read(out_two.path().join("wood.ktx")).unwrap(), b"2");
}

// ============================================================================
// Failure propagation
// ============================================================================

fn three_texture_model(dir: &Path) -> BakeModel {
    for name in ["t0", "t1", "t2"] {
        write_file(&dir.join(format!("{name}.png")), name.as_bytes());
    }
    let mesh = two_part_mesh("m0", "m1")
        .with_part(MeshPart::new("m2").with_triangles(vec![0, 1, 2]));
    local_model(dir)
        .with_mesh(mesh)
        .with_material(BakeMaterial::new("m0").with_texture(TextureUsage::Albedo, "t0.png"))
        .with_material(BakeMaterial::new("m1").with_texture(TextureUsage::Normal, "t1.png"))
        .with_material(BakeMaterial::new("m2").with_texture(TextureUsage::Occlusion, "t2.png"))
}

#[rstest]
#[case::first(0)]
#[case::middle(1)]
#[case::last(2)]
fn test_one_failure_cancels_the_others_once(#[case] failing: usize) {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let failing_name = format!("/t{failing}.png");
    let converter = Arc::new(ScriptedConverter::new().with(&failing_name, Script::Fail));
    let worker = DeferredWorker::new();
    let (tx, rx) = mpsc::channel();

    let mut bake = BakeCoordinator::new(
        three_texture_model(src.path()),
        context(out.path(), worker.clone(), converter.clone()),
    )
    .with_notifier(tx);
    bake.start();
    assert_eq!(bake.state(), BakeState::AwaitingTextures);
    assert_eq!(worker.pending(), 3);

    assert!(worker.run_at(failing));
    assert_eq!(bake.poll(), BakeState::AwaitingTextures);
    assert_eq!(bake.registry().cancellations_issued(), 2);

    worker.run_all();
    assert_eq!(bake.poll(), BakeState::Aborted);
    assert_eq!(bake.registry().cancellations_issued(), 2);
    // Cancelled jobs stop before converting.
    assert_eq!(converter.calls().len(), 1);

    for index in 0..3 {
        let url = texture_url(src.path(), &format!("t{index}.png"));
        let expected = if index == failing {
            TextureJobStatus::Failed
        } else {
            TextureJobStatus::Aborted
        };
        assert_eq!(bake.registry().job_status(&url), Some(expected));
    }

    let result = bake.into_result();
    assert!(result.tree.is_none());
    assert!(matches!(
        result.errors.as_slice(),
        [BakeError::TextureConversion {
            source: TextureError::Decode(_),
            ..
        }]
    ));
    assert!(result.output_files.is_empty());
    assert_eq!(rx.try_iter().count(), 1);
}

#[test]
fn test_outputs_finished_before_failure_are_still_listed() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let converter = Arc::new(ScriptedConverter::new().with("/t0.png", Script::Fail));
    let worker = DeferredWorker::new();

    let mut bake = BakeCoordinator::bake(
        three_texture_model(src.path()),
        context(out.path(), worker.clone(), converter),
    );
    // Every job runs to completion before the control thread sees the failure.
    assert_eq!(worker.run_all(), 3);
    assert_eq!(bake.poll(), BakeState::Aborted);

    let result = bake.into_result();
    assert_eq!(result.errors.len(), 1);
    let mut files = result.output_files.clone();
    files.sort();
    assert_eq!(files, vec![out.path().join("t1.ktx"), out.path().join("t2.ktx")]);
}

#[test]
fn test_already_baked_texture_aborts_bake() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let worker = DeferredWorker::new();
    let model = local_model(src.path())
        .with_mesh(two_part_mesh("a", "b"))
        .with_material(BakeMaterial::new("a").with_texture(TextureUsage::Albedo, "wood.png"))
        .with_material(BakeMaterial::new("b").with_texture(TextureUsage::Albedo, "baked/stone.ktx"));

    let mut bake = BakeCoordinator::bake(model, context(out.path(), worker.clone(), Arc::new(ScriptedConverter::new())));
    // The first texture was already dispatched and gets cancelled.
    assert_eq!(bake.registry().jobs_dispatched(), 1);
    assert_eq!(bake.registry().cancellations_issued(), 1);
    worker.run_all();
    assert_eq!(bake.wait(), BakeState::Aborted);
    assert!(matches!(bake.errors(), [BakeError::AlreadyBakedTexture { .. }]));
}

// ============================================================================
// Abort
// ============================================================================

fn aborted_snapshot(abort_calls: usize) -> (BakeState, usize, usize, Option<TextureJobStatus>, usize) {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_file(&src.path().join("wood.png"), b"px");
    let worker = DeferredWorker::new();
    let (tx, rx) = mpsc::channel();
    let model = local_model(src.path())
        .with_mesh(quad_mesh("w"))
        .with_material(BakeMaterial::new("w").with_texture(TextureUsage::Albedo, "wood.png"));

    let mut bake = BakeCoordinator::new(model, context(out.path(), worker.clone(), Arc::new(ScriptedConverter::new())))
        .with_notifier(tx);
    bake.start();
    for _ in 0..abort_calls {
        bake.abort();
    }
    worker.run_all();
    let state = bake.wait();
    (
        state,
        bake.errors().len(),
        bake.registry().cancellations_issued(),
        bake.registry().job_status(&texture_url(src.path(), "wood.png")),
        rx.try_iter().count(),
    )
}

#[test]
fn test_abort_twice_equals_abort_once() {
    let once = aborted_snapshot(1);
    let twice = aborted_snapshot(2);
    assert_eq!(once, twice);
    assert_eq!(once, (BakeState::Aborted, 1, 1, Some(TextureJobStatus::Aborted), 1));
}

#[test]
fn test_abort_with_worker_threads() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_file(&src.path().join("slow.png"), b"px");
    let converter = Arc::new(ScriptedConverter::new().with("/slow.png", Script::BlockUntilCancelled));
    let workers = Arc::new(WorkerThreads::new(2).unwrap());
    let (tx, rx) = mpsc::channel();
    let model = local_model(src.path())
        .with_mesh(quad_mesh("w"))
        .with_material(BakeMaterial::new("w").with_texture(TextureUsage::Albedo, "slow.png"));

    let mut bake = BakeCoordinator::new(model, context(out.path(), workers, converter)).with_notifier(tx);
    bake.start();
    assert_eq!(bake.poll(), BakeState::AwaitingTextures);
    bake.abort();
    assert_eq!(bake.wait(), BakeState::Aborted);
    assert!(matches!(bake.errors(), [BakeError::Aborted]));
    assert!(matches!(
        rx.try_iter().collect::<Vec<_>>().as_slice(),
        [BakeNotification::Aborted { errors: 1, .. }]
    ));
}

#[test]
fn test_panicking_converter_aborts_on_worker_threads() {
    let out = tempfile::tempdir().unwrap();
    let converter = Arc::new(
        ScriptedConverter::new()
            .with("/a.png", Script::Panic)
            .with("/b.png", Script::Succeed),
    );
    let workers = Arc::new(WorkerThreads::new(2).unwrap());
    let model = BakeModel::new(ModelLocation::new("https://host/m/chair.fbx"))
        .with_mesh(two_part_mesh("a", "b"))
        .with_material(BakeMaterial::new("a").with_texture(TextureUsage::Albedo, "a.png"))
        .with_material(BakeMaterial::new("b").with_texture(TextureUsage::Albedo, "b.png"))
        .with_embedded_texture("a.png", b"a".to_vec())
        .with_embedded_texture("b.png", b"b".to_vec());

    let mut bake = BakeCoordinator::bake(model, context(out.path(), workers.clone(), converter));
    assert_eq!(bake.wait(), BakeState::Aborted);
    assert!(bake.errors().iter().any(|e| matches!(
        e,
        BakeError::TextureConversion {
            source: TextureError::Panicked(msg),
            ..
        } if msg.contains("decoder blew up")
    )));
    assert_eq!(bake.registry().active_jobs(), 0);

    // Both worker threads still take work.
    let (tx, rx) = mpsc::channel();
    for _ in 0..2 {
        let tx = tx.clone();
        workers.dispatch(Box::new(move || {
            let _ = tx.send(());
        }));
    }
    drop(tx);
    assert_eq!(rx.iter().count(), 2);
}

// ============================================================================
// Real conversion and archival
// ============================================================================

#[test]
fn test_ktx_conversion_on_worker_threads() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_file(&src.path().join("textures/wood.png"), &png_bytes(16, 8));
    let model = local_model(src.path())
        .with_mesh(quad_mesh("w"))
        .with_material(BakeMaterial::new("w").with_texture(TextureUsage::Albedo, "textures/wood.png"));
    let context = BakeContext::new(
        BakeConfig::default().with_output_dir(out.path()),
        Arc::new(WorkerThreads::new(2).unwrap()),
        Arc::new(KtxTextureConverter::new(true)),
    );

    let mut bake = BakeCoordinator::bake(model, context);
    assert_eq!(bake.wait(), BakeState::Finished);
    let baked = std::fs::read(out.path().join("wood.ktx")).unwrap();
    assert_eq!(&baked[1..4], b"KTX");
}

#[test]
fn test_external_originals_are_archived() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let originals = tempfile::tempdir().unwrap();
    write_file(&src.path().join("textures/wood.png"), b"wood");
    let model = local_model(src.path())
        .with_mesh(two_part_mesh("a", "b"))
        .with_material(BakeMaterial::new("a").with_texture(TextureUsage::Albedo, "textures/wood.png"))
        .with_material(BakeMaterial::new("b").with_texture(TextureUsage::Emissive, "inside.png"))
        .with_embedded_texture("inside.png", b"inside".to_vec());
    let context = BakeContext::new(
        BakeConfig::default()
            .with_output_dir(out.path())
            .with_original_output_dir(originals.path()),
        Arc::new(InlineWorker),
        Arc::new(ScriptedConverter::new()),
    );

    let mut bake = BakeCoordinator::bake(model, context);
    assert_eq!(bake.wait(), BakeState::Finished);
    let archived = originals.path().join("textures/wood.png");
    assert_eq!(std::fs::read(&archived).unwrap(), b"wood");
    assert!(!originals.path().join("inside.png").exists());
    assert!(bake.output_files().contains(&archived));
    assert_eq!(bake.output_files().len(), 3);
}

#[test]
fn test_archival_failure_aborts() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_file(&src.path().join("wood.png"), b"wood");
    let blocker = out.path().join("not-a-dir");
    write_file(&blocker, b"file");
    let model = local_model(src.path())
        .with_mesh(quad_mesh("w"))
        .with_material(BakeMaterial::new("w").with_texture(TextureUsage::Albedo, "wood.png"));
    let context = BakeContext::new(
        BakeConfig::default()
            .with_output_dir(out.path())
            .with_original_output_dir(blocker.join("originals")),
        Arc::new(InlineWorker),
        Arc::new(ScriptedConverter::new()),
    );

    let mut bake = BakeCoordinator::bake(model, context);
    assert_eq!(bake.wait(), BakeState::Aborted);
    assert!(matches!(bake.errors(), [BakeError::ArchivalIo { .. }]));
    assert_eq!(
        bake.registry().job_status(&texture_url(src.path(), "wood.png")),
        Some(TextureJobStatus::Failed)
    );
    // The baked texture itself was written and is still reported.
    assert_eq!(bake.output_files(), &[out.path().join("wood.ktx")]);
}

#[test]
fn test_same_named_originals_outside_model_folder_are_kept_apart() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let originals = tempfile::tempdir().unwrap();
    let x = src.path().join("x/wood.png");
    let y = src.path().join("y/wood.png");
    write_file(&x, b"x");
    write_file(&y, b"y");
    let model = BakeModel::new(ModelLocation::from_path(&src.path().join("model/chair.fbx")))
        .with_mesh(two_part_mesh("a", "b"))
        .with_material(BakeMaterial::new("a").with_texture(TextureUsage::Albedo, x.to_string_lossy()))
        .with_material(BakeMaterial::new("b").with_texture(TextureUsage::Albedo, y.to_string_lossy()));
    let context = BakeContext::new(
        BakeConfig::default()
            .with_output_dir(out.path())
            .with_original_output_dir(originals.path()),
        Arc::new(InlineWorker),
        Arc::new(ScriptedConverter::new()),
    );

    let mut bake = BakeCoordinator::bake(model, context);
    assert_eq!(bake.wait(), BakeState::Finished);
    assert_eq!(std::fs::read(originals.path().join("wood.png")).unwrap(), b"x");
    assert_eq!(std::fs::read(originals.path().join("wood-1.png")).unwrap(), b"y");

    let mut files = bake.output_files().to_vec();
    files.sort();
    files.dedup();
    assert_eq!(files.len(), 4);
}
