//! glTF / GLB import into a [`BakeModel`].
//!
//! Every glTF mesh becomes one [`Mesh`] whose parts are its triangle
//! primitives. Images stored in buffers or data URIs are registered as
//! embedded textures; external image URIs stay plain texture paths and are
//! resolved against the model location at bake time.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use oven_bake::{BakeModel, ModelLocation};
use oven_core::material::{BakeMaterial, PLACEHOLDER_MATERIAL_NAME};
use oven_core::mesh::{Mesh, MeshPart};
use oven_core::texture::TextureUsage;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while importing a model file.
#[derive(Debug)]
pub enum ImportError {
    /// glTF parsing failed.
    Gltf(gltf_dep::Error),
    /// An external buffer could not be read.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Buffer data is missing or malformed.
    Buffer(String),
    /// A triangle primitive has no POSITION attribute.
    MissingPositions { mesh: String, primitive: usize },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gltf(e) => write!(f, "glTF parse error: {e}"),
            Self::Io { path, source } => {
                write!(f, "failed to read buffer {}: {source}", path.display())
            }
            Self::Buffer(msg) => write!(f, "buffer error: {msg}"),
            Self::MissingPositions { mesh, primitive } => {
                write!(f, "primitive {primitive} of mesh '{mesh}' has no positions")
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Gltf(e) => Some(e),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<gltf_dep::Error> for ImportError {
    fn from(e: gltf_dep::Error) -> Self {
        Self::Gltf(e)
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Load a `.gltf` or `.glb` file.
pub fn load_model(path: &Path) -> Result<BakeModel, ImportError> {
    let gltf_dep::Gltf { document, blob } = gltf_dep::Gltf::open(path)?;
    let model_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let buffers = resolve_buffers(&document, blob, model_dir)?;

    let mut model = BakeModel::new(ModelLocation::from_path(path));

    let (image_paths, embedded) = load_images(&document, &buffers)?;
    for (name, bytes) in embedded {
        model = model.with_embedded_texture(name, bytes);
    }

    let material_names = material_names(&document);
    for material in document.materials() {
        let Some(index) = material.index() else {
            continue;
        };
        model = model.with_material(convert_material(&material, &material_names[index], &image_paths));
    }

    let skinned = skinned_meshes(&document);
    let mut needs_placeholder = false;
    for mesh in document.meshes() {
        let converted = convert_mesh(&mesh, &buffers, &material_names, skinned.contains(&mesh.index()))?;
        needs_placeholder |= converted
            .parts
            .iter()
            .any(|part| part.material_id == PLACEHOLDER_MATERIAL_NAME);
        model = model.with_mesh(converted);
    }
    if needs_placeholder {
        model = model.with_material(BakeMaterial::placeholder());
    }

    log::info!(
        "Imported {}: {} meshes, {} materials, {} embedded textures",
        path.display(),
        model.meshes.len(),
        model.materials.len(),
        model.embedded_textures.len()
    );
    Ok(model)
}

// ============================================================================
// Buffers and images
// ============================================================================

fn resolve_buffers(
    document: &gltf_dep::Document,
    blob: Option<Vec<u8>>,
    model_dir: &Path,
) -> Result<Vec<Vec<u8>>, ImportError> {
    let mut blob = blob;
    let mut buffers = Vec::new();

    for buffer in document.buffers() {
        let data = match buffer.source() {
            gltf_dep::buffer::Source::Bin => blob.take().ok_or_else(|| {
                ImportError::Buffer("binary buffer referenced but no blob present".into())
            })?,
            gltf_dep::buffer::Source::Uri(uri) if uri.starts_with("data:") => parse_data_uri(uri)
                .ok_or_else(|| ImportError::Buffer(format!("malformed data URI in buffer {}", buffer.index())))?,
            gltf_dep::buffer::Source::Uri(uri) => {
                let path = model_dir.join(uri);
                std::fs::read(&path).map_err(|source| ImportError::Io { path, source })?
            }
        };
        if data.len() < buffer.length() {
            return Err(ImportError::Buffer(format!(
                "buffer {} holds {} bytes, expected {}",
                buffer.index(),
                data.len(),
                buffer.length()
            )));
        }
        buffers.push(data);
    }

    Ok(buffers)
}

/// Texture path per image index, plus the embedded images to register.
type ImageTable = (Vec<String>, Vec<(String, Vec<u8>)>);

fn load_images(document: &gltf_dep::Document, buffers: &[Vec<u8>]) -> Result<ImageTable, ImportError> {
    let mut paths = Vec::new();
    let mut embedded = Vec::new();

    for image in document.images() {
        match image.source() {
            gltf_dep::image::Source::View { view, mime_type } => {
                let data = buffers.get(view.buffer().index()).ok_or_else(|| {
                    ImportError::Buffer(format!("image {} buffer out of range", image.index()))
                })?;
                let start = view.offset();
                let end = start + view.length();
                let bytes = data.get(start..end).ok_or_else(|| {
                    ImportError::Buffer(format!("image {} view out of range", image.index()))
                })?;
                let name = embedded_image_name(image.name(), image.index(), mime_type);
                embedded.push((name.clone(), bytes.to_vec()));
                paths.push(name);
            }
            gltf_dep::image::Source::Uri { uri, mime_type } => {
                if uri.starts_with("data:") {
                    let bytes = parse_data_uri(uri).ok_or_else(|| {
                        ImportError::Buffer(format!("malformed data URI in image {}", image.index()))
                    })?;
                    let mime = mime_type.or_else(|| data_uri_mime(uri)).unwrap_or("image/png");
                    let name = embedded_image_name(image.name(), image.index(), mime);
                    embedded.push((name.clone(), bytes));
                    paths.push(name);
                } else {
                    paths.push(uri.to_string());
                }
            }
        }
    }

    Ok((paths, embedded))
}

fn embedded_image_name(name: Option<&str>, index: usize, mime_type: &str) -> String {
    let base = name
        .filter(|n| !n.is_empty())
        .map(String::from)
        .unwrap_or_else(|| format!("image{index}"));
    if Path::new(&base).extension().is_some() {
        return base;
    }
    format!("{base}.{}", mime_extension(mime_type))
}

fn mime_extension(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/tiff" => "tiff",
        _ => "png",
    }
}

fn data_uri_mime(uri: &str) -> Option<&str> {
    let rest = uri.strip_prefix("data:")?;
    let end = rest.find(';')?;
    Some(&rest[..end])
}

/// Decode the payload of a base64 `data:` URI.
fn parse_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (_, encoded) = rest.split_once(";base64,")?;
    base64_decode(encoded)
}

fn base64_decode(input: &str) -> Option<Vec<u8>> {
    fn sextet(c: u8) -> Option<u32> {
        match c {
            b'A'..=b'Z' => Some(u32::from(c - b'A')),
            b'a'..=b'z' => Some(u32::from(c - b'a') + 26),
            b'0'..=b'9' => Some(u32::from(c - b'0') + 52),
            b'+' | b'-' => Some(62),
            b'/' | b'_' => Some(63),
            _ => None,
        }
    }

    let symbols: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .take_while(|&b| b != b'=')
        .collect();
    if symbols.len() % 4 == 1 {
        return None;
    }

    let mut out = Vec::with_capacity(symbols.len() * 3 / 4);
    for group in symbols.chunks(4) {
        let mut acc = 0u32;
        for &c in group {
            acc = (acc << 6) | sextet(c)?;
        }
        acc <<= 6 * (4 - group.len() as u32);
        let bytes = acc.to_be_bytes();
        out.extend_from_slice(&bytes[1..group.len()]);
    }
    Some(out)
}

// ============================================================================
// Materials
// ============================================================================

/// Unique material names, indexed by glTF material index.
fn material_names(document: &gltf_dep::Document) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .materials()
        .enumerate()
        .map(|(index, material)| {
            let base = material
                .name()
                .filter(|n| !n.is_empty())
                .map(String::from)
                .unwrap_or_else(|| format!("material{index}"));
            let name = if seen.contains(&base) {
                format!("{base}-{index}")
            } else {
                base
            };
            seen.insert(name.clone());
            name
        })
        .collect()
}

fn convert_material(
    material: &gltf_dep::Material<'_>,
    name: &str,
    image_paths: &[String],
) -> BakeMaterial {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    let mut out = BakeMaterial::new(name)
        .with_diffuse_color([r, g, b])
        .with_opacity(a);

    let path_of = |texture: gltf_dep::Texture<'_>| image_paths.get(texture.source().index()).cloned();

    let slots = [
        (TextureUsage::Albedo, pbr.base_color_texture().map(|i| i.texture())),
        (TextureUsage::Normal, material.normal_texture().map(|t| t.texture())),
        (TextureUsage::Metallic, pbr.metallic_roughness_texture().map(|i| i.texture())),
        (TextureUsage::Occlusion, material.occlusion_texture().map(|t| t.texture())),
        (TextureUsage::Emissive, material.emissive_texture().map(|i| i.texture())),
    ];
    for (usage, texture) in slots {
        if let Some(texture) = texture
            && let Some(path) = path_of(texture)
        {
            out = out.with_texture(usage, path);
        }
    }
    out
}

// ============================================================================
// Meshes
// ============================================================================

/// glTF mesh indices instantiated by skinned nodes.
fn skinned_meshes(document: &gltf_dep::Document) -> HashSet<usize> {
    document
        .nodes()
        .filter(|node| node.skin().is_some())
        .filter_map(|node| node.mesh().map(|mesh| mesh.index()))
        .collect()
}

/// Attributes of one primitive before merging.
#[derive(Default)]
struct PrimitiveData {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    colors: Option<Vec<[f32; 3]>>,
    tex_coords: Option<Vec<[f32; 2]>>,
    tex_coords1: Option<Vec<[f32; 2]>>,
    indices: Vec<u32>,
    material: String,
}

fn convert_mesh(
    mesh: &gltf_dep::Mesh<'_>,
    buffers: &[Vec<u8>],
    material_names: &[String],
    skinned: bool,
) -> Result<Mesh, ImportError> {
    let label = mesh
        .name()
        .map(String::from)
        .unwrap_or_else(|| format!("mesh{}", mesh.index()));

    let mut primitives = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf_dep::mesh::Mode::Triangles {
            log::warn!(
                "Mesh '{label}': skipping primitive {} with mode {:?}",
                primitive.index(),
                primitive.mode()
            );
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .ok_or_else(|| ImportError::MissingPositions {
                mesh: label.clone(),
                primitive: primitive.index(),
            })?
            .collect();
        let indices = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..positions.len() as u32).collect(),
        };
        let material = primitive
            .material()
            .index()
            .and_then(|index| material_names.get(index).cloned())
            .unwrap_or_else(|| PLACEHOLDER_MATERIAL_NAME.to_string());

        primitives.push(PrimitiveData {
            normals: reader.read_normals().map(Iterator::collect),
            colors: reader.read_colors(0).map(|c| c.into_rgb_f32().collect()),
            tex_coords: reader.read_tex_coords(0).map(|t| t.into_f32().collect()),
            tex_coords1: reader.read_tex_coords(1).map(|t| t.into_f32().collect()),
            positions,
            indices,
            material,
        });
    }

    let mut merged = merge_primitives(primitives).with_label(label);
    if skinned {
        let deformers = (0..merged.vertex_count() as i32).collect();
        merged = merged.with_deformers(deformers);
    }
    Ok(merged)
}

/// Concatenate primitives into one mesh, one part per primitive.
///
/// An attribute present on some primitives only is filled with a default for
/// the others so every attribute stays empty or per-vertex.
fn merge_primitives(primitives: Vec<PrimitiveData>) -> Mesh {
    let has_normals = primitives.iter().any(|p| p.normals.is_some());
    let has_colors = primitives.iter().any(|p| p.colors.is_some());
    let has_uv0 = primitives.iter().any(|p| p.tex_coords.is_some());
    let has_uv1 = primitives.iter().any(|p| p.tex_coords1.is_some());

    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut colors = Vec::new();
    let mut tex_coords = Vec::new();
    let mut tex_coords1 = Vec::new();
    let mut parts = Vec::new();

    for primitive in primitives {
        let base = vertices.len() as u32;
        let count = primitive.positions.len();
        if has_normals {
            extend_or_fill(&mut normals, primitive.normals, count, [0.0, 0.0, 1.0]);
        }
        if has_colors {
            extend_or_fill(&mut colors, primitive.colors, count, [1.0; 3]);
        }
        if has_uv0 {
            extend_or_fill(&mut tex_coords, primitive.tex_coords, count, [0.0; 2]);
        }
        if has_uv1 {
            extend_or_fill(&mut tex_coords1, primitive.tex_coords1, count, [0.0; 2]);
        }
        vertices.extend(primitive.positions);
        let indices = primitive.indices.into_iter().map(|i| i + base).collect();
        parts.push(MeshPart::new(primitive.material).with_triangles(indices));
    }

    let mut mesh = Mesh::new(vertices)
        .with_normals(normals)
        .with_colors(colors)
        .with_tex_coords(tex_coords)
        .with_tex_coords1(tex_coords1);
    for part in parts {
        mesh = mesh.with_part(part);
    }
    mesh
}

fn extend_or_fill<T: Copy>(target: &mut Vec<T>, values: Option<Vec<T>>, count: usize, fill: T) {
    match values {
        Some(values) if values.len() == count => target.extend(values),
        _ => target.extend(std::iter::repeat_n(fill, count)),
    }
}
