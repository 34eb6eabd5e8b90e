//! CPU-side mesh data structures consumed by the encoder.
//!
//! This module provides:
//! - [`MeshPart`] - Triangle index lists sharing one material
//! - [`Mesh`] - Per-vertex attribute arrays plus an ordered list of parts

/// A group of triangles within a [`Mesh`] that share one material.
///
/// Both index lists are flat triangle lists: every three consecutive indices
/// form one triangle. `quad_triangle_indices` holds triangles produced by
/// splitting quads in the source model; they are encoded before the plain
/// triangles of the same part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshPart {
    /// Plain triangle indices into the mesh vertex arrays.
    pub triangle_indices: Vec<u32>,
    /// Triangles produced by triangulating quads.
    pub quad_triangle_indices: Vec<u32>,
    /// Name of the material in the owning model's material table.
    pub material_id: String,
}

impl MeshPart {
    /// Creates an empty part bound to the given material.
    pub fn new(material_id: impl Into<String>) -> Self {
        Self {
            triangle_indices: Vec::new(),
            quad_triangle_indices: Vec::new(),
            material_id: material_id.into(),
        }
    }

    /// Set the plain triangle indices.
    #[must_use]
    pub fn with_triangles(mut self, indices: Vec<u32>) -> Self {
        self.triangle_indices = indices;
        self
    }

    /// Set the quad-derived triangle indices.
    #[must_use]
    pub fn with_quad_triangles(mut self, indices: Vec<u32>) -> Self {
        self.quad_triangle_indices = indices;
        self
    }

    /// Whether both index lists hold whole triangles.
    pub fn is_well_formed(&self) -> bool {
        self.triangle_indices.len() % 3 == 0 && self.quad_triangle_indices.len() % 3 == 0
    }

    /// Number of triangles in this part, counting both index lists.
    pub fn triangle_count(&self) -> usize {
        (self.triangle_indices.len() + self.quad_triangle_indices.len()) / 3
    }
}

/// An editable mesh as produced by a model parser.
///
/// Every optional attribute array is either empty or holds exactly one entry
/// per vertex. The encoder rejects meshes that break this rule.
///
/// # Example
///
/// ```
/// use oven_core::mesh::{Mesh, MeshPart};
///
/// let mesh = Mesh::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]])
///     .with_part(MeshPart::new("default").with_triangles(vec![0, 1, 2]))
///     .with_label("tri");
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.valid_triangle_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<[f32; 3]>,
    /// Vertex normals (empty or one per vertex).
    pub normals: Vec<[f32; 3]>,
    /// Vertex colors, linear RGB (empty or one per vertex).
    pub colors: Vec<[f32; 3]>,
    /// First texture coordinate set (empty or one per vertex).
    pub tex_coords: Vec<[f32; 2]>,
    /// Second texture coordinate set (empty or one per vertex).
    pub tex_coords1: Vec<[f32; 2]>,
    /// Index of each vertex in the source model before re-indexing.
    ///
    /// Only meaningful when [`has_deformers`](Self::has_deformers) is set.
    pub original_indices: Vec<i32>,
    /// Ordered triangle groups.
    pub parts: Vec<MeshPart>,
    /// Whether skinning deformers reference this mesh.
    pub has_deformers: bool,
    /// Whether the source already stored this mesh compressed.
    pub was_compressed: bool,
    /// Optional label for logging.
    pub label: Option<String>,
}

impl Mesh {
    /// Creates a mesh with the given positions and no parts.
    pub fn new(vertices: Vec<[f32; 3]>) -> Self {
        Self {
            vertices,
            ..Self::default()
        }
    }

    /// Set per-vertex normals.
    #[must_use]
    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    /// Set per-vertex colors.
    #[must_use]
    pub fn with_colors(mut self, colors: Vec<[f32; 3]>) -> Self {
        self.colors = colors;
        self
    }

    /// Set the first texture coordinate set.
    #[must_use]
    pub fn with_tex_coords(mut self, tex_coords: Vec<[f32; 2]>) -> Self {
        self.tex_coords = tex_coords;
        self
    }

    /// Set the second texture coordinate set.
    #[must_use]
    pub fn with_tex_coords1(mut self, tex_coords: Vec<[f32; 2]>) -> Self {
        self.tex_coords1 = tex_coords;
        self
    }

    /// Mark the mesh as deformed and record the original vertex indices.
    #[must_use]
    pub fn with_deformers(mut self, original_indices: Vec<i32>) -> Self {
        self.has_deformers = true;
        self.original_indices = original_indices;
        self
    }

    /// Append a part.
    #[must_use]
    pub fn with_part(mut self, part: MeshPart) -> Self {
        self.parts.push(part);
        self
    }

    /// Mark the mesh as already compressed by a previous bake.
    #[must_use]
    pub fn with_compressed(mut self, was_compressed: bool) -> Self {
        self.was_compressed = was_compressed;
        self
    }

    /// Set a label used in log output.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Total triangle count over all well-formed parts.
    pub fn valid_triangle_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| part.is_well_formed())
            .map(MeshPart::triangle_count)
            .sum()
    }

    /// Label for log output, falling back to a placeholder.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed mesh>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_well_formed() {
        let part = MeshPart::new("m").with_triangles(vec![0, 1, 2, 2, 3, 0]);
        assert!(part.is_well_formed());
        assert_eq!(part.triangle_count(), 2);

        let bad = MeshPart::new("m").with_triangles(vec![0, 1]);
        assert!(!bad.is_well_formed());

        let bad_quads = MeshPart::new("m")
            .with_triangles(vec![0, 1, 2])
            .with_quad_triangles(vec![0, 1, 2, 3]);
        assert!(!bad_quads.is_well_formed());
    }

    #[test]
    fn test_valid_triangle_count_skips_malformed() {
        let mesh = Mesh::new(vec![[0.0; 3]; 4])
            .with_part(MeshPart::new("a").with_triangles(vec![0, 1, 2]))
            .with_part(MeshPart::new("b").with_triangles(vec![0, 1]))
            .with_part(
                MeshPart::new("c")
                    .with_quad_triangles(vec![0, 1, 2, 2, 3, 0])
                    .with_triangles(vec![1, 2, 3]),
            );
        assert_eq!(mesh.valid_triangle_count(), 4);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Mesh::default().display_name(), "<unnamed mesh>");
        assert_eq!(Mesh::default().with_label("body").display_name(), "body");
    }
}
