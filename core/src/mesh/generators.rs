//! Mesh generators for common shapes.
//!
//! These produce [`Mesh`] values with normals and texture coordinates, used by
//! tests and benchmarks as stand-ins for parsed models.

use std::f32::consts::PI;

use super::data::{Mesh, MeshPart};

/// Generate a UV sphere mesh with a single part.
///
/// # Arguments
///
/// * `radius` - Sphere radius
/// * `segments` - Number of longitudinal segments (around the equator)
/// * `rings` - Number of latitudinal rings (from pole to pole)
/// * `material` - Material name of the only part
pub fn generate_sphere(radius: f32, segments: u32, rings: u32, material: &str) -> Mesh {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut tex_coords = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let theta = ring as f32 * PI / rings as f32;
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        for segment in 0..=segments {
            let phi = segment as f32 * 2.0 * PI / segments as f32;
            let x = sin_theta * phi.cos();
            let y = cos_theta;
            let z = sin_theta * phi.sin();

            positions.push([x * radius, y * radius, z * radius]);
            normals.push([x, y, z]);
            tex_coords.push([segment as f32 / segments as f32, ring as f32 / rings as f32]);
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;
            indices.extend_from_slice(&[current, next, current + 1]);
            indices.extend_from_slice(&[current + 1, next, next + 1]);
        }
    }

    Mesh::new(positions)
        .with_normals(normals)
        .with_tex_coords(tex_coords)
        .with_part(MeshPart::new(material).with_triangles(indices))
        .with_label("sphere")
}

/// Generate a quad on the XY plane, stored as two quad-derived triangles.
///
/// UV coordinates go from (0,0) at top-left to (1,1) at bottom-right.
pub fn generate_quad(half_width: f32, half_height: f32, material: &str) -> Mesh {
    Mesh::new(vec![
        [-half_width, -half_height, 0.0],
        [half_width, -half_height, 0.0],
        [half_width, half_height, 0.0],
        [-half_width, half_height, 0.0],
    ])
    .with_normals(vec![[0.0, 0.0, 1.0]; 4])
    .with_tex_coords(vec![[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]])
    .with_part(MeshPart::new(material).with_quad_triangles(vec![0, 1, 2, 2, 3, 0]))
    .with_label("quad")
}

/// Generate an axis-aligned cube with one part per side.
///
/// `materials` is cycled over the six sides, so passing a single name gives
/// six parts sharing one material.
pub fn generate_cube(half_extent: f32, materials: &[&str]) -> Mesh {
    const SIDES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];
    let uvs = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

    let mut mesh = Mesh::default().with_label("cube");
    for (side, (normal, u, v)) in SIDES.iter().enumerate() {
        let base = mesh.vertices.len() as u32;
        for ([cu, cv], uv) in corners.iter().zip(uvs) {
            let p = std::array::from_fn(|i| (normal[i] + u[i] * cu + v[i] * cv) * half_extent);
            mesh.vertices.push(p);
            mesh.normals.push(*normal);
            mesh.tex_coords.push(uv);
        }
        let material = if materials.is_empty() {
            ""
        } else {
            materials[side % materials.len()]
        };
        mesh.parts.push(MeshPart::new(material).with_quad_triangles(vec![
            base,
            base + 1,
            base + 2,
            base + 2,
            base + 3,
            base,
        ]));
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_sphere() {
        let mesh = generate_sphere(1.0, 8, 4, "m");
        // (rings+1) * (segments+1) = 5 * 9 = 45 vertices
        assert_eq!(mesh.vertex_count(), 45);
        assert_eq!(mesh.normals.len(), 45);
        // rings * segments * 2 = 4 * 8 * 2 = 64 triangles
        assert_eq!(mesh.valid_triangle_count(), 64);
    }

    #[test]
    fn test_generate_quad() {
        let mesh = generate_quad(0.5, 0.5, "m");
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.parts.len(), 1);
        assert_eq!(mesh.parts[0].quad_triangle_indices.len(), 6);
    }

    #[test]
    fn test_generate_cube_cycles_materials() {
        let mesh = generate_cube(1.0, &["a", "b"]);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.valid_triangle_count(), 12);
        let names: Vec<_> = mesh.parts.iter().map(|p| p.material_id.as_str()).collect();
        assert_eq!(names, ["a", "b", "a", "b", "a", "b"]);
        for p in &mesh.vertices {
            assert!(p.iter().all(|c| c.abs() == 1.0));
        }
    }
}
