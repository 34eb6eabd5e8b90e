//! Assembly of the baked scene node tree.
//!
//! Object identifiers come from one counter per builder, handed out in a
//! fixed order: each mesh's geometry then model, then materials, then
//! textures. Relationships are recorded as identifier pairs under the
//! `Connections` node.

use oven_core::material::BakeMaterial;
use oven_core::mesh::{CompressedGeometry, Mesh};
use oven_core::scene::{NodeId, NodeProperty, SceneNode};
use oven_core::texture::TextureUsage;

use crate::model::BakeModel;

// ---------------------------------------------------------------------------
// Material table
// ---------------------------------------------------------------------------

/// Per-face material value of parts whose material is the placeholder or is
/// missing from the model. Never a valid table position.
pub const NO_MATERIAL_ID: u16 = u16::MAX;

/// Materials actually used by a model's parts, in first-use order.
///
/// Stores indices into [`BakeModel::materials`]. The placeholder material and
/// unknown names are never part of the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterialTable {
    order: Vec<usize>,
}

impl MaterialTable {
    /// Collect the materials used by every mesh of `model`.
    pub fn for_model(model: &BakeModel) -> Self {
        let mut order = Vec::new();
        for part in model.meshes.iter().flat_map(|m| &m.parts) {
            let Some(index) = model_material_index(model, &part.material_id) else {
                continue;
            };
            if !order.contains(&index) {
                order.push(index);
            }
        }
        Self { order }
    }

    /// Position of the named material in the table.
    pub fn index_of(&self, model: &BakeModel, name: &str) -> Option<usize> {
        let model_index = model_material_index(model, name)?;
        self.order.iter().position(|&i| i == model_index)
    }

    /// Per-face material value of every part of `mesh`.
    ///
    /// Parts without a material map to [`NO_MATERIAL_ID`] so readers can tell
    /// them apart from faces of the first material.
    pub fn part_material_ids(&self, model: &BakeModel, mesh: &Mesh) -> Vec<u16> {
        mesh.parts
            .iter()
            .map(|part| {
                self.index_of(model, &part.material_id)
                    .and_then(|i| u16::try_from(i).ok())
                    .filter(|&id| id != NO_MATERIAL_ID)
                    .unwrap_or(NO_MATERIAL_ID)
            })
            .collect()
    }

    /// Table positions of the materials used by `mesh`, without repeats.
    pub fn used_by(&self, model: &BakeModel, mesh: &Mesh) -> Vec<usize> {
        let mut used = Vec::new();
        for part in &mesh.parts {
            if let Some(index) = self.index_of(model, &part.material_id)
                && !used.contains(&index)
            {
                used.push(index);
            }
        }
        used
    }

    /// Materials in table order.
    pub fn materials<'a>(&'a self, model: &'a BakeModel) -> impl Iterator<Item = &'a BakeMaterial> {
        self.order.iter().map(move |&i| &model.materials[i])
    }

    /// Number of materials.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no material is used.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn model_material_index(model: &BakeModel, name: &str) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    model
        .materials
        .iter()
        .position(|m| m.name == name && !m.is_placeholder())
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// An identifier-pair edge between two objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Source object.
    pub child: NodeId,
    /// Target object.
    pub parent: NodeId,
    /// Target property for object-to-property connections.
    pub property: Option<&'static str>,
}

impl Connection {
    fn object(child: NodeId, parent: NodeId) -> Self {
        Self {
            child,
            parent,
            property: None,
        }
    }

    fn object_property(child: NodeId, parent: NodeId, property: &'static str) -> Self {
        Self {
            child,
            parent,
            property: Some(property),
        }
    }

    fn to_node(&self) -> SceneNode {
        let node = SceneNode::new("C");
        match self.property {
            None => node
                .with_property("OO")
                .with_property(self.child)
                .with_property(self.parent),
            Some(property) => node
                .with_property("OP")
                .with_property(self.child)
                .with_property(self.parent)
                .with_property(property),
        }
    }
}

/// Finished tree plus the connections it lists.
#[derive(Debug, Clone)]
pub struct BakedTree {
    /// Root node.
    pub root: SceneNode,
    /// Connections in the order they appear under the `Connections` node.
    pub connections: Vec<Connection>,
}

impl BakedTree {
    /// The `Objects` node.
    pub fn objects(&self) -> Option<&SceneNode> {
        self.root.child("Objects")
    }

    /// Number of direct children of `Objects` with the given name.
    pub fn object_count(&self, name: &str) -> usize {
        self.objects()
            .map(|o| o.children_named(name).count())
            .unwrap_or(0)
    }

    /// Every object identifier in the tree.
    pub fn object_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.root.walk(&mut |node| ids.extend(node.id));
        ids
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct MeshEntry {
    geometry: Option<CompressedGeometry>,
    materials: Vec<usize>,
}

struct TextureEntry {
    output_name: String,
    usage: TextureUsage,
    bindings: Vec<(usize, TextureUsage)>,
}

/// Collects meshes, materials and baked textures, then builds the tree.
pub struct NodeTreeBuilder {
    unit_scale_factor: f64,
    next_id: i64,
    meshes: Vec<MeshEntry>,
    materials: Vec<BakeMaterial>,
    textures: Vec<TextureEntry>,
}

impl NodeTreeBuilder {
    /// Create a builder; ids start at 1.
    pub fn new(unit_scale_factor: f64) -> Self {
        Self {
            unit_scale_factor,
            next_id: 1,
            meshes: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a mesh and the material table positions it uses.
    ///
    /// A mesh without geometry still gets a model node.
    pub fn add_mesh(&mut self, geometry: Option<CompressedGeometry>, materials: Vec<usize>) {
        self.meshes.push(MeshEntry {
            geometry,
            materials,
        });
    }

    /// Add a material; returns its table position. Placeholders are skipped.
    pub fn add_material(&mut self, material: &BakeMaterial) -> Option<usize> {
        if material.is_placeholder() {
            return None;
        }
        self.materials.push(material.clone());
        Some(self.materials.len() - 1)
    }

    /// Bind a baked texture to a material slot.
    ///
    /// Texture nodes are keyed by output name, so materials sharing a texture
    /// share one node.
    pub fn bind_texture(&mut self, material: usize, usage: TextureUsage, output_name: &str) {
        let entry = match self
            .textures
            .iter_mut()
            .position(|t| t.output_name == output_name)
        {
            Some(index) => &mut self.textures[index],
            None => {
                self.textures.push(TextureEntry {
                    output_name: output_name.to_string(),
                    usage,
                    bindings: Vec::new(),
                });
                let last = self.textures.len() - 1;
                &mut self.textures[last]
            }
        };
        if !entry.bindings.contains(&(material, usage)) {
            entry.bindings.push((material, usage));
        }
    }

    /// Build the tree.
    pub fn build(mut self) -> BakedTree {
        let meshes = std::mem::take(&mut self.meshes);
        let materials = std::mem::take(&mut self.materials);
        let textures = std::mem::take(&mut self.textures);

        let mut objects = SceneNode::new("Objects");
        let mut connections = Vec::new();

        let mut model_ids = Vec::with_capacity(meshes.len());
        for mesh in &meshes {
            let geometry_id = mesh.geometry.as_ref().map(|g| {
                let id = self.allocate_id();
                objects.children.push(geometry_node(id, g));
                id
            });
            let model_id = self.allocate_id();
            objects.children.push(
                SceneNode::new("Model")
                    .with_id(model_id)
                    .with_property(model_id)
                    .with_property("Model")
                    .with_property("Mesh"),
            );
            if let Some(geometry_id) = geometry_id {
                connections.push(Connection::object(geometry_id, model_id));
            }
            model_ids.push(model_id);
        }

        let mut material_ids = Vec::with_capacity(materials.len());
        for material in &materials {
            let id = self.allocate_id();
            objects.children.push(material_node(id, material));
            material_ids.push(id);
        }
        for (mesh, &model_id) in meshes.iter().zip(&model_ids) {
            for &material in &mesh.materials {
                if let Some(&material_id) = material_ids.get(material) {
                    connections.push(Connection::object(material_id, model_id));
                }
            }
        }

        for texture in &textures {
            let id = self.allocate_id();
            objects.children.push(
                SceneNode::new("Texture")
                    .with_id(id)
                    .with_property(id)
                    .with_property(format!("texture{id}"))
                    .with_child(SceneNode::new("TextureName").with_property(texture.usage.slot_tag()))
                    .with_child(
                        SceneNode::new("RelativeFilename")
                            .with_property(texture.output_name.as_str()),
                    ),
            );
            for &(material, usage) in &texture.bindings {
                let Some(&material_id) = material_ids.get(material) else {
                    continue;
                };
                for &property in usage.connection_properties() {
                    connections.push(Connection::object_property(id, material_id, property));
                }
            }
        }

        let mut connections_node = SceneNode::new("Connections");
        connections_node
            .children
            .extend(connections.iter().map(Connection::to_node));

        let root = SceneNode::new("")
            .with_child(settings_node(self.unit_scale_factor))
            .with_child(objects)
            .with_child(connections_node);

        log::debug!(
            "Built node tree: {} objects, {} connections",
            self.next_id - 1,
            connections.len()
        );
        BakedTree { root, connections }
    }
}

fn property_node(name: &str, kind: &str, label: &str, values: &[f64]) -> SceneNode {
    let mut node = SceneNode::new("P")
        .with_property(name)
        .with_property(kind)
        .with_property(label)
        .with_property("");
    node.properties
        .extend(values.iter().map(|&v| NodeProperty::Float(v)));
    node
}

fn color_node(name: &str, color: [f32; 3]) -> SceneNode {
    let mut node = SceneNode::new("P")
        .with_property(name)
        .with_property("Color")
        .with_property("")
        .with_property("A");
    node.properties
        .extend(color.iter().map(|&c| NodeProperty::from(c)));
    node
}

fn settings_node(unit_scale_factor: f64) -> SceneNode {
    SceneNode::new("GlobalSettings").with_child(
        SceneNode::new("Properties70").with_child(property_node(
            "UnitScaleFactor",
            "double",
            "Number",
            &[unit_scale_factor],
        )),
    )
}

fn geometry_node(id: NodeId, geometry: &CompressedGeometry) -> SceneNode {
    let mut channels = SceneNode::new("Channels");
    for (kind, unique_id) in geometry.channels.iter() {
        channels.children.push(
            SceneNode::new("Channel")
                .with_property(kind.name())
                .with_property(i64::from(unique_id)),
        );
    }
    SceneNode::new("Geometry")
        .with_id(id)
        .with_property(id)
        .with_property("Geometry")
        .with_property("Mesh")
        .with_child(
            SceneNode::new("CompressedMesh")
                .with_property(geometry.data.clone())
                .with_child(channels),
        )
}

fn material_node(id: NodeId, material: &BakeMaterial) -> SceneNode {
    SceneNode::new("Material")
        .with_id(id)
        .with_property(id)
        .with_property(material.name.as_str())
        .with_property("")
        .with_child(
            SceneNode::new("Properties70")
                .with_child(color_node("DiffuseColor", material.diffuse_color))
                .with_child(color_node("SpecularColor", material.specular_color))
                .with_child(property_node(
                    "Shininess",
                    "double",
                    "Number",
                    &[f64::from(material.shininess)],
                ))
                .with_child(property_node(
                    "Opacity",
                    "double",
                    "Number",
                    &[f64::from(material.opacity)],
                )),
        )
}
