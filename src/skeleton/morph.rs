use glam::{Quat, Vec3, Vec4};

/// Re-applies another morph, scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMorphEntry {
    pub morph: usize,
    pub rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexMorphEntry {
    pub vertex: usize,
    pub offset: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneMorphEntry {
    pub bone: usize,
    pub translation: Vec3,
    pub rotation: Quat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvMorphEntry {
    pub vertex: usize,
    /// 0 for the base UV set, 1..=4 for the extra UV sets.
    pub channel: u8,
    pub offset: Vec4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialMorphOp {
    Multiply,
    Add,
}

/// Every animatable material parameter, used both as morph payload and as
/// accumulation image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialValues {
    pub diffuse: Vec4,
    pub specular: Vec4,
    pub ambient: Vec4,
    pub shininess: f32,
    pub edge_color: Vec4,
    pub edge_size: f32,
    pub texture: Vec4,
    pub sub_texture: Vec4,
    pub toon_texture: Vec4,
}

impl MaterialValues {
    #[must_use]
    pub fn splat(v: f32) -> Self {
        let seed = Vec4::splat(v);
        Self {
            diffuse: seed,
            specular: seed,
            ambient: seed,
            shininess: v,
            edge_color: seed,
            edge_size: v,
            texture: seed,
            sub_texture: seed,
            toon_texture: seed,
        }
    }

    /// `self += (other + bias) * rate`, field by field.
    pub(crate) fn accumulate(&mut self, other: &MaterialValues, bias: f32, rate: f32) {
        let b = Vec4::splat(bias);
        self.diffuse += (other.diffuse + b) * rate;
        self.specular += (other.specular + b) * rate;
        self.ambient += (other.ambient + b) * rate;
        self.shininess += (other.shininess + bias) * rate;
        self.edge_color += (other.edge_color + b) * rate;
        self.edge_size += (other.edge_size + bias) * rate;
        self.texture += (other.texture + b) * rate;
        self.sub_texture += (other.sub_texture + b) * rate;
        self.toon_texture += (other.toon_texture + b) * rate;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialMorphEntry {
    /// Target material, `None` for every material.
    pub material: Option<usize>,
    pub op: MaterialMorphOp,
    pub values: MaterialValues,
}

/// What a morph deforms. Each kind carries only the data it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum MorphKind {
    Group(Vec<GroupMorphEntry>),
    Vertex(Vec<VertexMorphEntry>),
    Bone(Vec<BoneMorphEntry>),
    Uv(Vec<UvMorphEntry>),
    Material(Vec<MaterialMorphEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Morph {
    pub name: String,
    pub kind: MorphKind,
}

impl Morph {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: MorphKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}
