use glam::Vec3;

/// A bone that inherits part of another bone's motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppendBone {
    /// Index of the bone being followed.
    pub parent: usize,
    pub rotate: bool,
    pub translate: bool,
    pub ratio: f32,
}

/// Raw per-axis joint limits of an IK link, in radians. The bounds may come
/// in either order; they are normalized when the poser is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkLimit {
    pub lower: Vec3,
    pub upper: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkLink {
    pub bone: usize,
    pub limit: Option<IkLimit>,
}

impl IkLink {
    #[must_use]
    pub fn free(bone: usize) -> Self {
        Self { bone, limit: None }
    }

    #[must_use]
    pub fn limited(bone: usize, lower: Vec3, upper: Vec3) -> Self {
        Self {
            bone,
            limit: Some(IkLimit { lower, upper }),
        }
    }
}

/// Inverse kinematics owned by a bone: rotate `links` so that `target`
/// reaches the owner's position.
///
/// Links are ordered from the one nearest the target outwards.
#[derive(Debug, Clone, PartialEq)]
pub struct IkDescriptor {
    pub target: usize,
    pub links: Vec<IkLink>,
    /// Maximum CCD rounds. Values above 256 are clamped.
    pub iterations: u32,
    /// Largest rotation, in radians, a link may take per step. Scaled by the
    /// link's position in the chain.
    pub angle_limit: f32,
}

/// Static description of one bone.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Rest position in model space.
    pub position: Vec3,
    pub parent: Option<usize>,
    /// Evaluation rank. A bone is posed after every bone of lower level, and
    /// after lower-indexed bones of the same level.
    pub transform_level: i32,
    /// Posed after the physics step instead of before it.
    pub post_physics: bool,
    pub append: Option<AppendBone>,
    pub ik: Option<IkDescriptor>,
}

impl Bone {
    #[must_use]
    pub fn new(name: impl Into<String>, position: Vec3) -> Self {
        Self {
            name: name.into(),
            position,
            parent: None,
            transform_level: 0,
            post_physics: false,
            append: None,
            ik: None,
        }
    }

    #[must_use]
    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn with_level(mut self, transform_level: i32) -> Self {
        self.transform_level = transform_level;
        self
    }

    #[must_use]
    pub fn with_post_physics(mut self) -> Self {
        self.post_physics = true;
        self
    }

    #[must_use]
    pub fn with_append(mut self, parent: usize, rotate: bool, translate: bool, ratio: f32) -> Self {
        self.append = Some(AppendBone {
            parent,
            rotate,
            translate,
            ratio,
        });
        self
    }

    #[must_use]
    pub fn with_ik(mut self, ik: IkDescriptor) -> Self {
        self.ik = Some(ik);
        self
    }
}
