//! Kind tags shared by data objects, wrappers and the registry.

use serde::{Deserialize, Serialize};

/// Kind of scene element a data object serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    #[default]
    Unknown,
    Nurbs,
    Mesh,
    Light,
    Weirdo,
    NuCurve,
    Particles,
    Locator,
    RibGen,
    Shader,
    Coord,
    Subdivision,
    MayaSubdivision,
    Custom,
    ClipPlane,
    PfxToon,
    PfxHair,
    PfxTube,
    PfxLeaf,
    PfxPetal,
    ImplicitSphere,
    Curves,
}

impl ObjectType {
    /// Stable lowercase name used in logs and scene descriptions.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Nurbs => "nurbs",
            Self::Mesh => "mesh",
            Self::Light => "light",
            Self::Weirdo => "weirdo",
            Self::NuCurve => "nu_curve",
            Self::Particles => "particles",
            Self::Locator => "locator",
            Self::RibGen => "rib_gen",
            Self::Shader => "shader",
            Self::Coord => "coord",
            Self::Subdivision => "subdivision",
            Self::MayaSubdivision => "maya_subdivision",
            Self::Custom => "custom",
            Self::ClipPlane => "clip_plane",
            Self::PfxToon => "pfx_toon",
            Self::PfxHair => "pfx_hair",
            Self::PfxTube => "pfx_tube",
            Self::PfxLeaf => "pfx_leaf",
            Self::PfxPetal => "pfx_petal",
            Self::ImplicitSphere => "implicit_sphere",
            Self::Curves => "curves",
        }
    }

    /// Curve-like primitives need a b-spline basis set before emission.
    pub fn uses_bspline_basis(self) -> bool {
        matches!(
            self,
            Self::NuCurve
                | Self::PfxHair
                | Self::PfxTube
                | Self::PfxLeaf
                | Self::PfxPetal
                | Self::Curves
        )
    }
}

impl ObjectType {
    /// Kinds whose geometry can be retained with `ObjectBegin` and
    /// referenced again through its handle.
    pub fn is_retained(self) -> bool {
        matches!(
            self,
            Self::Mesh
                | Self::Subdivision
                | Self::MayaSubdivision
                | Self::Nurbs
                | Self::NuCurve
                | Self::Curves
                | Self::Particles
                | Self::PfxToon
                | Self::PfxTube
                | Self::PfxLeaf
                | Self::PfxPetal
                | Self::PfxHair
                | Self::ImplicitSphere
        )
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Light source kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightType {
    #[default]
    Unknown,
    Ambient,
    Distant,
    Point,
    Spot,
    Rman,
    Area,
}

/// Face of the six-sided point-light shadow cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointLightDirection {
    Px,
    Py,
    Pz,
    Nx,
    Ny,
    Nz,
}

impl PointLightDirection {
    /// All six faces in shadow-parameter order.
    pub const ALL: [Self; 6] = [Self::Px, Self::Nx, Self::Py, Self::Ny, Self::Pz, Self::Nz];

    /// File-name suffix for this face.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Px => "_PX",
            Self::Py => "_PY",
            Self::Pz => "_PZ",
            Self::Nx => "_NX",
            Self::Ny => "_NY",
            Self::Nz => "_NZ",
        }
    }

    /// Shadow-name parameter suffix (`px`, `nx`, ...).
    pub fn param_suffix(self) -> &'static str {
        match self {
            Self::Px => "px",
            Self::Py => "py",
            Self::Pz => "pz",
            Self::Nx => "nx",
            Self::Ny => "ny",
            Self::Nz => "nz",
        }
    }
}

/// Shadow map flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowType {
    #[default]
    Standard,
    MidPoint,
    MinMax,
    Deep,
}

/// Animation classification of one aspect (matrix or body) across samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AnimType {
    #[default]
    Const,
    Animated,
    Incompatible,
}

impl AnimType {
    /// True when a motion block is required.
    pub fn is_animated(self) -> bool {
        self == Self::Animated
    }
}

/// What changed between two samples of the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChangeKind {
    #[default]
    None,
    TransformOnly,
    DeformationOnly,
    Both,
}

impl ChangeKind {
    /// Combine independent matrix/body classifications.
    pub fn from_parts(matrix: AnimType, body: AnimType) -> Self {
        match (matrix.is_animated(), body.is_animated()) {
            (false, false) => Self::None,
            (true, false) => Self::TransformOnly,
            (false, true) => Self::DeformationOnly,
            (true, true) => Self::Both,
        }
    }
}
