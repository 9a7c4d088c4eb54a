//! Per-job render settings and the per-frame state carried by the encoder.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::util::{DMat4, Error, Result};

/// Upper bound on motion samples per object.
pub const MAX_MOTION_SAMPLES: usize = 16;

/// Sample times of one motion block.
pub type SampleTimes = SmallVec<[f32; 4]>;

/// Which pass the stream is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPass {
    #[default]
    Final,
    Shadow,
    DeepShadow,
}

impl RenderPass {
    /// Shadow passes skip motion unless the map is deep.
    pub fn is_shadow(self) -> bool {
        matches!(self, Self::Shadow | Self::DeepShadow)
    }

    /// True when motion blocks are allowed in this pass.
    pub fn allows_motion(self) -> bool {
        !matches!(self, Self::Shadow)
    }
}

/// Settings used to derive deterministic shadow-map file names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowNaming {
    /// Lights write shadow parameters at all.
    pub enabled: bool,
    /// Scene (project) name used as a file-name prefix.
    pub scene_name: String,
    /// Directory shadow maps are written to, with trailing separator.
    pub texture_dir: String,
    /// Texture file extension without the dot.
    pub extension: String,
    /// Zero-pad width for frame numbers, 0 for none.
    pub frame_padding: usize,
    /// Drop the scene-name prefix.
    pub shape_only: bool,
}

impl Default for ShadowNaming {
    fn default() -> Self {
        Self {
            enabled: true,
            scene_name: "untitled".to_string(),
            texture_dir: "rmantex/".to_string(),
            extension: "tex".to_string(),
            frame_padding: 0,
            shape_only: false,
        }
    }
}

/// Job-level settings shared by every node of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Shutter-relative times of each motion sample.
    pub sample_times: Vec<f32>,
    /// Enables transformation motion blur.
    pub transformation_blur: bool,
    /// Enables deformation motion blur.
    pub deformation_blur: bool,
    /// Write sample offsets instead of absolute times in MotionBegin.
    pub relative_motion: bool,
    /// Use ConcatTransform instead of Transform for object matrices.
    pub relative_transforms: bool,
    /// Shutter angle in degrees.
    pub shutter_angle: f32,
    /// Frame being written.
    pub frame: i64,
    /// Pass being written.
    pub pass: RenderPass,
    /// Shadow-map naming.
    pub shadows: ShadowNaming,
    /// Camera matrix handed to RibGen plugins.
    pub camera_matrix: DMat4,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_times: vec![0.0],
            transformation_blur: false,
            deformation_blur: false,
            relative_motion: false,
            relative_transforms: true,
            shutter_angle: 180.0,
            frame: 1,
            pass: RenderPass::Final,
            shadows: ShadowNaming::default(),
            camera_matrix: DMat4::IDENTITY,
        }
    }
}

impl RenderSettings {
    /// Parse settings from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the emitter cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.sample_times.is_empty() {
            return Err(Error::InvalidConfig("at least one sample time required".into()));
        }
        if self.sample_times.len() > MAX_MOTION_SAMPLES {
            return Err(Error::InvalidConfig(format!(
                "{} motion samples exceed the limit of {}",
                self.sample_times.len(),
                MAX_MOTION_SAMPLES
            )));
        }
        Ok(())
    }

    /// Number of motion samples.
    pub fn motion_samples(&self) -> usize {
        self.sample_times.len()
    }

    /// Times written in MotionBegin: absolute, or offsets from the first sample.
    pub fn motion_times(&self) -> SampleTimes {
        let first = self.sample_times.first().copied().unwrap_or(0.0);
        self.sample_times
            .iter()
            .map(|t| if self.relative_motion { t - first } else { *t })
            .collect()
    }

    /// Snapshot of per-frame state for the encoder.
    pub fn frame_info(&self) -> FrameInfo {
        FrameInfo {
            frame: self.frame,
            pass: self.pass,
            sample_times: self.sample_times.iter().copied().collect(),
            transformation_blur: self.transformation_blur,
            deformation_blur: self.deformation_blur,
            shutter_angle: self.shutter_angle,
            camera_matrix: self.camera_matrix,
            shadows: self.shadows.clone(),
        }
    }
}

/// Per-frame state travelling with the encoder so data objects never read globals.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    pub frame: i64,
    pub pass: RenderPass,
    pub sample_times: SampleTimes,
    pub transformation_blur: bool,
    pub deformation_blur: bool,
    pub shutter_angle: f32,
    pub camera_matrix: DMat4,
    pub shadows: ShadowNaming,
}

impl FrameInfo {
    /// Motion samples actually written: one in plain shadow passes or without blur.
    pub fn motion_samples(&self) -> usize {
        let blur = self.transformation_blur || self.deformation_blur;
        if blur && self.pass.allows_motion() {
            self.sample_times.len()
        } else {
            1
        }
    }
}

impl Default for FrameInfo {
    fn default() -> Self {
        RenderSettings::default().frame_info()
    }
}
