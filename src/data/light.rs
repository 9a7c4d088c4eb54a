//! Light sources.
//!
//! A light is written as its world transform followed by one `LightSource`
//! call. The shader and its parameter set depend on the light type; in a
//! shadow pass every shadow-casting light collapses to the
//! `liquidshadowpasslight` shader reading its own map.

use glam::{DMat4, DVec3};
use tracing::{debug, warn};

use super::{short_name, RibData, RibPrimitive};
use crate::core::{AttributeSource, LightType, ObjectType, PointLightDirection, ShadowNaming, ShadowType};
use crate::rib::{LightHandle, RibEncoder, RibParam};
use crate::token::{list, ParameterRecord, ParameterType};
use crate::util::{Result, Vec3};

/// Spot light decay region: start, end and the intensities at both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayRegion {
    pub start: f32,
    pub end: f32,
    pub start_intensity: f32,
    pub end_intensity: f32,
}

/// Renderer-side light attributes (`Attribute "light" ...`).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightAttributes {
    pub emit_photons: bool,
    pub auto_shadows: bool,
    pub auto_shadow_samples: i32,
    /// 0 none, 1 `lightsource`, 2 `illuminance`.
    pub sampling_strategy: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShadowSettings {
    pub using_shadow: bool,
    pub kind: ShadowType,
    pub ray_traced: bool,
    pub ray_samples: i32,
    pub radius: f32,
    pub filter_size: f32,
    pub bias: f32,
    pub samples: f32,
    pub blur: f32,
    pub color: Vec3,
    /// Explicit map name; empty or `autoshadow*` means derived.
    pub user_name: String,
    pub every_frame: bool,
    pub render_at_frame: i64,
    pub geometry_set: String,
}

#[derive(Debug, Clone)]
pub struct LightData {
    light_name: String,
    light_type: LightType,
    color: Vec3,
    intensity: f32,
    decay: f32,
    cone_angle: f32,
    penumbra: f32,
    dropoff: f32,
    /// Enabled flag, then left, right, top and bottom angles.
    barn_doors: (bool, [f32; 4]),
    decay_regions: Option<[DecayRegion; 3]>,
    shadow: ShadowSettings,
    category: String,
    light_id: f32,
    non_diffuse: f32,
    non_specular: f32,
    both_sides: bool,
    hitmode: i32,
    light_map: String,
    light_map_saturation: f32,
    renderer: LightAttributes,
    rman_shader: Option<String>,
    extra: Vec<ParameterRecord>,
    exclude_from_rib: bool,
    transform: DMat4,
    handle: Option<LightHandle>,
}

impl LightData {
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource) -> Result<Self> {
        let float = |attr: &str, default: f32| attrs.get_float(attr).unwrap_or(default);
        let flag = |attr: &str, default: bool| attrs.get_bool(attr).unwrap_or(default);

        let rman_shader = attrs.get_string("liquidLightShader").filter(|s| !s.is_empty());
        let light_type = if rman_shader.is_some() {
            LightType::Rman
        } else {
            match attrs.get_string("lightType").as_deref() {
                Some("ambient") => LightType::Ambient,
                Some("distant" | "directional") => LightType::Distant,
                Some("point") => LightType::Point,
                Some("spot") => LightType::Spot,
                Some("area") => LightType::Area,
                other => {
                    warn!(light = name, kind = ?other, "unknown light type; nothing written");
                    LightType::Unknown
                }
            }
        };

        let region = |i: u32| DecayRegion {
            start: float(&format!("startDistance{i}"), 0.0),
            end: float(&format!("endDistance{i}"), 0.0),
            start_intensity: float(&format!("startDistanceIntensity{i}"), 1.0),
            end_intensity: float(&format!("endDistanceIntensity{i}"), 1.0),
        };

        let ray_traced = flag("useRayTraceShadows", false);
        let shadow = ShadowSettings {
            using_shadow: flag("useDepthMapShadows", false) || ray_traced,
            kind: if flag("deepShadows", false) { ShadowType::Deep } else { ShadowType::Standard },
            ray_traced,
            ray_samples: attrs.get_int("shadowRays").unwrap_or(16),
            radius: float("shadowRadius", 0.0),
            filter_size: float("dmapFilterSize", 1.0),
            bias: float("dmapBias", 0.001),
            samples: attrs
                .get_float("liqShadowMapSamples")
                .or_else(|| attrs.get_float("shadowSamples"))
                .unwrap_or(if light_type == LightType::Area { 64.0 } else { 16.0 }),
            blur: float("liqShadowBlur", 0.0),
            color: attrs.get_vec3("shadowColor").unwrap_or(Vec3::ZERO),
            user_name: attrs
                .get_string("liquidShadowName")
                .filter(|n| !n.to_lowercase().starts_with("autoshadow"))
                .unwrap_or_default(),
            every_frame: flag("everyFrame", true),
            render_at_frame: i64::from(attrs.get_int("renderAtFrame").unwrap_or(0)),
            geometry_set: attrs.get_string("geometrySet").unwrap_or_default(),
        };

        let mut transform = match attrs.get_float_array("worldMatrix") {
            Some(m) if m.len() == 16 => {
                let cols: Vec<f64> = m.iter().map(|v| f64::from(*v)).collect();
                DMat4::from_cols_slice(&cols)
            }
            _ => DMat4::IDENTITY,
        };
        if !flag("liquidUseLightScale", false) {
            // Host lights shine down -Z; RenderMan lights down +Z.
            let (_, rotation, translation) = transform.to_scale_rotation_translation();
            transform = DMat4::from_scale_rotation_translation(DVec3::new(1.0, 1.0, -1.0), rotation, translation);
        }

        Ok(Self {
            light_name: sanitize(short_name(name)),
            light_type,
            color: attrs.get_vec3("color").unwrap_or(Vec3::ONE),
            intensity: float("intensity", 1.0),
            decay: float("decayRate", 0.0),
            cone_angle: float("coneAngle", 40f32.to_radians()) / 2.0,
            penumbra: float("penumbraAngle", 0.0),
            dropoff: float("dropoff", 0.0),
            barn_doors: (
                flag("barnDoors", false),
                [
                    float("leftBarnDoor", 20.0),
                    float("rightBarnDoor", 20.0),
                    float("topBarnDoor", 20.0),
                    float("bottomBarnDoor", 20.0),
                ],
            ),
            decay_regions: flag("useDecayRegions", false).then(|| [region(1), region(2), region(3)]),
            shadow,
            category: attrs.get_string("__category").unwrap_or_default(),
            light_id: float("lightID", 0.0),
            non_diffuse: 1.0 - float("emitDiffuse", 1.0),
            non_specular: 1.0 - float("emitSpecular", 1.0),
            both_sides: flag("liqBothSidesEmit", false),
            hitmode: attrs.get_int("liqAreaHitmode").unwrap_or(1),
            light_map: attrs.get_string("liqLightMap").unwrap_or_default(),
            light_map_saturation: float("liqLightMapSaturation", 1.0),
            renderer: LightAttributes {
                emit_photons: flag("liqDelightLightEmitphotons", false),
                auto_shadows: flag("liqDelightLightShadows", false),
                auto_shadow_samples: attrs.get_int("liqDelightLightSamples").unwrap_or(1),
                sampling_strategy: attrs.get_int("liqDelightLightSamplingStrategy").unwrap_or(0),
            },
            rman_shader,
            extra: list::extra_surface_parameters(attrs, ObjectType::Light, None),
            exclude_from_rib: flag("liquidExcludeFromRib", false),
            transform,
            handle: None,
        })
    }

    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    pub fn light_name(&self) -> &str {
        &self.light_name
    }

    pub fn shadow(&self) -> &ShadowSettings {
        &self.shadow
    }

    /// Handle returned by the last `LightSource`.
    pub fn handle(&self) -> Option<LightHandle> {
        self.handle
    }

    /// Shadow-map file name for this light.
    ///
    /// `<texture_dir>[<scene>_]<light>_<SHD|DSH>[_<dir>].[<set>.]<frame>.<ext>`,
    /// unless the light names its map explicitly.
    pub fn auto_shadow_name(&self, naming: &ShadowNaming, frame: i64, dir: Option<PointLightDirection>) -> String {
        if !self.shadow.user_name.is_empty() {
            return self.shadow.user_name.clone();
        }
        let mut name = naming.texture_dir.clone();
        if !naming.shape_only {
            name.push_str(&naming.scene_name);
            name.push('_');
        }
        name.push_str(&self.light_name);
        name.push_str(if self.shadow.kind == ShadowType::Deep { "_DSH" } else { "_SHD" });
        if let Some(dir) = dir {
            name.push_str(dir.suffix());
        }
        name.push('.');
        if !self.shadow.geometry_set.is_empty() {
            name.push_str(&self.shadow.geometry_set);
            name.push('.');
        }
        let frame = if self.shadow.every_frame { frame } else { self.shadow.render_at_frame };
        name.push_str(&format!("{frame:0width$}", width = naming.frame_padding));
        name.push('.');
        name.push_str(&naming.extension);
        name
    }

    /// Map name for the single-map light types.
    fn shadow_name(&self, naming: &ShadowNaming, frame: i64) -> String {
        if self.shadow.ray_traced {
            "raytrace".to_string()
        } else {
            self.auto_shadow_name(naming, frame, None)
        }
    }

    fn write_renderer_attributes(&self, enc: &mut RibEncoder) -> Result<()> {
        let r = &self.renderer;
        if r.emit_photons {
            enc.attribute("light", &[RibParam::string("string emitphotons", "on")])?;
        }
        if r.auto_shadows {
            enc.attribute("light", &[RibParam::string("string shadows", "on")])?;
        }
        if r.auto_shadow_samples != 1 {
            enc.attribute("light", &[RibParam::int("integer samples", r.auto_shadow_samples)])?;
        }
        match r.sampling_strategy {
            1 => enc.attribute("light", &[RibParam::string("string samplingstrategy", "lightsource")])?,
            2 => enc.attribute("light", &[RibParam::string("string samplingstrategy", "illuminance")])?,
            _ => {}
        }
        Ok(())
    }

    /// Trailing shadow, emission and category parameters shared by most types.
    fn shadow_params(&self, params: &mut Vec<ParameterRecord>, shadow_name: Option<String>) {
        if let Some(name) = shadow_name {
            params.push(string("shadowname", &name));
        }
        let filter = if self.shadow.ray_traced { self.shadow.radius } else { self.shadow.filter_size };
        params.push(float("shadowfiltersize", filter));
        params.push(float("shadowbias", self.shadow.bias));
        params.push(float("shadowsamples", self.shadow.samples));
        params.push(float("shadowblur", self.shadow.blur));
    }

    fn tail_params(&self, params: &mut Vec<ParameterRecord>) {
        params.push(color("shadowcolor", self.shadow.color));
        params.push(float("__nondiffuse", self.non_diffuse));
        params.push(float("__nonspecular", self.non_specular));
        params.push(string("__category", &self.category));
        params.push(float("lightID", self.light_id));
    }

    fn build(&self, enc: &RibEncoder) -> Option<(String, Vec<ParameterRecord>)> {
        let frame = enc.frame();
        let shadowed = frame.shadows.enabled && self.shadow.using_shadow;
        let naming = &frame.shadows;

        if frame.pass.is_shadow() {
            return self.shadow.using_shadow.then(|| {
                let name = self.shadow_name(naming, frame.frame);
                ("liquidshadowpasslight".to_string(), vec![string("shadowname", &name)])
            });
        }

        let mut params = vec![float("intensity", self.intensity), color("lightcolor", self.color)];
        let shader = match self.light_type {
            LightType::Unknown => return None,
            LightType::Ambient => "ambientlight",
            LightType::Distant => {
                if shadowed {
                    self.shadow_params(&mut params, Some(self.shadow_name(naming, frame.frame)));
                }
                "liquiddistant"
            }
            LightType::Point => {
                params.push(float("decay", self.decay));
                if shadowed {
                    for dir in PointLightDirection::ALL {
                        let map = if self.shadow.ray_traced && dir == PointLightDirection::Px {
                            "raytrace".to_string()
                        } else {
                            self.auto_shadow_name(naming, frame.frame, Some(dir))
                        };
                        params.push(string(&format!("shadowname{}", dir.param_suffix()), &map));
                    }
                    self.shadow_params(&mut params, None);
                }
                "liquidpoint"
            }
            LightType::Spot => {
                params.push(float("coneangle", self.cone_angle));
                params.push(float("penumbraangle", self.penumbra));
                params.push(float("dropoff", self.dropoff));
                params.push(float("decay", self.decay));
                let (enabled, [left, right, top, bottom]) = self.barn_doors;
                params.push(float("barndoors", f32::from(u8::from(enabled))));
                params.push(float("leftbarndoor", left));
                params.push(float("rightbarndoor", right));
                params.push(float("topbarndoor", top));
                params.push(float("bottombarndoor", bottom));
                params.push(float("decayRegions", f32::from(u8::from(self.decay_regions.is_some()))));
                let regions = self.decay_regions.unwrap_or([DecayRegion {
                    start: 0.0,
                    end: 0.0,
                    start_intensity: 1.0,
                    end_intensity: 1.0,
                }; 3]);
                for (i, r) in regions.iter().enumerate() {
                    params.push(float(&format!("startDistance{}", i + 1), r.start));
                    params.push(float(&format!("endDistance{}", i + 1), r.end));
                }
                for (i, r) in regions.iter().enumerate() {
                    params.push(float(&format!("startDistanceIntensity{}", i + 1), r.start_intensity));
                    params.push(float(&format!("endDistanceIntensity{}", i + 1), r.end_intensity));
                }
                if shadowed {
                    self.shadow_params(&mut params, Some(self.shadow_name(naming, frame.frame)));
                }
                "liquidspot"
            }
            LightType::Area => {
                params.push(float("decay", self.decay));
                params.push(string("coordsys", &format!("{}CoordSys", self.light_name)));
                params.push(float("lightsamples", self.shadow.samples));
                params.push(float("doublesided", f32::from(u8::from(self.both_sides))));
                let map = if shadowed { self.shadow_name(naming, frame.frame) } else { String::new() };
                params.push(string("shadowname", &map));
                params.push(color("shadowcolor", self.shadow.color));
                params.push(string("lightmap", &self.light_map));
                params.push(float("lightmapsaturation", self.light_map_saturation));
                params.push(float("lightID", self.light_id));
                let hitmode = match self.hitmode {
                    1 => "primitive",
                    2 => "shader",
                    _ => "default",
                };
                params.push(string("hitmode", hitmode));
                params.push(string("__category", &self.category));
                params.extend(self.extra.iter().cloned());
                return Some(("liquidarea".to_string(), params));
            }
            LightType::Rman => {
                let shader = self.rman_shader.clone()?;
                let mut params = self.extra.clone();
                if shadowed {
                    params.push(string("shadowname", &self.shadow_name(naming, frame.frame)));
                }
                return Some((shader, params));
            }
        };
        if self.light_type != LightType::Ambient {
            self.tail_params(&mut params);
        }
        params.extend(self.extra.iter().cloned());
        Some((shader.to_string(), params))
    }
}

impl RibPrimitive for LightData {
    fn object_type(&self) -> ObjectType {
        ObjectType::Light
    }

    fn granularity(&self) -> u32 {
        u32::from(!self.exclude_from_rib)
    }

    fn write_grain(&mut self, _grain: u32, enc: &mut RibEncoder) -> Result<()> {
        enc.concat_transform(&self.transform)?;
        self.write_renderer_attributes(enc)?;
        let Some((shader, params)) = self.build(enc) else {
            debug!(light = %self.light_name, "no light source for this pass");
            return Ok(());
        };
        self.handle = Some(enc.light_source(&shader, &params)?);
        Ok(())
    }

    /// Lights are never considered animated.
    fn compare(&self, _other: &RibData) -> bool {
        true
    }
}

/// DAG path characters that are invalid in file names.
fn sanitize(name: &str) -> String {
    name.replace(['|', ':'], "_")
}

fn float(name: &str, v: f32) -> ParameterRecord {
    let mut rec = ParameterRecord::scalar(name, ParameterType::Float);
    rec.set_token_float(0, v);
    rec
}

fn color(name: &str, v: Vec3) -> ParameterRecord {
    let mut rec = ParameterRecord::scalar(name, ParameterType::Color);
    rec.set_token_vec3(0, v);
    rec
}

fn string(name: &str, v: &str) -> ParameterRecord {
    let mut rec = ParameterRecord::scalar(name, ParameterType::String);
    rec.set_token_string(0, v);
    rec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AttributeMap, RenderPass, RenderSettings};
    use crate::rib::{DeclarationMode, EncoderConfig};

    fn render(light: &mut LightData, settings: &RenderSettings) -> Result<String> {
        let config = EncoderConfig::ascii().with_declarations(DeclarationMode::Inline);
        let mut enc = RibEncoder::in_memory(config);
        enc.set_frame(settings.frame_info());
        light.write_grain(0, &mut enc)?;
        Ok(String::from_utf8(enc.into_bytes()?).expect("utf8"))
    }

    fn spot() -> AttributeMap {
        AttributeMap::new()
            .with("lightType", "spot")
            .with("intensity", 2.0f32)
            .with("useDepthMapShadows", true)
    }

    #[test]
    fn test_ambient() -> Result<()> {
        let mut light = LightData::from_attributes("|amb|ambShape", &AttributeMap::new().with("lightType", "ambient"))?;
        let out = render(&mut light, &RenderSettings::default())?;
        assert!(out.starts_with("ConcatTransform [1 0 0 0 0 1 0 0 0 0 -1 0 0 0 0 1]\n"));
        assert!(out.contains("LightSource \"ambientlight\" 1 \"intensity\" [1] \"lightcolor\" [1 1 1]\n"));
        assert_eq!(light.handle().map(LightHandle::id), Some(1));
        Ok(())
    }

    #[test]
    fn test_auto_shadow_name() -> Result<()> {
        let light = LightData::from_attributes("|key|spot:Shape", &spot())?;
        let naming = ShadowNaming { frame_padding: 4, ..ShadowNaming::default() };
        assert_eq!(light.auto_shadow_name(&naming, 7, None), "rmantex/untitled_spot_Shape_SHD.0007.tex");
        assert_eq!(
            light.auto_shadow_name(&ShadowNaming { shape_only: true, ..naming.clone() }, 7, Some(PointLightDirection::Nz)),
            "rmantex/spot_Shape_SHD_NZ.0007.tex"
        );
        Ok(())
    }

    #[test]
    fn test_shadow_name_overrides() -> Result<()> {
        let attrs = spot()
            .with("deepShadows", true)
            .with("everyFrame", false)
            .with("renderAtFrame", 12)
            .with("geometrySet", "hero");
        let light = LightData::from_attributes("|spotShape", &attrs)?;
        assert_eq!(
            light.auto_shadow_name(&ShadowNaming::default(), 3, None),
            "rmantex/untitled_spotShape_DSH.hero.12.tex"
        );
        let named = LightData::from_attributes("|spotShape", &spot().with("liquidShadowName", "maps/key.tex"))?;
        assert_eq!(named.auto_shadow_name(&ShadowNaming::default(), 3, None), "maps/key.tex");
        let auto = LightData::from_attributes("|spotShape", &spot().with("liquidShadowName", "autoshadow"))?;
        assert_eq!(auto.auto_shadow_name(&ShadowNaming::default(), 3, None), "rmantex/untitled_spotShape_SHD.3.tex");
        Ok(())
    }

    #[test]
    fn test_spot_with_shadows() -> Result<()> {
        let mut light = LightData::from_attributes("|spotShape", &spot())?;
        let out = render(&mut light, &RenderSettings::default())?;
        assert!(out.contains("LightSource \"liquidspot\" 1"));
        assert!(out.contains("\"string shadowname\" [\"rmantex/untitled_spotShape_SHD.1.tex\"]"));
        assert!(out.contains("\"float shadowfiltersize\" [1]"));
        Ok(())
    }

    #[test]
    fn test_shadows_disabled_globally() -> Result<()> {
        let mut settings = RenderSettings::default();
        settings.shadows.enabled = false;
        let mut light = LightData::from_attributes("|spotShape", &spot())?;
        let out = render(&mut light, &settings)?;
        assert!(!out.contains("shadowname"));
        Ok(())
    }

    #[test]
    fn test_point_light_cube_maps() -> Result<()> {
        let attrs = AttributeMap::new().with("lightType", "point").with("useDepthMapShadows", true);
        let mut light = LightData::from_attributes("|bulb", &attrs)?;
        let out = render(&mut light, &RenderSettings::default())?;
        for dir in PointLightDirection::ALL {
            assert!(out.contains(&format!("shadowname{}\" [\"rmantex/untitled_bulb_SHD{}.1.tex\"]", dir.param_suffix(), dir.suffix())));
        }
        Ok(())
    }

    #[test]
    fn test_shadow_pass() -> Result<()> {
        let settings = RenderSettings { pass: RenderPass::Shadow, ..RenderSettings::default() };
        let mut light = LightData::from_attributes("|spotShape", &spot())?;
        let out = render(&mut light, &settings)?;
        assert!(out.contains("LightSource \"liquidshadowpasslight\" 1 \"string shadowname\""));

        let mut unshadowed = LightData::from_attributes("|fill", &AttributeMap::new().with("lightType", "spot"))?;
        let out = render(&mut unshadowed, &settings)?;
        assert!(!out.contains("LightSource"));
        assert!(unshadowed.handle().is_none());
        Ok(())
    }

    #[test]
    fn test_area_hitmode() -> Result<()> {
        let attrs = AttributeMap::new().with("lightType", "area").with("liqAreaHitmode", 2);
        let mut light = LightData::from_attributes("|panel", &attrs)?;
        let out = render(&mut light, &RenderSettings::default())?;
        assert!(out.contains("\"string coordsys\" [\"panelCoordSys\"]"));
        assert!(out.contains("\"string hitmode\" [\"shader\"]"));
        Ok(())
    }

    #[test]
    fn test_excluded() -> Result<()> {
        let light = LightData::from_attributes("|l", &spot().with("liquidExcludeFromRib", true))?;
        assert_eq!(light.granularity(), 0);
        Ok(())
    }
}
