//! Particle systems.
//!
//! The render kind comes from `renderType` (0 multi-point, 1 multi-streak,
//! 2 numeric, 3 points, 4 spheres, 5 sprites, 6 streak, 7 blobby,
//! 8 cloudy, 9 tube). Per-particle host arrays:
//!
//! - `position` (required), `particleId`, `velocity`
//! - `radiusPP`, or scalar `radius`
//! - `rgbPP`, `opacityPP`, `rotationPP`
//! - `spriteNumPP`, `spriteTwistPP`, `spriteScaleXPP`, `spriteScaleYPP`
//!
//! `closeIds`, when present, restricts output to the listed particle ids.
//! Output is always sorted by particle id so samples line up.
//!
//! Points, multi-points, streaks and blobbies are one grain. Spheres,
//! sprites and cloudy particles are written one particle per grain.

use glam::Quat;
use tracing::warn;

use super::{float_record, ith_parameters, missing, topology, vec3_record, RibData, RibPrimitive};
use crate::core::{AttributeSource, ObjectType};
use crate::rib::RibEncoder;
use crate::token::{list, DetailType, ParameterList, ParameterRecord, ParameterType};
use crate::util::{equiv_points, Result, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParticleKind {
    MultiPoint,
    MultiStreak,
    Numeric,
    #[default]
    Points,
    Spheres,
    Sprites,
    Streak,
    Blobby,
    Cloudy,
    Tube,
}

impl ParticleKind {
    /// Host `renderType` code.
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::MultiPoint,
            1 => Self::MultiStreak,
            2 => Self::Numeric,
            3 => Self::Points,
            4 => Self::Spheres,
            5 => Self::Sprites,
            6 => Self::Streak,
            7 => Self::Blobby,
            8 => Self::Cloudy,
            9 => Self::Tube,
            _ => return None,
        })
    }

    fn is_multi(self) -> bool {
        matches!(self, Self::MultiPoint | Self::MultiStreak)
    }

    fn is_streak(self) -> bool {
        matches!(self, Self::MultiStreak | Self::Streak)
    }

    /// One grain per particle.
    fn per_particle(self) -> bool {
        matches!(self, Self::Spheres | Self::Sprites | Self::Cloudy)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sprite {
    num: f32,
    twist: f32,
    scale_x: f32,
    scale_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Particle {
    id: i32,
    position: Vec3,
    velocity: Vec3,
    radius: f32,
    color: Option<Vec3>,
    opacity: Option<Vec3>,
    rotation: Vec3,
    sprite: Sprite,
}

#[derive(Debug, Clone)]
struct Streaks {
    multi_count: usize,
    multi_radius: f32,
    tail_size: f32,
    tail_fade: f32,
    fps: f32,
}

#[derive(Debug, Clone, Default)]
struct BlobbyCode {
    code: Vec<i32>,
    floats: Vec<f32>,
    strings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ParticleData {
    kind: ParticleKind,
    total: usize,
    particles: Vec<Particle>,
    streaks: Streaks,
    /// Records of the single-grain primitive call.
    params: ParameterList,
    /// Per-particle records for per-particle grains.
    per_particle: ParameterList,
    blobby: BlobbyCode,
}

impl ParticleData {
    pub fn from_attributes(name: &str, attrs: &dyn AttributeSource) -> Result<Self> {
        let code = attrs.get_int("renderType").unwrap_or(3);
        let kind = ParticleKind::from_code(code)
            .ok_or_else(|| topology(name, format!("unknown particle render type {code}")))?;
        let positions = attrs.get_vec3_array("position").ok_or_else(|| missing(name, "position"))?;
        let total = positions.len();

        let per = |values: Option<Vec<f32>>, attr: &str| -> Result<Option<Vec<f32>>> {
            match values {
                Some(v) if v.len() != total => {
                    Err(topology(name, format!("{attr} has {} entries for {total} particles", v.len())))
                }
                other => Ok(other),
            }
        };
        let per3 = |attr: &str| -> Result<Option<Vec<Vec3>>> {
            match attrs.get_vec3_array(attr) {
                Some(v) if v.len() != total => {
                    Err(topology(name, format!("{attr} has {} entries for {total} particles", v.len())))
                }
                other => Ok(other),
            }
        };

        let ids: Vec<i32> = match attrs.get_int_array("particleId") {
            Some(ids) if ids.len() == total => ids,
            Some(ids) => return Err(topology(name, format!("{} ids for {total} particles", ids.len()))),
            None => (0..total as i32).collect(),
        };
        let velocity = per3("velocity")?;
        let radius_pp = per(attrs.get_float_array("radiusPP"), "radiusPP")?;
        let radius = attrs.get_float("radius").unwrap_or(1.0);
        let colors = per3("rgbPP")?;
        let opacities = per3("opacityPP")?;
        let rotations = per3("rotationPP")?;
        let sprite_num = per(attrs.get_float_array("spriteNumPP"), "spriteNumPP")?;
        let sprite_twist = per(attrs.get_float_array("spriteTwistPP"), "spriteTwistPP")?;
        let sprite_sx = per(attrs.get_float_array("spriteScaleXPP"), "spriteScaleXPP")?;
        let sprite_sy = per(attrs.get_float_array("spriteScaleYPP"), "spriteScaleYPP")?;
        let sprite_default = Sprite {
            num: attrs.get_float("spriteNum").unwrap_or(0.0),
            twist: attrs.get_float("spriteTwist").unwrap_or(0.0),
            scale_x: attrs.get_float("spriteScaleX").unwrap_or(1.0),
            scale_y: attrs.get_float("spriteScaleY").unwrap_or(1.0),
        };
        let pick = |v: &Option<Vec<f32>>, i: usize, d: f32| v.as_ref().map_or(d, |v| v[i]);

        let close: Option<Vec<i32>> = attrs.get_int_array("closeIds");
        let mut particles: Vec<Particle> = (0..total)
            .filter(|i| close.as_ref().is_none_or(|c| c.contains(&ids[*i])))
            .map(|i| Particle {
                id: ids[i],
                position: positions[i],
                velocity: velocity.as_ref().map_or(Vec3::ZERO, |v| v[i]),
                radius: pick(&radius_pp, i, radius),
                color: colors.as_ref().map(|v| v[i]),
                opacity: opacities.as_ref().map(|v| v[i]),
                rotation: rotations.as_ref().map_or(Vec3::ZERO, |v| v[i]),
                sprite: Sprite {
                    num: pick(&sprite_num, i, sprite_default.num),
                    twist: pick(&sprite_twist, i, sprite_default.twist),
                    scale_x: pick(&sprite_sx, i, sprite_default.scale_x),
                    scale_y: pick(&sprite_sy, i, sprite_default.scale_y),
                },
            })
            .collect();
        particles.sort_by_key(|p| p.id);

        let streaks = Streaks {
            multi_count: attrs.get_int("multiCount").unwrap_or(1).max(1) as usize,
            multi_radius: attrs.get_float("multiRadius").unwrap_or(0.0),
            tail_size: attrs.get_float("tailSize").unwrap_or(1.0),
            tail_fade: attrs.get_float("tailFade").unwrap_or(1.0),
            fps: attrs.get_float("fps").filter(|f| *f > 0.0).unwrap_or(24.0),
        };

        let mut data = Self {
            kind,
            total,
            particles,
            streaks,
            params: ParameterList::new(),
            per_particle: ParameterList::new(),
            blobby: BlobbyCode::default(),
        };
        if matches!(kind, ParticleKind::Numeric | ParticleKind::Tube) {
            warn!(object = name, ?kind, "particle render type not supported; nothing written");
            return Ok(data);
        }
        data.build_records(attrs);
        Ok(data)
    }

    pub fn kind(&self) -> ParticleKind {
        self.kind
    }

    /// Particles on the host, before `closeIds` filtering.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Particles actually written.
    pub fn valid(&self) -> usize {
        self.particles.len()
    }

    /// Output ids in write order.
    pub fn ids(&self) -> Vec<i32> {
        self.particles.iter().map(|p| p.id).collect()
    }

    fn build_records(&mut self, attrs: &dyn AttributeSource) {
        let copies = if self.kind.is_multi() { self.streaks.multi_count } else { 1 };
        let verts_per = if self.kind.is_streak() { 2 } else { 1 };
        let has_color = self.particles.iter().any(|p| p.color.is_some());
        let has_opacity = self.particles.iter().any(|p| p.opacity.is_some());

        let mut p = Vec::new();
        let mut cs = Vec::new();
        let mut os = Vec::new();
        let mut ids = Vec::new();
        let mut vel = Vec::new();
        let mut width = Vec::new();
        for particle in &self.particles {
            for copy in 0..copies {
                let offset = if self.kind.is_multi() {
                    jitter(particle.id, copy) * self.streaks.multi_radius
                } else {
                    Vec3::ZERO
                };
                let head = particle.position + offset;
                let color = particle.color.unwrap_or(Vec3::ONE);
                let opacity = particle.opacity.unwrap_or(Vec3::ONE);
                if self.kind.is_streak() {
                    let tail = head - particle.velocity * self.streaks.tail_size / self.streaks.fps;
                    p.extend([tail, head]);
                    os.extend([opacity * self.streaks.tail_fade, opacity]);
                } else {
                    p.push(head);
                    os.push(opacity);
                }
                for _ in 0..verts_per {
                    cs.push(color);
                    ids.push(particle.id as f32);
                    vel.push(particle.velocity);
                    width.push(particle.radius * 2.0);
                }
            }
        }

        let mut records = ParameterList::new();
        if self.kind.per_particle() {
            // One-per-particle tokens, handed out by `ith_parameters`.
            if has_color {
                records.push(vec3_record("Cs", ParameterType::Color, DetailType::Vertex, &cs));
            }
            if has_opacity {
                records.push(vec3_record("Os", ParameterType::Color, DetailType::Vertex, &os));
            }
            if self.kind == ParticleKind::Sprites {
                let nums: Vec<f32> = self.particles.iter().map(|p| p.sprite.num).collect();
                records.push(float_record("spriteNum", DetailType::Vertex, &nums));
            }
            records.extend(
                list::extra_surface_parameters(attrs, ObjectType::Particles, None)
                    .into_iter()
                    .filter(|r| !r.is_array() || r.array_size() as usize == self.particles.len()),
            );
            self.per_particle = records;
            if self.kind == ParticleKind::Cloudy {
                self.blobby = cloudy_code(attrs);
            }
            return;
        }

        if p.is_empty() {
            return;
        }
        if self.kind == ParticleKind::Blobby {
            let n = self.particles.len();
            let mut code = Vec::with_capacity(2 * n + 2 + n);
            let mut floats = Vec::with_capacity(16 * n);
            for (i, particle) in self.particles.iter().enumerate() {
                code.extend([1001, (16 * i) as i32]);
                let r = particle.radius;
                let t = particle.position;
                floats.extend([r, 0.0, 0.0, 0.0, 0.0, r, 0.0, 0.0, 0.0, 0.0, r, 0.0, t.x, t.y, t.z, 1.0]);
            }
            code.extend([0, n as i32]);
            code.extend(0..n as i32);
            self.blobby = BlobbyCode { code, floats, strings: vec![String::new()] };
        } else {
            records.push(vec3_record("P", ParameterType::Point, DetailType::Vertex, &p));
            if self.kind.is_streak() {
                let line = attrs.get_float("lineWidth").unwrap_or(1.0);
                let mut w = ParameterRecord::scalar("constantwidth", ParameterType::Float)
                    .with_detail(DetailType::Constant);
                w.set_token_float(0, line);
                records.push(w);
            } else {
                records.push(float_record("width", DetailType::Varying, &width));
            }
        }
        if has_color {
            records.push(vec3_record("Cs", ParameterType::Color, DetailType::Vertex, &cs));
        }
        if has_opacity || self.kind.is_streak() {
            records.push(vec3_record("Os", ParameterType::Color, DetailType::Varying, &os));
        }
        if self.kind != ParticleKind::Blobby {
            records.push(float_record("id", DetailType::Vertex, &ids));
            records.push(vec3_record("velocity", ParameterType::Vector, DetailType::Vertex, &vel));
        }
        records.extend(list::extra_surface_parameters(attrs, ObjectType::Particles, None));
        self.params = records;
    }

    fn write_sphere(&self, i: usize, enc: &mut RibEncoder) -> Result<()> {
        let particle = &self.particles[i];
        if let Some(c) = particle.color {
            enc.color(c)?;
        }
        if let Some(o) = particle.opacity {
            enc.opacity(o)?;
        }
        let r = particle.radius;
        let t = particle.position;
        enc.transform_begin()?;
        enc.translate(t.x, t.y, t.z)?;
        enc.sphere(r, -r, r, 360.0, &[])?;
        enc.transform_end()
    }

    fn write_sprite(&self, i: usize, enc: &mut RibEncoder) -> Result<()> {
        let particle = &self.particles[i];
        let camera_to_world = enc.frame().camera_matrix.inverse();
        let right = camera_to_world.transform_vector3(glam::DVec3::X).as_vec3().normalize_or_zero();
        let up = camera_to_world.transform_vector3(glam::DVec3::Y).as_vec3().normalize_or_zero();
        let eye = camera_to_world.transform_vector3(glam::DVec3::Z).as_vec3().normalize_or_zero();

        let twist = Quat::from_axis_angle(eye, particle.sprite.twist.to_radians());
        let sx = twist * right * (0.5 * particle.sprite.scale_x);
        let sy = twist * up * (0.5 * particle.sprite.scale_y);
        let c = particle.position;
        let corners = [c - sx + sy, c + sx + sy, c - sx - sy, c + sx - sy];

        let mut params = vec![vec3_record("P", ParameterType::Point, DetailType::Vertex, &corners)];
        params.extend(ith_parameters(&self.per_particle, i).into_iter().map(|mut r| {
            r.set_detail_type(DetailType::Constant);
            r
        }));
        enc.patch("bilinear", &params)
    }

    fn write_cloud(&self, i: usize, enc: &mut RibEncoder) -> Result<()> {
        let particle = &self.particles[i];
        let t = particle.position;
        let rot = particle.rotation * 360.0;
        let r = particle.radius;
        let params: Vec<ParameterRecord> = ith_parameters(&self.per_particle, i)
            .into_iter()
            .map(|mut r| {
                if r.detail_type() != DetailType::Constant {
                    r.set_detail_type(DetailType::Vertex);
                }
                r
            })
            .collect();
        enc.transform_begin()?;
        enc.translate(t.x, t.y, t.z)?;
        enc.rotate(rot.x, 1.0, 0.0, 0.0)?;
        enc.rotate(rot.y, 0.0, 1.0, 0.0)?;
        enc.rotate(rot.z, 0.0, 0.0, 1.0)?;
        enc.scale(r, r, r)?;
        enc.blobby(1, &self.blobby.code, &self.blobby.floats, &self.blobby.strings, &params)?;
        enc.transform_end()
    }
}

impl RibPrimitive for ParticleData {
    fn object_type(&self) -> ObjectType {
        ObjectType::Particles
    }

    fn granularity(&self) -> u32 {
        match self.kind {
            ParticleKind::Numeric | ParticleKind::Tube => 0,
            _ if self.particles.is_empty() => 0,
            kind if kind.per_particle() => self.particles.len() as u32,
            _ => 1,
        }
    }

    fn write_grain(&mut self, grain: u32, enc: &mut RibEncoder) -> Result<()> {
        let i = grain as usize;
        match self.kind {
            ParticleKind::Spheres => self.write_sphere(i, enc),
            ParticleKind::Sprites => self.write_sprite(i, enc),
            ParticleKind::Cloudy => self.write_cloud(i, enc),
            ParticleKind::Blobby => enc.blobby(
                self.particles.len() as i32,
                &self.blobby.code,
                &self.blobby.floats,
                &self.blobby.strings,
                &self.params,
            ),
            ParticleKind::Points | ParticleKind::MultiPoint => enc.points(&self.params),
            ParticleKind::Streak | ParticleKind::MultiStreak => {
                let copies = if self.kind.is_multi() { self.streaks.multi_count } else { 1 };
                let nverts = vec![2; self.particles.len() * copies];
                enc.curves("linear", &nverts, "nonperiodic", &self.params)
            }
            ParticleKind::Numeric | ParticleKind::Tube => Ok(()),
        }
    }

    /// Sphere and cloud grains carry their own transform requests, which
    /// cannot sit inside a motion block.
    fn is_grain_animated(&self, _grain: u32) -> bool {
        !matches!(self.kind, ParticleKind::Spheres | ParticleKind::Cloudy)
    }

    fn compare(&self, other: &RibData) -> bool {
        let RibData::Particles(other) = other else {
            return false;
        };
        let a: Vec<Vec3> = self.particles.iter().map(|p| p.position).collect();
        let b: Vec<Vec3> = other.particles.iter().map(|p| p.position).collect();
        self.total == other.total && self.ids() == other.ids() && equiv_points(&a, &b)
    }

    fn parameters(&self) -> &[ParameterRecord] {
        &self.params
    }
}

/// Deterministic offset in the unit cube for copy `copy` of particle `id`.
fn jitter(id: i32, copy: usize) -> Vec3 {
    let mut state = (id as u32).wrapping_mul(2_654_435_761).wrapping_add(copy as u32 * 40_503) | 1;
    let mut next = || {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        ((state >> 8) & 0xffff) as f32 / 65_535.0 * 2.0 - 1.0
    };
    Vec3::new(next(), next(), next())
}

/// Blobby program for one cloudy particle. Defaults to a unit ellipsoid.
fn cloudy_code(attrs: &dyn AttributeSource) -> BlobbyCode {
    match (attrs.get_int_array("liqCloudyCodes"), attrs.get_float_array("liqCloudyFloats")) {
        (Some(code), Some(floats)) if !code.is_empty() => BlobbyCode {
            code,
            floats,
            strings: attrs.get_string_array("liqCloudyStrings").unwrap_or_else(|| vec![String::new()]),
        },
        _ => BlobbyCode {
            code: vec![1001, 0],
            floats: glam::Mat4::IDENTITY.to_cols_array().to_vec(),
            strings: vec![String::new()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttributeMap;
    use crate::rib::EncoderConfig;

    fn cloud(kind: i32) -> AttributeMap {
        AttributeMap::new()
            .with("renderType", kind)
            .with("position", vec![Vec3::ZERO, Vec3::X, Vec3::Y])
            .with("particleId", vec![5, 1, 3])
            .with("radiusPP", vec![0.5f32, 1.0, 2.0])
    }

    fn render(data: &mut ParticleData) -> Result<String> {
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        for g in 0..data.granularity() {
            data.write_grain(g, &mut enc)?;
        }
        Ok(String::from_utf8(enc.into_bytes()?).expect("utf8"))
    }

    #[test]
    fn test_sorted_by_id() -> Result<()> {
        let data = ParticleData::from_attributes("|pts", &cloud(3))?;
        assert_eq!(data.ids(), vec![1, 3, 5]);
        Ok(())
    }

    #[test]
    fn test_close_ids_filter() -> Result<()> {
        let data = ParticleData::from_attributes("|pts", &cloud(3).with("closeIds", vec![3, 5, 42]))?;
        assert_eq!(data.valid(), 2);
        assert_eq!(data.total(), 3);
        assert!(data.valid() <= data.total());
        Ok(())
    }

    #[test]
    fn test_points() -> Result<()> {
        let mut data = ParticleData::from_attributes("|pts", &cloud(3))?;
        assert_eq!(data.granularity(), 1);
        let out = render(&mut data)?;
        assert!(out.contains("Points \"P\" [1 0 0 0 1 0 0 0 0]"));
        assert!(out.contains("\"width\" [2 4 1]"));
        Ok(())
    }

    #[test]
    fn test_spheres_one_grain_each() -> Result<()> {
        let mut data = ParticleData::from_attributes("|pts", &cloud(4))?;
        assert_eq!(data.granularity(), 3);
        let out = render(&mut data)?;
        assert_eq!(out.matches("TransformBegin").count(), 3);
        assert!(out.contains("Sphere 0.5 -0.5 0.5 360"));
        assert!(!data.is_grain_animated(0));
        Ok(())
    }

    #[test]
    fn test_points_grain_animated() -> Result<()> {
        let data = ParticleData::from_attributes("|pts", &cloud(3))?;
        assert!(data.is_grain_animated(0));
        Ok(())
    }

    #[test]
    fn test_streak_tail() -> Result<()> {
        let attrs = cloud(6)
            .with("velocity", vec![Vec3::new(24.0, 0.0, 0.0); 3])
            .with("tailFade", 0.5f32);
        let mut data = ParticleData::from_attributes("|pts", &attrs)?;
        let out = render(&mut data)?;
        assert!(out.contains("Curves \"linear\" [2 2 2] \"nonperiodic\""));
        let p = list::find(data.parameters(), "P").expect("P");
        assert_eq!(&p.floats().expect("floats")[..6], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let os = list::find(data.parameters(), "Os").expect("Os");
        assert_eq!(&os.floats().expect("floats")[..6], &[0.5, 0.5, 0.5, 1.0, 1.0, 1.0]);
        Ok(())
    }

    #[test]
    fn test_multi_point_jitter_is_stable() -> Result<()> {
        let attrs = cloud(0).with("multiCount", 4).with("multiRadius", 0.1f32);
        let a = ParticleData::from_attributes("|pts", &attrs)?;
        let b = ParticleData::from_attributes("|pts", &attrs)?;
        let pa = list::find(a.parameters(), "P").expect("P");
        assert_eq!(pa.array_size(), 12);
        assert_eq!(pa.floats(), list::find(b.parameters(), "P").and_then(|r| r.floats()));
        Ok(())
    }

    #[test]
    fn test_blobby_code() -> Result<()> {
        let mut data = ParticleData::from_attributes("|pts", &cloud(7))?;
        let out = render(&mut data)?;
        assert!(out.contains("Blobby 3 [1001 0 1001 16 1001 32 0 3 0 1 2]"));
        Ok(())
    }

    #[test]
    fn test_sprite_faces_camera() -> Result<()> {
        let mut data = ParticleData::from_attributes("|pts", &cloud(5).with("spriteNumPP", vec![1.0f32, 2.0, 3.0]))?;
        let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
        data.write_grain(0, &mut enc)?;
        let out = String::from_utf8(enc.into_bytes()?).expect("utf8");
        assert!(out.contains("Patch \"bilinear\" \"P\" [0.5 0.5 0 1.5 0.5 0 0.5 -0.5 0 1.5 -0.5 0]"));
        assert!(out.contains("[2]"));
        Ok(())
    }

    #[test]
    fn test_unsupported_kinds() -> Result<()> {
        assert_eq!(ParticleData::from_attributes("|pts", &cloud(2))?.granularity(), 0);
        assert!(ParticleData::from_attributes("|pts", &cloud(12)).is_err());
        Ok(())
    }

    #[test]
    fn test_compare() -> Result<()> {
        let a = ParticleData::from_attributes("|pts", &cloud(3))?;
        let b = ParticleData::from_attributes("|pts", &cloud(3))?;
        assert!(a.compare(&RibData::Particles(b)));
        let moved = cloud(3).with("position", vec![Vec3::ZERO, Vec3::X, Vec3::Z]);
        let c = ParticleData::from_attributes("|pts", &moved)?;
        assert!(!a.compare(&RibData::Particles(c)));
        Ok(())
    }
}
