//! RIB request encoder.
//!
//! [`RibEncoder`] is the per-stream context every data object writes
//! through. It owns the output [`RibStream`], the declaration table, the
//! binary request/string tables, the block-nesting stack and the handle
//! counters, and carries the current [`FrameInfo`].
//!
//! Each request is assembled in a scratch buffer and handed to the stream
//! in one write, so a failing write never leaves a half-built request
//! behind in the encoder state.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use tracing::trace;

use crate::core::FrameInfo;
use crate::token::{ParamValue, ParameterRecord};
use crate::util::{rib_matrix, DMat4, Error, Result, Vec3};

use super::binary;
use super::config::{EncoderConfig, RibFormat};
use super::declare::DeclarationTable;
use super::format::{format_float, quote};
use super::stream::{RibStream, RibTarget};

/// Renderer-side handle of a retained object definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle(u32);

impl ObjectHandle {
    /// Numeric id written in `ObjectBegin`/`ObjectInstance`.
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Renderer-side handle of a light source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightHandle(u32);

impl LightHandle {
    /// Numeric id written in `LightSource`/`Illuminate`.
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Kind of an open Begin/End block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    Frame,
    World,
    Attribute,
    Transform,
    Motion,
    Object,
}

impl Block {
    /// Lowercase name used in errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::World => "world",
            Self::Attribute => "attribute",
            Self::Transform => "transform",
            Self::Motion => "motion",
            Self::Object => "object",
        }
    }
}

/// Value of a raw `Attribute`/`Option` parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RibValue<'a> {
    Int(i32),
    Ints(&'a [i32]),
    Float(f32),
    Floats(&'a [f32]),
    String(&'a str),
}

/// One inline-declared `"type name" value` pair of an `Attribute` or `Option`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RibParam<'a> {
    pub token: &'a str,
    pub value: RibValue<'a>,
}

impl<'a> RibParam<'a> {
    pub fn int(token: &'a str, v: i32) -> Self {
        Self { token, value: RibValue::Int(v) }
    }

    pub fn float(token: &'a str, v: f32) -> Self {
        Self { token, value: RibValue::Float(v) }
    }

    pub fn floats(token: &'a str, v: &'a [f32]) -> Self {
        Self { token, value: RibValue::Floats(v) }
    }

    pub fn string(token: &'a str, v: &'a str) -> Self {
        Self { token, value: RibValue::String(v) }
    }
}

/// Arguments of a `NuPatch` request.
#[derive(Debug, Clone, Copy)]
pub struct NuPatchArgs<'a> {
    pub nu: i32,
    pub uorder: i32,
    pub uknot: &'a [f32],
    pub umin: f32,
    pub umax: f32,
    pub nv: i32,
    pub vorder: i32,
    pub vknot: &'a [f32],
    pub vmin: f32,
    pub vmax: f32,
}

/// Arguments of a `TrimCurve` request. The loop count is `ncurves.len()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimCurveArgs<'a> {
    pub ncurves: &'a [i32],
    pub order: &'a [i32],
    pub knot: &'a [f32],
    pub min: &'a [f32],
    pub max: &'a [f32],
    pub n: &'a [i32],
    pub u: &'a [f32],
    pub v: &'a [f32],
    pub w: &'a [f32],
}

/// Arguments shared by `SubdivisionMesh` and `HierarchicalSubdivisionMesh`.
#[derive(Debug, Clone, Copy)]
pub struct SubdivArgs<'a> {
    pub scheme: &'a str,
    pub nverts: &'a [i32],
    pub verts: &'a [i32],
    pub tags: &'a [&'a str],
    pub nargs: &'a [i32],
    pub intargs: &'a [i32],
    pub floatargs: &'a [f32],
    /// Only written by the hierarchical form.
    pub stringargs: &'a [&'a str],
}

/// Per-stream encoder context.
pub struct RibEncoder {
    stream: RibStream,
    config: EncoderConfig,
    declarations: DeclarationTable,
    requests: HashMap<&'static str, u8>,
    strings: HashMap<String, u16>,
    blocks: Vec<Block>,
    next_object: u32,
    next_light: u32,
    frame: FrameInfo,
    buf: Vec<u8>,
}

impl RibEncoder {
    /// Encoder over an already opened stream.
    pub fn new(stream: RibStream, config: EncoderConfig) -> Self {
        Self {
            stream,
            config,
            declarations: DeclarationTable::new(config.declarations),
            requests: HashMap::new(),
            strings: HashMap::new(),
            blocks: Vec::new(),
            next_object: 1,
            next_light: 1,
            frame: FrameInfo::default(),
            buf: Vec::with_capacity(4096),
        }
    }

    /// Encoder writing to a file.
    pub fn create(path: impl AsRef<Path>, config: EncoderConfig) -> Result<Self> {
        Ok(Self::new(RibStream::create(path, config.compression)?, config))
    }

    /// Encoder collecting bytes in memory.
    pub fn in_memory(config: EncoderConfig) -> Self {
        Self::new(RibStream::memory(config.compression), config)
    }

    /// Encoder writing to an arbitrary sink.
    pub fn from_writer(writer: Box<dyn Write + Send>, config: EncoderConfig) -> Self {
        Self::new(RibStream::new(RibTarget::Writer(writer), config.compression), config)
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn is_binary(&self) -> bool {
        self.config.format == RibFormat::Binary
    }

    /// Per-frame state.
    pub fn frame(&self) -> &FrameInfo {
        &self.frame
    }

    /// Replace the per-frame state.
    pub fn set_frame(&mut self, frame: FrameInfo) {
        self.frame = frame;
    }

    /// Uncompressed bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.stream.pos()
    }

    /// Currently open blocks, outermost first.
    pub fn open_blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Declaration currently bound to `name`.
    pub fn declaration(&self, name: &str) -> Option<&str> {
        self.declarations.lookup(name)
    }

    /// Check nesting, flush and hand back the target.
    pub fn finish(&mut self) -> Result<RibTarget> {
        if let Some(open) = self.blocks.last() {
            return Err(Error::unbalanced(
                open.name(),
                format!("{} block(s) still open at end of stream", self.blocks.len()),
            ));
        }
        self.stream.finish()
    }

    /// Finish an in-memory encoder and return its bytes.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        self.finish()?
            .into_bytes()
            .ok_or_else(|| Error::other("encoder target is not an in-memory buffer"))
    }

    // ---- Token layer ----

    fn begin_request(&mut self, name: &'static str) -> Result<()> {
        if self.stream.is_finished() {
            return Err(Error::StreamFinished);
        }
        self.buf.clear();
        if self.is_binary() {
            let next = self.requests.len();
            let code = match self.requests.get(name) {
                Some(code) => *code,
                None => {
                    let code = u8::try_from(next)
                        .map_err(|_| Error::other("binary request table overflow"))?;
                    binary::put_define_request(&mut self.buf, code, name)?;
                    self.requests.insert(name, code);
                    code
                }
            };
            binary::put_request(&mut self.buf, code)?;
        } else {
            self.buf.extend_from_slice(name.as_bytes());
        }
        Ok(())
    }

    fn end_request(&mut self) -> Result<()> {
        if !self.is_binary() {
            self.buf.push(b'\n');
        }
        let buf = std::mem::take(&mut self.buf);
        let result = self.stream.write_bytes(&buf);
        self.buf = buf;
        result
    }

    fn arg_int(&mut self, v: i32) -> Result<()> {
        if self.is_binary() {
            binary::put_int(&mut self.buf, v)?;
        } else {
            write!(self.buf, " {}", v)?;
        }
        Ok(())
    }

    fn arg_float(&mut self, v: f32) -> Result<()> {
        if self.is_binary() {
            binary::put_float(&mut self.buf, v)?;
        } else {
            let s = format_float(v, self.config.precision);
            write!(self.buf, " {}", s)?;
        }
        Ok(())
    }

    fn arg_string(&mut self, s: &str) -> Result<()> {
        if self.is_binary() {
            binary::put_string(&mut self.buf, s)?;
        } else {
            write!(self.buf, " {}", quote(s))?;
        }
        Ok(())
    }

    fn arg_floats(&mut self, values: &[f32]) -> Result<()> {
        if self.is_binary() {
            binary::put_float_array(&mut self.buf, values)?;
            return Ok(());
        }
        self.buf.extend_from_slice(b" [");
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                self.buf.push(b' ');
            }
            let s = format_float(*v, self.config.precision);
            self.buf.extend_from_slice(s.as_bytes());
        }
        self.buf.push(b']');
        Ok(())
    }

    fn arg_ints(&mut self, values: &[i32]) -> Result<()> {
        if self.is_binary() {
            binary::put_int_array(&mut self.buf, values)?;
            return Ok(());
        }
        self.buf.extend_from_slice(b" [");
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                self.buf.push(b' ');
            }
            write!(self.buf, "{}", v)?;
        }
        self.buf.push(b']');
        Ok(())
    }

    fn arg_strings<S: AsRef<str>>(&mut self, values: &[S]) -> Result<()> {
        if self.is_binary() {
            binary::put_string_array(&mut self.buf, values)?;
            return Ok(());
        }
        self.buf.extend_from_slice(b" [");
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                self.buf.push(b' ');
            }
            self.buf.extend_from_slice(quote(v.as_ref()).as_bytes());
        }
        self.buf.push(b']');
        Ok(())
    }

    /// Parameter name; binary streams define it once and reference it after.
    fn arg_token(&mut self, token: &str) -> Result<()> {
        if !self.is_binary() {
            return self.arg_string(token);
        }
        let index = match self.strings.get(token) {
            Some(index) => *index,
            None => {
                let index = u16::try_from(self.strings.len())
                    .map_err(|_| Error::other("binary string table overflow"))?;
                binary::put_define_string(&mut self.buf, index, token)?;
                self.strings.insert(token.to_string(), index);
                index
            }
        };
        binary::put_interpolate_string(&mut self.buf, index)?;
        Ok(())
    }

    fn arg_matrix(&mut self, m: &DMat4) -> Result<()> {
        self.arg_floats(&rib_matrix(m))
    }

    /// Resolve tokens for `params`, emitting any `Declare` they need first.
    fn resolve_params(&mut self, params: &[ParameterRecord]) -> Result<Vec<Option<String>>> {
        let mut tokens = Vec::with_capacity(params.len());
        for rec in params {
            if rec.name().is_empty() {
                trace!("skipping unnamed parameter record");
                tokens.push(None);
                continue;
            }
            let resolved = self.declarations.resolve(rec);
            if let Some((name, decl)) = resolved.declare {
                self.write_declare(&name, &decl)?;
            }
            tokens.push(Some(resolved.token));
        }
        Ok(tokens)
    }

    fn put_params(&mut self, params: &[ParameterRecord], tokens: &[Option<String>]) -> Result<()> {
        for (rec, token) in params.iter().zip(tokens) {
            let Some(token) = token else {
                continue;
            };
            self.arg_token(token)?;
            match rec.get_rt_pointer() {
                ParamValue::Floats(f) => self.arg_floats(f)?,
                ParamValue::Strings(s) => self.arg_strings(s)?,
            }
        }
        Ok(())
    }

    /// Request with positional arguments followed by a parameter list.
    fn request_with_params(
        &mut self,
        name: &'static str,
        params: &[ParameterRecord],
        args: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<()> {
        let tokens = self.resolve_params(params)?;
        self.begin_request(name)?;
        args(self)?;
        self.put_params(params, &tokens)?;
        self.end_request()
    }

    fn simple(&mut self, name: &'static str) -> Result<()> {
        self.begin_request(name)?;
        self.end_request()
    }

    fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    fn pop_block(&mut self, block: Block) -> Result<()> {
        match self.blocks.last() {
            Some(open) if *open == block => {
                self.blocks.pop();
                Ok(())
            }
            Some(open) => Err(Error::unbalanced(
                block.name(),
                format!("end while a {} block is open", open.name()),
            )),
            None => Err(Error::unbalanced(block.name(), "end without begin")),
        }
    }

    fn write_declare(&mut self, name: &str, decl: &str) -> Result<()> {
        self.begin_request("Declare")?;
        self.arg_string(name)?;
        self.arg_string(decl)?;
        self.end_request()
    }

    // ---- Stream-level requests ----

    /// `##RenderMan RIB` structure comment and `version 3.04`.
    pub fn header(&mut self) -> Result<()> {
        self.comment("#RenderMan RIB")?;
        self.begin_request("version")?;
        self.arg_float(3.04)?;
        self.end_request()
    }

    /// `#text` comment line.
    pub fn comment(&mut self, text: &str) -> Result<()> {
        if self.stream.is_finished() {
            return Err(Error::StreamFinished);
        }
        let line = format!("#{}\n", text.replace('\n', " "));
        self.stream.write_bytes(line.as_bytes())
    }

    /// Raw bytes copied into the stream.
    pub fn verbatim(&mut self, text: &str) -> Result<()> {
        self.stream.write_bytes(text.as_bytes())
    }

    /// Explicit `Declare`.
    pub fn declare(&mut self, name: &str, decl: &str) -> Result<()> {
        self.declarations.record(name, decl);
        self.write_declare(name, decl)
    }

    pub fn frame_begin(&mut self, frame: i64) -> Result<()> {
        self.begin_request("FrameBegin")?;
        self.arg_int(frame as i32)?;
        self.end_request()?;
        self.push_block(Block::Frame);
        Ok(())
    }

    pub fn frame_end(&mut self) -> Result<()> {
        self.pop_block(Block::Frame)?;
        self.simple("FrameEnd")
    }

    pub fn world_begin(&mut self) -> Result<()> {
        self.simple("WorldBegin")?;
        self.push_block(Block::World);
        Ok(())
    }

    pub fn world_end(&mut self) -> Result<()> {
        self.pop_block(Block::World)?;
        self.simple("WorldEnd")
    }

    pub fn attribute_begin(&mut self) -> Result<()> {
        self.simple("AttributeBegin")?;
        self.push_block(Block::Attribute);
        Ok(())
    }

    pub fn attribute_end(&mut self) -> Result<()> {
        self.pop_block(Block::Attribute)?;
        self.simple("AttributeEnd")
    }

    pub fn transform_begin(&mut self) -> Result<()> {
        self.simple("TransformBegin")?;
        self.push_block(Block::Transform);
        Ok(())
    }

    pub fn transform_end(&mut self) -> Result<()> {
        self.pop_block(Block::Transform)?;
        self.simple("TransformEnd")
    }

    /// `MotionBegin [times]`. Motion blocks do not nest.
    pub fn motion_begin(&mut self, times: &[f32]) -> Result<()> {
        if self.blocks.contains(&Block::Motion) {
            return Err(Error::unbalanced("motion", "nested MotionBegin"));
        }
        self.begin_request("MotionBegin")?;
        self.arg_floats(times)?;
        self.end_request()?;
        self.push_block(Block::Motion);
        Ok(())
    }

    pub fn motion_end(&mut self) -> Result<()> {
        self.pop_block(Block::Motion)?;
        self.simple("MotionEnd")
    }

    /// Open a retained object definition and allocate its handle.
    pub fn object_begin(&mut self) -> Result<ObjectHandle> {
        let handle = ObjectHandle(self.next_object);
        self.begin_request("ObjectBegin")?;
        self.arg_int(handle.0 as i32)?;
        self.end_request()?;
        self.next_object += 1;
        self.push_block(Block::Object);
        Ok(handle)
    }

    pub fn object_end(&mut self) -> Result<()> {
        self.pop_block(Block::Object)?;
        self.simple("ObjectEnd")
    }

    pub fn object_instance(&mut self, handle: ObjectHandle) -> Result<()> {
        self.begin_request("ObjectInstance")?;
        self.arg_int(handle.0 as i32)?;
        self.end_request()
    }

    // ---- Graphics state ----

    /// `Attribute "name" ...` with inline-declared tokens.
    pub fn attribute(&mut self, name: &str, params: &[RibParam<'_>]) -> Result<()> {
        self.begin_request("Attribute")?;
        self.arg_string(name)?;
        self.put_raw_params(params)?;
        self.end_request()
    }

    /// `Attribute "name"` with a record list (user attributes).
    pub fn attribute_records(&mut self, name: &str, params: &[ParameterRecord]) -> Result<()> {
        self.request_with_params("Attribute", params, |e| e.arg_string(name))
    }

    /// `Option "name" ...` with inline-declared tokens.
    pub fn option(&mut self, name: &str, params: &[RibParam<'_>]) -> Result<()> {
        self.begin_request("Option")?;
        self.arg_string(name)?;
        self.put_raw_params(params)?;
        self.end_request()
    }

    fn put_raw_params(&mut self, params: &[RibParam<'_>]) -> Result<()> {
        for p in params {
            self.arg_token(p.token)?;
            match p.value {
                RibValue::Int(v) => self.arg_ints(&[v])?,
                RibValue::Ints(v) => self.arg_ints(v)?,
                RibValue::Float(v) => self.arg_floats(&[v])?,
                RibValue::Floats(v) => self.arg_floats(v)?,
                RibValue::String(v) => self.arg_strings(&[v])?,
            }
        }
        Ok(())
    }

    pub fn identity(&mut self) -> Result<()> {
        self.simple("Identity")
    }

    pub fn transform(&mut self, m: &DMat4) -> Result<()> {
        self.begin_request("Transform")?;
        self.arg_matrix(m)?;
        self.end_request()
    }

    pub fn concat_transform(&mut self, m: &DMat4) -> Result<()> {
        self.begin_request("ConcatTransform")?;
        self.arg_matrix(m)?;
        self.end_request()
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) -> Result<()> {
        self.begin_request("Translate")?;
        self.arg_float(x)?;
        self.arg_float(y)?;
        self.arg_float(z)?;
        self.end_request()
    }

    pub fn rotate(&mut self, angle: f32, x: f32, y: f32, z: f32) -> Result<()> {
        self.begin_request("Rotate")?;
        self.arg_float(angle)?;
        self.arg_float(x)?;
        self.arg_float(y)?;
        self.arg_float(z)?;
        self.end_request()
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) -> Result<()> {
        self.begin_request("Scale")?;
        self.arg_float(x)?;
        self.arg_float(y)?;
        self.arg_float(z)?;
        self.end_request()
    }

    pub fn color(&mut self, c: Vec3) -> Result<()> {
        self.begin_request("Color")?;
        self.arg_floats(&c.to_array())?;
        self.end_request()
    }

    pub fn opacity(&mut self, c: Vec3) -> Result<()> {
        self.begin_request("Opacity")?;
        self.arg_floats(&c.to_array())?;
        self.end_request()
    }

    pub fn matte(&mut self, on: bool) -> Result<()> {
        self.begin_request("Matte")?;
        self.arg_int(i32::from(on))?;
        self.end_request()
    }

    pub fn sides(&mut self, sides: i32) -> Result<()> {
        self.begin_request("Sides")?;
        self.arg_int(sides)?;
        self.end_request()
    }

    pub fn reverse_orientation(&mut self) -> Result<()> {
        self.simple("ReverseOrientation")
    }

    pub fn shading_rate(&mut self, rate: f32) -> Result<()> {
        self.begin_request("ShadingRate")?;
        self.arg_float(rate)?;
        self.end_request()
    }

    /// `Basis "b-spline" 1 "b-spline" 1`.
    pub fn basis_bspline(&mut self) -> Result<()> {
        self.begin_request("Basis")?;
        self.arg_string("b-spline")?;
        self.arg_int(1)?;
        self.arg_string("b-spline")?;
        self.arg_int(1)?;
        self.end_request()
    }

    pub fn surface(&mut self, name: &str, params: &[ParameterRecord]) -> Result<()> {
        self.request_with_params("Surface", params, |e| e.arg_string(name))
    }

    /// `LightSource "shader" id ...`, allocating the light handle.
    pub fn light_source(&mut self, shader: &str, params: &[ParameterRecord]) -> Result<LightHandle> {
        let handle = LightHandle(self.next_light);
        self.request_with_params("LightSource", params, |e| {
            e.arg_string(shader)?;
            e.arg_int(handle.0 as i32)
        })?;
        self.next_light += 1;
        Ok(handle)
    }

    /// `AreaLightSource "shader" id ...`.
    pub fn area_light_source(&mut self, shader: &str, params: &[ParameterRecord]) -> Result<LightHandle> {
        let handle = LightHandle(self.next_light);
        self.request_with_params("AreaLightSource", params, |e| {
            e.arg_string(shader)?;
            e.arg_int(handle.0 as i32)
        })?;
        self.next_light += 1;
        Ok(handle)
    }

    pub fn illuminate(&mut self, light: LightHandle, on: bool) -> Result<()> {
        self.begin_request("Illuminate")?;
        self.arg_int(light.0 as i32)?;
        self.arg_int(i32::from(on))?;
        self.end_request()
    }

    pub fn coordinate_system(&mut self, name: &str) -> Result<()> {
        self.begin_request("CoordinateSystem")?;
        self.arg_string(name)?;
        self.end_request()
    }

    /// `ClippingPlane x y z nx ny nz`.
    pub fn clipping_plane(&mut self, point: Vec3, normal: Vec3) -> Result<()> {
        self.begin_request("ClippingPlane")?;
        for v in point.to_array().into_iter().chain(normal.to_array()) {
            self.arg_float(v)?;
        }
        self.end_request()
    }

    // ---- Primitives ----

    pub fn sphere(
        &mut self,
        radius: f32,
        zmin: f32,
        zmax: f32,
        theta_max: f32,
        params: &[ParameterRecord],
    ) -> Result<()> {
        self.request_with_params("Sphere", params, |e| {
            e.arg_float(radius)?;
            e.arg_float(zmin)?;
            e.arg_float(zmax)?;
            e.arg_float(theta_max)
        })
    }

    /// `Patch "bilinear" ...` and friends.
    pub fn patch(&mut self, kind: &str, params: &[ParameterRecord]) -> Result<()> {
        self.request_with_params("Patch", params, |e| e.arg_string(kind))
    }

    pub fn points(&mut self, params: &[ParameterRecord]) -> Result<()> {
        self.request_with_params("Points", params, |_| Ok(()))
    }

    /// `Curves "cubic"|"linear" [nverts] "periodic"|"nonperiodic" ...`.
    pub fn curves(
        &mut self,
        kind: &str,
        nverts: &[i32],
        wrap: &str,
        params: &[ParameterRecord],
    ) -> Result<()> {
        self.request_with_params("Curves", params, |e| {
            e.arg_string(kind)?;
            e.arg_ints(nverts)?;
            e.arg_string(wrap)
        })
    }

    pub fn points_general_polygons(
        &mut self,
        nloops: &[i32],
        nverts: &[i32],
        verts: &[i32],
        params: &[ParameterRecord],
    ) -> Result<()> {
        self.request_with_params("PointsGeneralPolygons", params, |e| {
            e.arg_ints(nloops)?;
            e.arg_ints(nverts)?;
            e.arg_ints(verts)
        })
    }

    pub fn subdivision_mesh(&mut self, args: &SubdivArgs<'_>, params: &[ParameterRecord]) -> Result<()> {
        self.request_with_params("SubdivisionMesh", params, |e| {
            e.arg_string(args.scheme)?;
            e.arg_ints(args.nverts)?;
            e.arg_ints(args.verts)?;
            e.arg_strings(args.tags)?;
            e.arg_ints(args.nargs)?;
            e.arg_ints(args.intargs)?;
            e.arg_floats(args.floatargs)
        })
    }

    pub fn hierarchical_subdivision_mesh(
        &mut self,
        args: &SubdivArgs<'_>,
        params: &[ParameterRecord],
    ) -> Result<()> {
        self.request_with_params("HierarchicalSubdivisionMesh", params, |e| {
            e.arg_string(args.scheme)?;
            e.arg_ints(args.nverts)?;
            e.arg_ints(args.verts)?;
            e.arg_strings(args.tags)?;
            e.arg_ints(args.nargs)?;
            e.arg_ints(args.intargs)?;
            e.arg_floats(args.floatargs)?;
            e.arg_strings(args.stringargs)
        })
    }

    pub fn nu_patch(&mut self, args: &NuPatchArgs<'_>, params: &[ParameterRecord]) -> Result<()> {
        self.request_with_params("NuPatch", params, |e| {
            e.arg_int(args.nu)?;
            e.arg_int(args.uorder)?;
            e.arg_floats(args.uknot)?;
            e.arg_float(args.umin)?;
            e.arg_float(args.umax)?;
            e.arg_int(args.nv)?;
            e.arg_int(args.vorder)?;
            e.arg_floats(args.vknot)?;
            e.arg_float(args.vmin)?;
            e.arg_float(args.vmax)
        })
    }

    pub fn trim_curve(&mut self, args: &TrimCurveArgs<'_>) -> Result<()> {
        self.begin_request("TrimCurve")?;
        self.arg_ints(args.ncurves)?;
        self.arg_ints(args.order)?;
        self.arg_floats(args.knot)?;
        self.arg_floats(args.min)?;
        self.arg_floats(args.max)?;
        self.arg_ints(args.n)?;
        self.arg_floats(args.u)?;
        self.arg_floats(args.v)?;
        self.arg_floats(args.w)?;
        self.end_request()
    }

    /// `Blobby nleaf [code] [floats] [strings] ...`.
    pub fn blobby(
        &mut self,
        nleaf: i32,
        code: &[i32],
        floats: &[f32],
        strings: &[String],
        params: &[ParameterRecord],
    ) -> Result<()> {
        self.request_with_params("Blobby", params, |e| {
            e.arg_int(nleaf)?;
            e.arg_ints(code)?;
            e.arg_floats(floats)?;
            e.arg_strings(strings)
        })
    }

    pub fn read_archive(&mut self, name: &str) -> Result<()> {
        self.begin_request("ReadArchive")?;
        self.arg_string(name)?;
        self.end_request()
    }

    /// `Procedural "DelayedReadArchive" ["file"] [bound]`.
    pub fn procedural_delayed_archive(&mut self, file: &str, bound: &[f32; 6]) -> Result<()> {
        self.begin_request("Procedural")?;
        self.arg_string("DelayedReadArchive")?;
        self.arg_strings(&[file])?;
        self.arg_floats(bound)?;
        self.end_request()
    }
}
