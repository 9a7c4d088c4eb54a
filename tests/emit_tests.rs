//! Integration tests for writing whole frames from scene descriptions.

use std::io::Read;

use flate2::read::GzDecoder;
use liquid_rib::core::RenderPass;
use liquid_rib::rib::{EncoderConfig, RibCompression, RibEncoder};
use liquid_rib::scene::{emit_frame, Registry, SceneDescription};

use tempfile::NamedTempFile;

const DEMO: &str = include_str!("../demos/scene.json");

fn render(scene: &SceneDescription, config: EncoderConfig) -> Vec<u8> {
    let mut registry = Registry::new();
    scene.populate(&mut registry).expect("populate");
    let mut enc = RibEncoder::in_memory(config);
    emit_frame(&mut registry, &scene.settings, &scene.options, &mut enc).expect("emit");
    enc.into_bytes().expect("bytes")
}

fn render_text(scene: &SceneDescription) -> String {
    String::from_utf8(render(scene, EncoderConfig::ascii())).expect("utf8")
}

#[test]
fn test_demo_frame_structure() {
    let scene = SceneDescription::from_json_str(DEMO).expect("demo scene");
    let out = render_text(&scene);

    assert!(out.starts_with("##RenderMan RIB\nversion 3.04\nFrameBegin 12\nWorldBegin\n"));
    assert!(out.ends_with("WorldEnd\nFrameEnd\n"));
    assert_eq!(out.matches("AttributeBegin").count(), out.matches("AttributeEnd").count());
    assert_eq!(out.matches("MotionBegin").count(), out.matches("MotionEnd").count());

    // Lights and coordinate systems come before any geometry.
    let light = out.find("LightSource \"liquidspot\"").expect("spot light");
    let coord = out.find("CoordinateSystem \"refShape\"").expect("coordinate system");
    let ground = out.find("\"|ground|groundShape\"").expect("ground");
    assert!(light < coord && coord < ground);
    assert!(out.contains("# Name: |ball|ballShape"));
}

#[test]
fn test_demo_motion_blocks() {
    let scene = SceneDescription::from_json_str(DEMO).expect("demo scene");
    let out = render_text(&scene);

    // The ball moves: one transform motion block with both matrices.
    let ball = out.find("\"|ball|ballShape\"").expect("ball");
    let ball_block = &out[ball..];
    let motion = ball_block.find("MotionBegin [12 12.5]").expect("ball motion");
    let ball_end = ball_block.find("AttributeEnd").expect("ball end");
    assert!(motion < ball_end);
    assert_eq!(ball_block[..ball_end].matches("ConcatTransform").count(), 2);

    // The flag deforms: both samples of the mesh inside one motion block.
    let flag = out.find("\"|flag|flagShape\"").expect("flag");
    let flag_block = &out[flag..];
    let flag_end = flag_block.find("AttributeEnd").expect("flag end");
    let flag_block = &flag_block[..flag_end];
    assert_eq!(flag_block.matches("MotionBegin").count(), 1);
    assert_eq!(flag_block.matches("PointsGeneralPolygons").count(), 2);
    assert!(!flag_block.contains("ObjectInstance"));

    // Still geometry never gets a motion block.
    let ground = out.find("\"|ground|groundShape\"").expect("ground");
    let ground_block = &out[ground..];
    let ground_end = ground_block.find("AttributeEnd").expect("ground end");
    assert!(!ground_block[..ground_end].contains("MotionBegin"));
    assert!(ground_block[..ground_end].contains("ShadingRate 2"));
}

#[test]
fn test_demo_instances_share_handle() {
    let scene = SceneDescription::from_json_str(DEMO).expect("demo scene");
    let mut registry = Registry::new();
    scene.populate(&mut registry).expect("populate");
    assert_eq!(registry.summary().instances, 1);

    let mut enc = RibEncoder::in_memory(EncoderConfig::ascii());
    emit_frame(&mut registry, &scene.settings, &scene.options, &mut enc).expect("emit");
    let out = String::from_utf8(enc.into_bytes().expect("bytes")).expect("utf8");

    let a = out.find("\"|pebbleA|pebbleShape\"").expect("pebble A");
    let b = out.find("\"|pebbleB|pebbleShape\"").expect("pebble B");
    let define = out[a..b].find("ObjectBegin").expect("definition under A");
    let handle_line = out[a + define..].lines().next().expect("line").replace("ObjectBegin", "ObjectInstance");
    assert!(!out[b..].contains("ObjectBegin"));
    assert!(out[b..].contains(&handle_line));
}

#[test]
fn test_shadow_pass_drops_unshadowed_lights() {
    let mut scene = SceneDescription::from_json_str(DEMO).expect("demo scene");
    scene.settings.pass = RenderPass::Shadow;
    let out = render_text(&scene);

    // The key light casts no depth-map shadows, so it has no shadow-pass shader.
    assert!(!out.contains("LightSource"));
    assert!(!out.contains("Illuminate"));
    assert!(!out.contains("liquidshadowpasslight"));

    // Geometry is still there, with the attributes shadow passes keep.
    let ground = out.find("\"|ground|groundShape\"").expect("ground");
    let ground_block = &out[ground..];
    let ground_end = ground_block.find("AttributeEnd").expect("ground end");
    assert!(ground_block[..ground_end].contains("ShadingRate 2"));
    assert!(out.contains("\"|flag|flagShape\""));
}

#[test]
fn test_gzip_file_output() {
    let scene = SceneDescription::from_json_str(DEMO).expect("demo scene");
    let temp = NamedTempFile::new().expect("temp file");

    let mut registry = Registry::new();
    scene.populate(&mut registry).expect("populate");
    let config = EncoderConfig::ascii().with_compression(RibCompression::Gzip);
    let mut enc = RibEncoder::create(temp.path(), config).expect("create");
    emit_frame(&mut registry, &scene.settings, &scene.options, &mut enc).expect("emit");
    enc.finish().expect("finish");

    let compressed = std::fs::read(temp.path()).expect("read back");
    assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
    let mut text = String::new();
    GzDecoder::new(&compressed[..]).read_to_string(&mut text).expect("gunzip");
    assert_eq!(text, render_text(&scene));
}

#[test]
fn test_binary_output_differs_from_ascii() {
    let scene = SceneDescription::from_json_str(DEMO).expect("demo scene");
    let ascii = render(&scene, EncoderConfig::ascii());
    let binary = render(&scene, EncoderConfig::binary());
    assert!(!binary.is_empty());
    assert_ne!(ascii, binary);
}
