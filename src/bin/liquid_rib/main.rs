//! liquid-rib CLI - write RIB frames from JSON scene descriptions.

use std::env;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use liquid_rib::rib::{DeclarationMode, EncoderConfig, RibCompression, RibEncoder, RibFormat};
use liquid_rib::scene::{emit_frame, Registry, SceneDescription};

/// Options of the `emit` command.
#[derive(Debug, Default)]
struct EmitArgs<'a> {
    scene: &'a str,
    output: Option<&'a str>,
    config: Option<&'a str>,
    binary: bool,
    gzip: bool,
    inline: bool,
    precision: Option<u8>,
    frame: Option<i64>,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    init_logging(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let result = match filtered_args[0] {
        "emit" | "e" => parse_emit(&filtered_args[1..]).and_then(|a| cmd_emit(&a)),
        "check" | "c" => match filtered_args.get(1) {
            Some(scene) => cmd_check(scene),
            None => Err(anyhow::anyhow!("missing scene argument\nUsage: liquid-rib check <scene.json>")),
        },
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        // A scene file on its own is emitted to stdout
        other if Path::new(other).exists() => parse_emit(&filtered_args).and_then(|a| cmd_emit(&a)),
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!();
            print_help();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_help() {
    println!("liquid-rib - RenderMan RIB writer");
    println!();
    println!("USAGE:");
    println!("    liquid-rib [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    e, emit  <scene.json> [EMIT OPTIONS]   Write one frame as RIB");
    println!("    c, check <scene.json>                  Register the scene and print a summary");
    println!("    version                                Show version and build date");
    println!("    h, help                                Show this help");
    println!();
    println!("EMIT OPTIONS:");
    println!("    -o, --output <file>     Output file (default: stdout)");
    println!("    -c, --config <file>     Encoder configuration JSON");
    println!("    -b, --binary            Binary RIB");
    println!("    -z, --gzip              Gzip-compress the stream");
    println!("    --inline                Inline declarations instead of Declare");
    println!("    -p, --precision <n>     Significant digits of ASCII floats");
    println!("    -f, --frame <n>         Override the frame number");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Only show errors");
    println!();
    println!("EXAMPLES:");
    println!("    liquid-rib emit scene.json -o scene.0001.rib");
    println!("    liquid-rib emit scene.json -b -z -o scene.rib.gz");
    println!("    liquid-rib check scene.json");
    println!();
    println!("NOTES:");
    println!("    - Passing a scene file directly is equivalent to 'emit' to stdout");
    println!("    - RUST_LOG overrides the verbosity flags");
}

fn parse_emit<'a>(args: &[&'a str]) -> Result<EmitArgs<'a>> {
    let Some((&scene, rest)) = args.split_first() else {
        bail!("missing scene argument\nUsage: liquid-rib emit <scene.json> [options]");
    };
    let mut parsed = EmitArgs { scene, ..EmitArgs::default() };
    let mut it = rest.iter();
    while let Some(&arg) = it.next() {
        let mut value = |name: &str| it.next().copied().with_context(|| format!("{} needs a value", name));
        match arg {
            "-o" | "--output" => parsed.output = Some(value(arg)?),
            "-c" | "--config" => parsed.config = Some(value(arg)?),
            "-b" | "--binary" => parsed.binary = true,
            "-z" | "--gzip" => parsed.gzip = true,
            "--inline" => parsed.inline = true,
            "-p" | "--precision" => {
                parsed.precision = Some(value(arg)?.parse().context("precision must be 1..=17")?)
            }
            "-f" | "--frame" => parsed.frame = Some(value(arg)?.parse().context("frame must be an integer")?),
            other => bail!("unknown emit option '{}'", other),
        }
    }
    Ok(parsed)
}

fn encoder_config(args: &EmitArgs<'_>) -> Result<EncoderConfig> {
    let mut config = match args.config {
        Some(path) => EncoderConfig::load(path).with_context(|| format!("reading {}", path))?,
        None => EncoderConfig::ascii(),
    };
    if args.binary {
        config.format = RibFormat::Binary;
    }
    if args.gzip {
        config = config.with_compression(RibCompression::Gzip);
    }
    if args.inline {
        config = config.with_declarations(DeclarationMode::Inline);
    }
    if let Some(precision) = args.precision {
        if !(1..=17).contains(&precision) {
            bail!("precision must be 1..=17, got {}", precision);
        }
        config = config.with_precision(precision);
    }
    Ok(config)
}

fn cmd_emit(args: &EmitArgs<'_>) -> Result<()> {
    let mut scene =
        SceneDescription::load(args.scene).with_context(|| format!("loading scene {}", args.scene))?;
    if let Some(frame) = args.frame {
        scene.settings.frame = frame;
    }
    let config = encoder_config(args)?;
    debug!(?config, "encoder configuration");

    let mut registry = Registry::new();
    let report = scene.populate(&mut registry)?;

    let mut enc = match args.output {
        Some(path) => RibEncoder::create(path, config).with_context(|| format!("creating {}", path))?,
        None => RibEncoder::from_writer(Box::new(io::stdout()), config),
    };
    let stats = emit_frame(&mut registry, &scene.settings, &scene.options, &mut enc)?;
    enc.finish()?;

    info!(
        output = args.output.unwrap_or("<stdout>"),
        bytes = enc.bytes_written(),
        objects = stats.objects,
        lights = stats.lights,
        skipped = stats.skipped + report.skipped,
        "done"
    );
    Ok(())
}

fn cmd_check(path: &str) -> Result<()> {
    let scene = SceneDescription::load(path).with_context(|| format!("loading scene {}", path))?;
    let mut registry = Registry::new();
    let report = scene.populate(&mut registry)?;
    registry.update_anim(scene.settings.motion_samples());

    let summary = serde_json::json!({
        "scene": path,
        "frame": scene.settings.frame,
        "samples": scene.settings.motion_samples(),
        "populate": report,
        "registry": registry.summary(),
    });
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, &summary)?;
    writeln!(out)?;
    Ok(())
}

fn cmd_version() {
    println!(
        "liquid-rib {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("LIQUID_RIB_BUILD_DATE"),
        env!("LIQUID_RIB_BUILD_TIME")
    );
}
