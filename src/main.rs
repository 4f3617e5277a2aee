//! Headless world walk.
//!
//! Streams the world around a viewpoint moving along +X, harvests the nearest
//! resource now and then, and saves the harvested set on exit.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use log::info;

use pixelworld::core::logging;
use pixelworld::core::types::{Mat4, Vec3};
use pixelworld::math::Frustum;
use pixelworld::world::{World, WorldConfig};

const DEFAULT_FRAMES: u64 = 600;
const DEFAULT_SPEED: f32 = 0.5;
/// Frames between harvests
const HARVEST_INTERVAL: u64 = 60;
const HARVEST_REACH: f32 = 24.0;
const HARVEST_GROUPS: [&str; 2] = ["rock", "tree"];
const FRAME_TIME: Duration = Duration::from_millis(4);

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
    frames: u64,
    speed: f32,
    ledger: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);

    let mut config = None;
    let mut frames = DEFAULT_FRAMES;
    let mut speed = DEFAULT_SPEED;
    let mut ledger = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                config = Some(PathBuf::from(args.next().ok_or("--config needs a path")?));
            }
            "-f" | "--frames" => {
                let v = args.next().ok_or("--frames needs a value")?;
                frames = v.parse().map_err(|_| format!("invalid frame count '{}'", v))?;
            }
            "-s" | "--speed" => {
                let v = args.next().ok_or("--speed needs a value")?;
                speed = v.parse().map_err(|_| format!("invalid speed '{}'", v))?;
            }
            "-l" | "--ledger" => {
                ledger = Some(PathBuf::from(args.next().ok_or("--ledger needs a path")?));
            }
            "-h" | "--help" | "help" => {
                return Err("show_help".to_string());
            }
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }

    Ok(Args { config, frames, speed, ledger })
}

fn print_help() {
    println!("Pixel World Walk");
    println!("================");
    println!();
    println!("Usage: pixelworld [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>   World config JSON (default: built-in world)");
    println!("  -f, --frames <N>      Frames to simulate (default: {})", DEFAULT_FRAMES);
    println!("  -s, --speed <UNITS>   World units moved per frame (default: {})", DEFAULT_SPEED);
    println!("  -l, --ledger <FILE>   Harvested resources file (overrides config)");
}

/// Camera above and behind `viewpoint`, looking along +X
fn frustum_at(viewpoint: Vec3) -> Frustum {
    let eye = viewpoint + Vec3::new(-12.0, 20.0, 0.0);
    let view = Mat4::look_at_rh(eye, viewpoint + Vec3::X * 16.0, Vec3::Y);
    let proj = Mat4::perspective_rh(70f32.to_radians(), 16.0 / 9.0, 0.1, 400.0);
    Frustum::from_view_projection(&(proj * view))
}

fn main() {
    logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            if e != "show_help" {
                eprintln!("Error: {}", e);
                eprintln!();
            }
            print_help();
            return;
        }
    };

    let mut config = match &args.config {
        Some(path) => WorldConfig::load_or_default(path),
        None => WorldConfig::default(),
    };
    if args.ledger.is_some() {
        config.ledger_path = args.ledger.clone();
    }

    let mut world = match World::headless(config) {
        Ok(world) => world,
        Err(e) => {
            eprintln!("Failed to create world: {}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let mut viewpoint = Vec3::ZERO;
    let mut harvested = 0;

    for frame in 1..=args.frames {
        viewpoint.x += args.speed;
        let frustum = frustum_at(viewpoint);
        world.update(viewpoint, Some(&frustum));

        if frame % HARVEST_INTERVAL == 0 {
            for group in HARVEST_GROUPS {
                if let Some(id) = world.harvest_nearest(viewpoint, group, HARVEST_REACH) {
                    info!("Frame {}: harvested {}", frame, id);
                    harvested += 1;
                }
            }
        }

        std::thread::sleep(FRAME_TIME);
    }

    let nav = world.navigation_stats();
    let stats = world.placer().stats();
    info!(
        "Walked {:.1} units in {} frames ({:.2}s)",
        viewpoint.x,
        args.frames,
        start.elapsed().as_secs_f64()
    );
    info!(
        "{} chunks loaded, {} with props, {} render objects ({} visible)",
        world.lifecycle().loaded_chunk_count(),
        nav.loaded_prop_chunks,
        world.renderer().object_count(),
        world.renderer().visible_count()
    );
    info!(
        "Props: {} spawned, {} suppressed, {} rejected by collision; {} harvested this run, {} total",
        stats.spawned,
        stats.suppressed,
        stats.collision_rejected,
        harvested,
        world.ledger().harvested_count()
    );
    info!("Navigation: {} obstacles in {} chunks", nav.total_nav_props, nav.nav_chunks);

    if let Err(e) = world.save() {
        eprintln!("Failed to save harvested resources: {}", e);
        std::process::exit(1);
    }
}
