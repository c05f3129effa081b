use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::articulation::{bake_articulated_table, is_mesh_articulated};
use crate::coloring::ColorMode;
use crate::frame_range::extract_frame_range;
use crate::mesh_asset::write_obj;
use crate::offsets::compute_motion_offsets_simple;
use crate::params::SmearConfig;
use crate::scene::{MeshBinding, NodeId, SceneSource};
use crate::scene_graph::MemoryScene;
use crate::session::{Outcome, SkipReason, SmearSession};
use crate::vertex_cache::{CacheFile, VertexCache, DEFAULT_BAKED_FPS};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the keyed frame range of a transform
    Range {
        /// Scene description (JSON)
        #[arg(long)]
        scene: PathBuf,

        /// Transform node name
        #[arg(long)]
        node: String,
    },

    /// Bake a mesh's trajectories and offsets into a vertex cache file
    Bake {
        #[arg(long)]
        scene: PathBuf,

        /// Mesh node name
        #[arg(long)]
        mesh: String,

        /// Output cache file
        #[arg(long)]
        out: PathBuf,

        /// Frame rate recorded in the cache
        #[arg(long, default_value_t = DEFAULT_BAKED_FPS)]
        fps: f64,
    },

    /// Write the smeared mesh at a frame as OBJ
    Deform {
        #[arg(long)]
        scene: PathBuf,

        #[arg(long)]
        mesh: String,

        /// Live frame to evaluate
        #[arg(long, value_parser = parse_frame)]
        frame: f64,

        #[arg(long)]
        out: PathBuf,

        /// Parameter file (JSON)
        #[arg(long)]
        params: Option<PathBuf>,

        /// Vertex cache for articulated meshes
        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Write motion-line geometry at a frame as OBJ
    Lines {
        #[arg(long)]
        scene: PathBuf,

        #[arg(long)]
        mesh: String,

        #[arg(long, value_parser = parse_frame)]
        frame: f64,

        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        params: Option<PathBuf>,

        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Write per-vertex colours at a frame as JSON
    Colors {
        #[arg(long)]
        scene: PathBuf,

        #[arg(long)]
        mesh: String,

        #[arg(long, value_parser = parse_frame)]
        frame: f64,

        #[arg(long)]
        out: PathBuf,

        /// offset, direction or pulse
        #[arg(long, default_value = "offset")]
        mode: String,

        #[arg(long)]
        params: Option<PathBuf>,

        #[arg(long)]
        cache: Option<PathBuf>,
    },

    /// Summarise a vertex cache file
    CacheInfo {
        #[arg(long)]
        cache: PathBuf,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Range { scene, node } => {
            let scene = load_scene(&scene)?;
            let id = find_node(&scene, &node)?;
            let range = extract_frame_range(&scene, id)?;
            println!("{} {}", range.start(), range.end());
        }
        Commands::Bake { scene, mesh, out, fps } => bake(&scene, &mesh, &out, fps)?,
        Commands::Deform { scene, mesh, frame, out, params, cache } => {
            deform(&scene, &mesh, frame, &out, params.as_deref(), cache.as_deref())?;
        }
        Commands::Lines { scene, mesh, frame, out, params, cache } => {
            lines(&scene, &mesh, frame, &out, params.as_deref(), cache.as_deref())?;
        }
        Commands::Colors { scene, mesh, frame, out, mode, params, cache } => {
            let mode = ColorMode::from_str(&mode).ok_or_else(|| anyhow!("Unknown colour mode '{}'", mode))?;
            colors(&scene, &mesh, frame, &out, mode, params.as_deref(), cache.as_deref())?;
        }
        Commands::CacheInfo { cache } => cache_info(&cache)?,
    }
    Ok(())
}

fn parse_frame(s: &str) -> std::result::Result<f64, String> {
    let frame: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if frame.is_finite() {
        Ok(frame)
    } else {
        Err(format!("frame must be a finite number, got '{s}'"))
    }
}

fn load_scene(path: &Path) -> Result<MemoryScene> {
    MemoryScene::from_json_file(path).map_err(|e| anyhow!(e))
}

fn find_node(scene: &MemoryScene, name: &str) -> Result<NodeId> {
    scene.find(name).ok_or_else(|| anyhow!("No node named '{}' in scene", name))
}

fn load_config(path: Option<&Path>) -> Result<SmearConfig> {
    match path {
        Some(path) => SmearConfig::load(path).map_err(|e| anyhow!(e)),
        None => Ok(SmearConfig::default()),
    }
}

fn open_session(config: &SmearConfig, cache: Option<&Path>) -> Result<SmearSession> {
    let session = SmearSession::new(config.cache);
    if let Some(path) = cache {
        session
            .cache()
            .try_load(path)
            .with_context(|| format!("Loading vertex cache {}", path.display()))?;
    }
    Ok(session)
}

fn report_skip(reason: SkipReason) -> Result<()> {
    match reason {
        SkipReason::Disabled => {
            println!("Disabled by parameters; nothing written.");
            Ok(())
        }
        SkipReason::Unavailable(e) => bail!("Nothing written: {}", e),
    }
}

fn bake(scene_path: &Path, mesh: &str, out: &Path, fps: f64) -> Result<()> {
    let scene = load_scene(scene_path)?;
    let mesh_id = find_node(&scene, mesh)?;
    let binding = MeshBinding::resolve(&scene, mesh_id)?;

    let baked = if is_mesh_articulated(&scene, mesh_id)? {
        bake_articulated_table(&scene, binding)
    } else {
        compute_motion_offsets_simple(&scene, binding)
    };
    let table = baked.with_context(|| format!("Baking '{}'", mesh))?;

    CacheFile::from_table(&table, fps)
        .save(out)
        .with_context(|| format!("Writing {}", out.display()))?;
    println!(
        "Baked {} frame(s) of '{}' ({} vertices) to {:?}",
        table.trajectory_frame_count(),
        mesh,
        table.vertex_count(),
        out
    );
    Ok(())
}

fn deform(
    scene_path: &Path,
    mesh: &str,
    frame: f64,
    out: &Path,
    params: Option<&Path>,
    cache: Option<&Path>,
) -> Result<()> {
    let config = load_config(params)?;
    let scene = load_scene(scene_path)?;
    let mesh_id = find_node(&scene, mesh)?;
    let session = open_session(&config, cache)?;

    let mut points = scene.object_points(mesh_id, frame)?;
    let mut deformer = session.deformer(&scene, mesh_id, config.artistic)?;
    if let Outcome::Skipped(reason) = deformer.deform(&scene, frame, &mut points)? {
        return report_skip(reason);
    }

    let (face_counts, face_connects) = scene
        .mesh(mesh_id)
        .map(|m| (m.face_counts.as_slice(), m.face_connects.as_slice()))
        .unwrap_or_default();
    std::fs::write(out, write_obj(&points, face_counts, face_connects))
        .with_context(|| format!("Writing {}", out.display()))?;
    println!("Wrote deformed '{}' at frame {} to {:?}", mesh, frame, out);
    Ok(())
}

fn lines(
    scene_path: &Path,
    mesh: &str,
    frame: f64,
    out: &Path,
    params: Option<&Path>,
    cache: Option<&Path>,
) -> Result<()> {
    let config = load_config(params)?;
    let scene = load_scene(scene_path)?;
    let mesh_id = find_node(&scene, mesh)?;
    let session = open_session(&config, cache)?;

    let mut node = session.motion_lines(&scene, mesh_id, config.motion_lines)?;
    let line_mesh = match node.compute(&scene, frame)? {
        Outcome::Applied(line_mesh) => line_mesh,
        Outcome::Skipped(reason) => return report_skip(reason),
    };
    std::fs::write(out, line_mesh.to_obj()).with_context(|| format!("Writing {}", out.display()))?;
    println!("Wrote {} motion-line face(s) to {:?}", line_mesh.face_count(), out);
    Ok(())
}

fn colors(
    scene_path: &Path,
    mesh: &str,
    frame: f64,
    out: &Path,
    mode: ColorMode,
    params: Option<&Path>,
    cache: Option<&Path>,
) -> Result<()> {
    let config = load_config(params)?;
    let scene = load_scene(scene_path)?;
    let mesh_id = find_node(&scene, mesh)?;
    let session = open_session(&config, cache)?;

    let mut node = session.colorizer(&scene, mesh_id, mode, config.artistic)?;
    let colored = match node.compute(&scene, frame)? {
        Outcome::Applied(colored) => colored,
        Outcome::Skipped(reason) => return report_skip(reason),
    };
    let json = serde_json::to_string_pretty(&colored)?;
    std::fs::write(out, json).with_context(|| format!("Writing {}", out.display()))?;
    println!("Wrote {} coloured vertices to {:?}", colored.len(), out);
    Ok(())
}

fn cache_info(path: &Path) -> Result<()> {
    let mut cache = VertexCache::new();
    cache
        .try_load(path)
        .with_context(|| format!("Loading vertex cache {}", path.display()))?;

    println!("Cache:        {:?}", path);
    println!("Vertices:     {}", cache.vertex_count());
    println!("Frames:       {}", cache.len());
    println!("Frame range:  {} - {}", cache.start_frame(), cache.end_frame());
    println!("Baked fps:    {}", cache.baked_fps());
    Ok(())
}
