mod audio;
mod viewer;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use timeline_tunnel_core::{
    audio::dominant_frequency, render::probe_adapter, AppConfig, AudioConfig, DeviceProbe,
    EventCategory, EventSnapshot, HeadlessCompiler, QualityController, QualityTier, Scene,
    ToneSpec, ToneSynth,
};
use tracing_subscriber::EnvFilter;

fn main() -> timeline_tunnel_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::View {
            events,
            config,
            quality,
            simulate_orientation,
        } => run_view(&events, config.as_deref(), quality, simulate_orientation),
        Commands::Plan {
            events,
            config,
            quality,
        } => run_plan(&events, config.as_deref(), quality),
        Commands::Tones => run_tones(),
        Commands::Probe { config } => run_probe(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> timeline_tunnel_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::from_path(path)
        }
        None => Ok(AppConfig::default()),
    }
}

fn run_view(
    events: &Path,
    config: Option<&Path>,
    quality: Option<QualityTier>,
    simulate_orientation: bool,
) -> timeline_tunnel_core::Result<()> {
    let config = load_config(config)?;
    let snapshot = EventSnapshot::from_path(events)?;
    tracing::info!(?events, count = snapshot.len(), simulate_orientation, "starting viewer");

    viewer::run(viewer::ViewerOptions {
        snapshot,
        config,
        quality,
        simulate_orientation,
    })
}

/// Composes the scene without a GPU and prints the layout as JSON.
fn run_plan(
    events: &Path,
    config: Option<&Path>,
    quality: Option<QualityTier>,
) -> timeline_tunnel_core::Result<()> {
    let config = load_config(config)?;
    let snapshot = EventSnapshot::from_path(events)?;
    let tier = quality
        .or(config.quality.force_tier)
        .unwrap_or(QualityTier::Medium);
    let profile = tier.profile();

    let scene = Scene::mount(&snapshot, &profile, &config.scene, &mut HeadlessCompiler);
    let report = serde_json::json!({
        "profile": profile,
        "particles_per_emitter": profile.particle_count(config.scene.base_particle_count),
        "emitters": scene.active_emitter_count(),
        "layout": scene.layout(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    scene.unmount();
    Ok(())
}

/// Synthesises every category tone and reports its measured pitch.
fn run_tones() -> timeline_tunnel_core::Result<()> {
    let audio = AudioConfig::default();
    let sample_rate = audio.sample_rate;
    let synth = ToneSynth::muted(audio);

    for category in EventCategory::ALL {
        let spec = ToneSpec::for_category(category);
        let tone = synth.render(category.as_str(), &spec);
        let measured = dominant_frequency(&tone.samples, sample_rate)?;
        println!(
            "{:<15} base {:>7.2} Hz  measured {:>7.2} Hz  {:>5.2} s  peak {:.3}",
            category.as_str(),
            spec.base_frequency,
            measured,
            tone.duration_seconds(),
            tone.peak(),
        );
    }
    Ok(())
}

/// Classifies the local adapter the way the viewer would.
fn run_probe(config: Option<&Path>) -> timeline_tunnel_core::Result<()> {
    let config = load_config(config)?;
    let info = probe_adapter()?;
    let probe = DeviceProbe::from_adapter_info(&info, 1.0, None);
    let profile = QualityController::new(config.quality).classify(&probe);

    let report = serde_json::json!({
        "adapter": info.name,
        "backend": format!("{:?}", info.backend),
        "device_type": format!("{:?}", info.device_type),
        "probe": probe,
        "profile": profile,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Fly through a tunnel of historical events", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open the interactive tunnel viewer.
    View {
        /// JSON file holding the event snapshot.
        #[arg(short, long)]
        events: PathBuf,
        /// Optional JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Skip capability detection and use this tier.
        #[arg(short, long)]
        quality: Option<QualityTier>,
        /// Drive the camera from the mouse as if it were an orientation sensor.
        #[arg(long)]
        simulate_orientation: bool,
    },
    /// Compose the scene without a GPU and print it as JSON.
    Plan {
        #[arg(short, long)]
        events: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        quality: Option<QualityTier>,
    },
    /// Render each category tone and print its dominant frequency.
    Tones,
    /// Classify the local GPU adapter into a quality tier.
    Probe {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
