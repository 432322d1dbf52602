//! dremel3d CLI - export print jobs to g3drem and watch the printer camera.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use dremel3d_lib::camera::backend::HttpBackend;
use dremel3d_lib::camera::types::CameraAddress;
use dremel3d_lib::export::job::PrintJob;
use dremel3d_lib::export::{settings_block, thumbnail, writer};
use dremel3d_lib::preview::capture::{GrabOptions, GrabSession, StateCallback};
use dremel3d_lib::settings::store::PreferencesStore;

#[derive(Parser)]
#[command(name = "dremel3d", version)]
#[command(about = "Dremel 3D printer g3drem exporter and camera preview", long_about = None)]
struct Cli {
    /// Preferences file (default: <config dir>/dremel3d/preferences.json)
    #[arg(long, global = true)]
    preferences: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a .g3drem file from a print job
    Export {
        /// Print job description (JSON)
        #[arg(short, long)]
        job: Option<PathBuf>,
        /// G-code file; replaces any G-code in the job
        #[arg(short, long)]
        gcode: Option<PathBuf>,
        /// Preview image; otherwise an image named like the output is used
        #[arg(short, long)]
        thumbnail: Option<PathBuf>,
        /// Output .g3drem file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show the header of a .g3drem file
    Inspect {
        file: PathBuf,
        /// Save the embedded thumbnail to this path
        #[arg(long)]
        extract_thumbnail: Option<PathBuf>,
        /// Save the G-code payload to this path
        #[arg(long)]
        extract_gcode: Option<PathBuf>,
    },
    /// Watch the printer's camera stream
    Camera {
        /// host or host:port; remembered for next time
        address: Option<String>,
        /// Stop after this many seconds (default: run until Ctrl-C)
        #[arg(short, long)]
        seconds: Option<u64>,
        /// Save the last frame as JPEG on exit
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Show or change preferences
    Config {
        #[arg(long)]
        camera_host: Option<String>,
        #[arg(long)]
        camera_port: Option<u16>,
        /// Require an explicit --thumbnail instead of looking for same-name images
        #[arg(long)]
        select_thumbnail: Option<bool>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dremel3d=info,dremel3d_lib=info,g3drem=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let prefs_path = cli
        .preferences
        .unwrap_or_else(dremel3d_lib::default_preferences_path);
    let prefs = Arc::new(PreferencesStore::new(prefs_path));
    let debounce = prefs.start_debounce_task(&tokio::runtime::Handle::current());

    let result = match cli.command {
        Commands::Export {
            job,
            gcode,
            thumbnail,
            output,
        } => export(&prefs, job, gcode, thumbnail, &output),
        Commands::Inspect {
            file,
            extract_thumbnail,
            extract_gcode,
        } => inspect(&file, extract_thumbnail, extract_gcode),
        Commands::Camera {
            address,
            seconds,
            snapshot,
        } => camera(&prefs, address, seconds, snapshot).await,
        Commands::Config {
            camera_host,
            camera_port,
            select_thumbnail,
        } => config(&prefs, camera_host, camera_port, select_thumbnail),
    };

    debounce.abort();
    prefs
        .flush()
        .with_context(|| format!("saving {}", prefs.path().display()))?;
    result
}

fn export(
    prefs: &PreferencesStore,
    job_path: Option<PathBuf>,
    gcode_path: Option<PathBuf>,
    thumbnail_path: Option<PathBuf>,
    output: &Path,
) -> Result<()> {
    let mut job = match &job_path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<PrintJob>(&json)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => PrintJob::default(),
    };
    if let Some(path) = &gcode_path {
        let gcode = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        job.gcode = vec![gcode];
    }

    let manual = prefs.get().select_thumbnail;
    if let Some(path) = &thumbnail_path {
        if let Some(folder) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            let folder = folder.to_path_buf();
            prefs.update(|p| p.last_thumbnail_folder = Some(folder));
        }
    } else if manual {
        tracing::warn!("manual thumbnail selection is on and no --thumbnail was given");
    }

    let bmp = thumbnail::resolve_thumbnail(thumbnail_path.as_deref(), output, !manual);
    let summary = writer::export_to_path(output, &job, Some(bmp))
        .with_context(|| format!("exporting {}", output.display()))?;

    println!(
        "Exported {} ({} bytes, G-code at offset {})",
        output.display(),
        summary.total_len(),
        summary.header_len
    );
    Ok(())
}

fn inspect(
    file: &Path,
    extract_thumbnail: Option<PathBuf>,
    extract_gcode: Option<PathBuf>,
) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let parsed =
        g3drem::parse_file(&bytes).with_context(|| format!("parsing {}", file.display()))?;
    let h = &parsed.header;

    let (right_mm, left_mm) = h.material_lengths();
    let (right_mat, left_mat) = h.material_types();
    let (right_temp, left_temp) = h.extruder_temps();
    println!("file:            {}", file.display());
    println!("thumbnail:       {} bytes at {}", h.thumbnail().len(), h.thumbnail_offset());
    println!("gcode offset:    {}", h.gcode_offset());
    println!("estimated time:  {} s", h.estimated_time());
    println!("material:        {right_mm} mm {right_mat:?} / {left_mm} mm {left_mat:?}");
    println!("flags:           {:#06x}", h.flags().bits());
    println!("layer height:    {} um", h.layer_height());
    println!("infill:          {} %", h.infill_percent());
    println!("shells:          {}", h.shell_count());
    println!("print speed:     {}", h.print_speed());
    println!("bed temperature: {}", h.bed_temperature());
    println!("extruder temps:  {right_temp} / {left_temp}");
    println!("gcode:           {} bytes", parsed.gcode.len());

    let gcode = String::from_utf8_lossy(parsed.gcode);
    match settings_block::parse(&gcode) {
        Some(profile) => println!(
            "settings block:  global + {} extruder profile(s)",
            profile.extruder_quality.len()
        ),
        None => println!("settings block:  none"),
    }

    if let Some(path) = extract_thumbnail {
        std::fs::write(&path, h.thumbnail())
            .with_context(|| format!("writing {}", path.display()))?;
        println!("thumbnail written to {}", path.display());
    }
    if let Some(path) = extract_gcode {
        std::fs::write(&path, parsed.gcode)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("gcode written to {}", path.display());
    }
    Ok(())
}

async fn camera(
    prefs: &PreferencesStore,
    address: Option<String>,
    seconds: Option<u64>,
    snapshot: Option<PathBuf>,
) -> Result<()> {
    let address = match address {
        Some(text) => {
            let address: CameraAddress = text.parse()?;
            let (host, port) = (address.host().to_string(), address.port());
            prefs.update(|p| {
                p.camera_host = Some(host);
                p.camera_port = port;
            });
            address
        }
        None => match prefs.get().camera_address() {
            Some(address) => address?,
            None => bail!("no camera host given; pass one or run `dremel3d config --camera-host`"),
        },
    };

    let on_state: StateCallback = Arc::new(|state| tracing::info!("camera {state}"));
    let options = GrabOptions {
        on_state: Some(on_state),
        ..GrabOptions::default()
    };
    let mut session = GrabSession::start(address.clone(), Arc::new(HttpBackend::new()), options)?;
    tracing::info!("watching {}", address.stream_url());

    let deadline = seconds.map(Duration::from_secs);
    watch(Duration::from_secs(1), deadline, tokio::signal::ctrl_c(), || {
        let stats = session.diagnostics();
        tracing::info!(
            "{} | {:.1} fps | {} frames, {} dropped, {} reconnects, {} failed connects",
            session.state(),
            stats.fps,
            stats.frame_count,
            stats.drop_count,
            stats.reconnect_count,
            session.reconnect_attempts(),
        );
    })
    .await;

    tokio::task::block_in_place(|| session.stop());
    println!("{}", serde_json::to_string_pretty(&session.diagnostics())?);

    if let Some(path) = snapshot {
        match session.buffer().latest() {
            Some(frame) => {
                std::fs::write(&path, &frame.jpeg)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!(
                    "snapshot {}x{} written to {}",
                    frame.width,
                    frame.height,
                    path.display()
                );
            }
            None => tracing::warn!("no frame received, no snapshot written"),
        }
    }
    Ok(())
}

/// Call `on_tick` every `period` until `deadline` has passed or `shutdown`
/// completes. `shutdown` is polled across ticks, so a signal that arrives
/// mid-tick still ends the loop.
async fn watch<F, T>(
    period: Duration,
    deadline: Option<Duration>,
    shutdown: F,
    mut on_tick: impl FnMut(),
) where
    F: std::future::Future<Output = T>,
{
    let deadline = deadline.map(|d| tokio::time::Instant::now() + d);
    let mut ticker = tokio::time::interval(period);
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                on_tick();
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }
}

fn config(
    prefs: &PreferencesStore,
    camera_host: Option<String>,
    camera_port: Option<u16>,
    select_thumbnail: Option<bool>,
) -> Result<()> {
    if let Some(host) = &camera_host {
        // validate before storing
        CameraAddress::new(host.as_str(), camera_port.unwrap_or(prefs.get().camera_port))?;
    }
    if camera_host.is_some() || camera_port.is_some() || select_thumbnail.is_some() {
        prefs.update(|p| {
            if let Some(host) = camera_host {
                p.camera_host = Some(host);
            }
            if let Some(port) = camera_port {
                p.camera_port = port;
            }
            if let Some(manual) = select_thumbnail {
                p.select_thumbnail = manual;
            }
        });
    }

    println!("{}", prefs.path().display());
    println!("{}", serde_json::to_string_pretty(&prefs.get())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn watch_stops_when_shutdown_lands_between_ticks() {
        let started = tokio::time::Instant::now();
        let mut ticks = 0;
        watch(
            Duration::from_secs(1),
            None,
            tokio::time::sleep(Duration::from_millis(2500)),
            || ticks += 1,
        )
        .await;
        assert_eq!(ticks, 3);
        assert_eq!(started.elapsed(), Duration::from_millis(2500));
    }

    #[tokio::test(start_paused = true)]
    async fn watch_stops_at_deadline() {
        let mut ticks = 0;
        watch(
            Duration::from_secs(1),
            Some(Duration::from_secs(3)),
            std::future::pending::<()>(),
            || ticks += 1,
        )
        .await;
        assert_eq!(ticks, 4);
    }
}
