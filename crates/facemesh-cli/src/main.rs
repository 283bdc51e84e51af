use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use facemesh_core::{
    ExpressionClassifier, ExpressionFeatures, ExpressionThresholds, GeometricClassifier, Mesh,
};
use facemesh_hw::Camera;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "facemesh", about = "Face mesh tracking and expression CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the expression of a mesh stored as JSON
    Classify {
        /// Landmark array, or an object with `mesh` / `keypoints`
        path: PathBuf,
        /// Print the measurements alongside the label
        #[arg(short, long)]
        verbose: bool,
        /// TOML file with an `[expression]` table, as used by facemeshd
        #[arg(short, long, env = "FACEMESH_THRESHOLDS_FILE")]
        thresholds: Option<PathBuf>,
    },
    /// Capture the face currently in view (daemon)
    Capture,
    /// Show the expression of the captured face (daemon)
    Expression,
    /// Save the current overlay canvas as PNG (daemon)
    Snapshot {
        /// Output file; relative paths are resolved against the current directory
        output: PathBuf,
    },
    /// Show daemon status
    Status,
    /// List video capture devices
    Devices,
    /// Grab one frame straight from the camera and save it as PNG
    Test {
        #[arg(short, long, default_value = "/dev/video0")]
        device: String,
        #[arg(short, long, default_value = "facemesh-test.png")]
        output: PathBuf,
    },
}

#[zbus::proxy(
    interface = "io.facemesh.Tracker1",
    default_service = "io.facemesh.Tracker1",
    default_path = "/io/facemesh/Tracker1"
)]
trait Tracker {
    fn capture(&self) -> zbus::Result<bool>;
    fn expression(&self) -> zbus::Result<String>;
    fn status(&self) -> zbus::Result<String>;
    fn snapshot(&self, path: &str) -> zbus::Result<bool>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Classify {
            path,
            verbose,
            thresholds,
        } => classify_file(&path, verbose, thresholds.as_deref())?,
        Commands::Capture => {
            let proxy = tracker().await?;
            if proxy.capture().await? {
                println!("Captured face mesh");
            } else {
                println!("No face detected; previous capture kept");
            }
        }
        Commands::Expression => {
            let proxy = tracker().await?;
            let report: serde_json::Value = serde_json::from_str(&proxy.expression().await?)?;
            match report.get("label").and_then(|l| l.as_str()) {
                Some(label) => println!("Expression: {label}"),
                None => println!("No face captured yet; run `facemesh capture` first"),
            }
        }
        Commands::Snapshot { output } => {
            // The daemon resolves paths against its own working directory.
            let output = if output.is_absolute() {
                output
            } else {
                std::env::current_dir()?.join(output)
            };
            let proxy = tracker().await?;
            proxy.snapshot(&output.to_string_lossy()).await?;
            println!("Snapshot written to {}", output.display());
        }
        Commands::Status => {
            let proxy = tracker().await?;
            let status: serde_json::Value = serde_json::from_str(&proxy.status().await?)?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for d in devices {
                println!("{}\t{}\t{} ({})", d.path, d.name, d.driver, d.bus);
            }
        }
        Commands::Test { device, output } => {
            println!("Running camera diagnostics on {device}...");
            let camera = Camera::open(&device)?;
            let frame = camera.capture_frame()?;
            println!(
                "Captured {}x{} frame #{} ({:?}), mean brightness {:.1}",
                frame.width,
                frame.height,
                frame.sequence,
                camera.pixel_format(),
                frame.avg_brightness()
            );
            let Some(img) = image::RgbImage::from_raw(frame.width, frame.height, frame.data) else {
                bail!("camera returned a truncated frame");
            };
            img.save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Frame written to {}", output.display());
        }
    }

    Ok(())
}


async fn tracker() -> Result<TrackerProxy<'static>> {
    let connection = zbus::Connection::session()
        .await
        .context("connecting to the session bus")?;
    TrackerProxy::new(&connection)
        .await
        .context("facemeshd is not reachable (is the daemon running?)")
}

fn load_thresholds(path: Option<&Path>) -> Result<ExpressionThresholds> {
    let Some(path) = path else {
        return Ok(ExpressionThresholds::default());
    };
    let src = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    ExpressionThresholds::from_toml(&src).with_context(|| format!("parsing {}", path.display()))
}

fn classify_file(path: &Path, verbose: bool, thresholds: Option<&Path>) -> Result<()> {
    let classifier = GeometricClassifier::new(load_thresholds(thresholds)?);

    let src = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mesh = Mesh::from_json(&src).with_context(|| format!("parsing {}", path.display()))?;
    tracing::debug!(landmarks = mesh.len(), "loaded mesh");

    let expression = classifier.classify(&mesh)?;
    println!("Expression: {expression}");

    if verbose {
        let f = ExpressionFeatures::from_mesh(&mesh)?;
        println!("  mouth width:   {:.2}", f.mouth_width);
        println!("  mouth height:  {:.2}", f.mouth_height);
        println!("  brow distance: {:.2}", f.brow_distance);
        println!("  brow lift:     {:.2}", f.brow_lift);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_accepts_thresholds_file() {
        let cli =
            Cli::try_parse_from(["facemesh", "classify", "mesh.json", "--thresholds", "t.toml"])
                .unwrap();
        match cli.command {
            Commands::Classify { path, thresholds, .. } => {
                assert_eq!(path, PathBuf::from("mesh.json"));
                assert_eq!(thresholds, Some(PathBuf::from("t.toml")));
            }
            _ => panic!("expected classify"),
        }
    }

    #[test]
    fn test_load_thresholds_file() {
        let dir = std::env::temp_dir();
        let thresholds = dir.join(format!("facemesh-thresholds-{}.toml", std::process::id()));
        std::fs::write(&thresholds, "[expression]\nsmiling_mouth_width = 60.0\n").unwrap();

        let loaded = load_thresholds(Some(&thresholds)).unwrap();
        assert_eq!(loaded.smiling_mouth_width, 60.0);
        assert_eq!(loaded.sad_mouth_width, 48.0);
        assert_eq!(load_thresholds(None).unwrap(), ExpressionThresholds::default());
        assert!(load_thresholds(Some(Path::new("/nonexistent/t.toml"))).is_err());

        let _ = std::fs::remove_file(&thresholds);
    }
}
