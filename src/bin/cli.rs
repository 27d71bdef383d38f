//! tracecompress CLI - compress GPX trajectories
//!
//! Usage:
//!   tracecompress-cli compress <folder> [--radius-km 0.2] [--output <dir>] [--no-sort]
//!   tracecompress-cli stats <folder>
//!
//! Every GPX file in the folder is treated as one user (named after the file)
//! and every track in it as one trajectory of that user. Elevation is carried
//! through as an extra attribute.

use clap::{Parser, Subcommand};
use gpx::{read, Gpx};
use log::warn;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracecompress::{
    compress, geo_utils::polyline_length_km, CompressionConfig, CompressionParams, EntityKey,
    OptionExt, TrajDataset, TrajPoint, TrajRecord, COMPRESSION_PARAMS,
};

#[derive(Parser)]
#[command(name = "tracecompress-cli")]
#[command(about = "Merge GPS fixes that stay within a small radius", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress every trajectory found in a folder of GPX files
    Compress {
        /// Folder containing GPX files
        folder: PathBuf,

        /// Cluster radius in kilometers
        #[arg(short, long, default_value = "0.2")]
        radius_km: f64,

        /// Output directory for compressed GPX files and parameters
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail on out-of-order fixes instead of sorting them
        #[arg(long)]
        no_sort: bool,
    },

    /// Show point counts and track lengths without compressing
    Stats {
        /// Folder containing GPX files
        folder: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compress {
            folder,
            radius_km,
            output,
            no_sort,
        } => {
            let config = CompressionConfig {
                spatial_radius_km: radius_km,
                sort_input: !no_sort,
            };
            if let Err(e) = run_compress(&folder, output.as_deref(), &config, cli.verbose) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Stats { folder } => match load_gpx_files(&folder, cli.verbose) {
            Ok(dataset) => print_stats("Input", &dataset),
            Err(e) => {
                eprintln!("Error reading folder {}: {}", folder.display(), e);
                std::process::exit(1);
            }
        },
    }
}

/// Load every GPX file of a folder into one dataset.
///
/// An unreadable folder is an error; unparseable files are skipped.
fn load_gpx_files(folder: &Path, verbose: bool) -> io::Result<TrajDataset> {
    println!("\n{}", "=".repeat(60));
    println!("Loading GPX files from: {}", folder.display());
    println!("{}", "=".repeat(60));

    let mut records = Vec::new();

    let entries = fs::read_dir(folder)?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().map_or(false, |ext| ext == "gpx"))
        .collect();
    paths.sort();

    for path in paths {
        if verbose {
            println!("\n  Processing: {}", path.display());
        }

        match parse_gpx_file(&path) {
            Ok(file_records) => {
                println!("  [OK] {} - {} points", path.display(), file_records.len());
                records.extend(file_records);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                eprintln!("  [ERR] Failed to parse {}: {}", path.display(), e);
            }
        }
    }

    let dataset = TrajDataset::new(records);
    println!(
        "\nLoaded {} points in {} trajectories",
        dataset.len(),
        dataset.entity_count()
    );
    Ok(dataset)
}

/// Parse a single GPX file. The file stem is the user id, the track index the
/// trajectory id.
fn parse_gpx_file(path: &Path) -> Result<Vec<TrajRecord>, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let reader = BufReader::new(file);
    let gpx: Gpx = read(reader).map_err(|e| e.to_string())?;

    let uid = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let mut records = Vec::new();
    for (track_index, track) in gpx.tracks.iter().enumerate() {
        let tid = track_index.to_string();
        let key = EntityKey::trajectory(uid.clone(), tid.clone());
        let mut index = 0;

        for segment in &track.segments {
            for pt in &segment.points {
                let time = pt
                    .time
                    .clone()
                    .ok_or_malformed(&key, index, "missing <time>")
                    .map_err(|e| e.to_string())?;
                let time: OffsetDateTime = time.into();
                let timestamp = nanos_to_millis(time.unix_timestamp_nanos())
                    .ok_or_malformed(&key, index, "<time> out of range")
                    .map_err(|e| e.to_string())?;

                let point = pt.point();
                let elevation = pt
                    .elevation
                    .map(serde_json::Value::from)
                    .unwrap_or(serde_json::Value::Null);

                records.push(TrajRecord::new(
                    Some(uid.clone()),
                    Some(tid.clone()),
                    TrajPoint::with_extra(point.y(), point.x(), timestamp, vec![elevation]),
                ));
                index += 1;
            }
        }
    }

    if records.is_empty() {
        return Err("No track points found".to_string());
    }
    Ok(records)
}

/// Run compression over a folder
fn run_compress(
    folder: &Path,
    output: Option<&Path>,
    config: &CompressionConfig,
    verbose: bool,
) -> tracecompress::Result<()> {
    let dataset = load_gpx_files(folder, verbose)?;
    if dataset.is_empty() {
        println!("No trajectories to process");
        return Ok(());
    }

    println!("\n{}", "=".repeat(60));
    println!("COMPRESSION");
    println!("{}", "=".repeat(60));

    if verbose {
        println!("\n[Config]");
        println!("  spatial_radius_km: {}", config.spatial_radius_km);
        println!("  sort_input: {}", config.sort_input);
    }

    let compressed = compress(&dataset, config)?;

    println!("\n{}", "-".repeat(60));
    println!("RESULTS");
    println!("{}", "-".repeat(60));
    print_stats("Input", &dataset);
    print_stats("Compressed", &compressed);

    if let Some(params) = compressed.parameter(COMPRESSION_PARAMS) {
        let params: CompressionParams = serde_json::from_value(params.clone())?;
        let ratio = if params.input_points > 0 {
            100.0 * params.output_points as f64 / params.input_points as f64
        } else {
            0.0
        };
        println!(
            "\n  Kept {} of {} points ({:.1}%) across {} entities",
            params.output_points, params.input_points, ratio, params.entities
        );
    }

    if let Some(output_dir) = output {
        export_dataset(&compressed, output_dir, verbose)?;
    }
    Ok(())
}

/// Points grouped by user, then trajectory.
fn by_entity(dataset: &TrajDataset) -> BTreeMap<EntityKey, Vec<TrajPoint>> {
    let mut entities: BTreeMap<EntityKey, Vec<TrajPoint>> = BTreeMap::new();
    for record in &dataset.records {
        entities
            .entry(record.key())
            .or_default()
            .push(record.point.clone());
    }
    entities
}

fn print_stats(label: &str, dataset: &TrajDataset) {
    println!("\n  {}:", label);
    for (key, points) in by_entity(dataset) {
        println!(
            "    {} - {} points, {:.2}km",
            key,
            points.len(),
            polyline_length_km(&points)
        );
    }
}

/// Write one GPX file per user plus the recorded parameters.
fn export_dataset(dataset: &TrajDataset, output_dir: &Path, verbose: bool) -> io::Result<()> {
    println!("\n[Export] Writing results to: {}", output_dir.display());
    fs::create_dir_all(output_dir)?;

    let mut users: BTreeMap<String, Vec<(String, Vec<TrajPoint>)>> = BTreeMap::new();
    for (key, points) in by_entity(dataset) {
        let uid = key.uid.unwrap_or_else(|| "unknown".to_string());
        let tid = key.tid.unwrap_or_else(|| "0".to_string());
        users.entry(uid).or_default().push((tid, points));
    }

    for (uid, tracks) in &users {
        let filename = format!("{}.compressed.gpx", uid);
        if verbose {
            println!("  Writing: {}", filename);
        }
        write_gpx_file(&output_dir.join(&filename), uid, tracks)?;
    }

    let params_path = output_dir.join("compression_params.json");
    let file = File::create(&params_path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), &dataset.parameters)?;

    println!(
        "  Exported {} GPX files and {}",
        users.len(),
        params_path.display()
    );
    Ok(())
}

/// Write tracks to a GPX file
fn write_gpx_file(path: &Path, name: &str, tracks: &[(String, Vec<TrajPoint>)]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        writer,
        r#"<gpx version="1.1" creator="tracecompress-cli" xmlns="http://www.topografix.com/GPX/1/1">"#
    )?;
    writeln!(writer, "  <metadata>")?;
    writeln!(writer, "    <name>{}</name>", escape_xml(name))?;
    writeln!(writer, "  </metadata>")?;

    for (tid, points) in tracks {
        writeln!(writer, "  <trk>")?;
        writeln!(writer, "    <name>{} {}</name>", escape_xml(name), escape_xml(tid))?;
        writeln!(writer, "    <trkseg>")?;

        for point in points {
            write!(
                writer,
                r#"      <trkpt lat="{:.6}" lon="{:.6}">"#,
                point.latitude, point.longitude
            )?;
            if let Some(ele) = point.extra.first().and_then(|v| v.as_f64()) {
                write!(writer, "<ele>{:.1}</ele>", ele)?;
            }
            if let Some(time) = format_timestamp(point.timestamp) {
                write!(writer, "<time>{}</time>", time)?;
            }
            writeln!(writer, "</trkpt>")?;
        }

        writeln!(writer, "    </trkseg>")?;
        writeln!(writer, "  </trk>")?;
    }

    writeln!(writer, "</gpx>")?;
    writer.flush()
}

/// Unix nanoseconds to milliseconds, `None` when outside the `i64` range.
fn nanos_to_millis(nanos: i128) -> Option<i64> {
    i64::try_from(nanos / 1_000_000).ok()
}

/// RFC 3339 rendering of a millisecond timestamp.
fn format_timestamp(timestamp_ms: i64) -> Option<String> {
    OffsetDateTime::from_unix_timestamp_nanos(timestamp_ms as i128 * 1_000_000)
        .ok()?
        .format(&Rfc3339)
        .ok()
}

/// Escape XML special characters
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
