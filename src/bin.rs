use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;
use rustongis::{
    codec::{from_hex_wkb, from_text, to_hex_wkb},
    index::{self, r_tree::in_memory},
    utils::simplify_geometry,
    *,
};
use snafu::prelude::*;
use std::{path::PathBuf, time::Instant};

/// Inspect, convert, simplify and index geometries, one per input line.
///
/// Lines hold either the text form or hex-encoded WKB, each optionally
/// prefixed with `SRID=n;`. Blank lines and lines starting with `#` are
/// skipped.
#[derive(Parser, Debug)]
#[command(name = "rustongis-cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print type, point count and box of every geometry.
    Info(InputArgs),
    /// Print every geometry as hex WKB.
    Wkb {
        #[command(flatten)]
        input: InputArgs,
        /// Write big-endian (XDR) instead of little-endian (NDR) WKB.
        #[arg(long)]
        big_endian: bool,
    },
    /// Print every geometry simplified with Douglas–Peucker.
    Simplify {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, short)]
        tolerance: f64,
    },
    /// Build an in-memory R-tree over all geometries and print its shape.
    Index {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, default_value_t = IndexConfig::default().node_width)]
        node_width: usize,
        #[arg(long, default_value_t = IndexConfig::default().min_fill)]
        min_fill: usize,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// File with one geometry per line.
    file: PathBuf,
}

struct InputLine {
    number: usize,
    geometry: Result<Geometry>,
}

fn decode_line(line: &str) -> Result<Geometry> {
    let body = line.rsplit(';').next().unwrap_or(line).trim();
    if !body.is_empty() && body.bytes().all(|b| b.is_ascii_hexdigit()) {
        from_hex_wkb(line)
    } else {
        from_text(line)
    }
}

/// Decode all lines of `input` in parallel, keeping their order.
fn read_geometries(input: &InputArgs) -> Result<Vec<InputLine>> {
    let content = std::fs::read_to_string(&input.file)?;
    let start = Instant::now();
    let lines: Vec<InputLine> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(index, line)| InputLine {
            number: index + 1,
            geometry: decode_line(line),
        })
        .collect();
    println!(
        "# Decoded {} lines of {} in {}ms",
        lines.len(),
        input.file.display(),
        start.elapsed().as_millis()
    );
    Ok(lines)
}

/// Print one output line per geometry, reporting failed lines on stderr.
fn for_each_line<F>(lines: &[InputLine], f: F) -> Result<()>
where
    F: Fn(&Geometry) -> Result<String> + Sync,
{
    let outputs: Vec<(usize, std::result::Result<String, String>)> = lines
        .par_iter()
        .map(|line| {
            let output = match &line.geometry {
                Ok(geometry) => f(geometry).map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };
            (line.number, output)
        })
        .collect();
    report(outputs.into_iter().map(|(number, output)| match output {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(e) => Err((number, e)),
    }))
}

fn report(results: impl Iterator<Item = std::result::Result<(), (usize, String)>>) -> Result<()> {
    let mut total = 0;
    let mut failed = 0;
    for result in results {
        total += 1;
        if let Err((number, e)) = result {
            eprintln!("line {number}: {e}");
            failed += 1;
        }
    }
    ensure_whatever!(failed == 0, "{failed} of {total} lines failed");
    Ok(())
}

fn describe(geometry: &Geometry) -> Result<String> {
    let bbox = match bbox_of(geometry) {
        Some(b) => b.to_string(),
        None => "no box".to_string(),
    };
    Ok(format!(
        "{} srid={} dims={} points={} {}",
        geometry.geometry_type_name(),
        geometry.srid(),
        geometry.ndims(),
        geometry.num_points(),
        bbox
    ))
}

fn build_index(lines: &[InputLine], config: IndexConfig) -> Result<()> {
    let start = Instant::now();
    let mut tree = in_memory::with_capacity(config, lines.len())?;
    let mut skipped = 0;
    report(lines.iter().map(|line| {
        let geometry = line
            .geometry
            .as_ref()
            .map_err(|e| (line.number, e.to_string()))?;
        match index::compress(geometry) {
            Some(key) => tree
                .insert(key, line.number)
                .map_err(|e| (line.number, e.to_string())),
            None => {
                skipped += 1;
                Ok(())
            }
        }
    }))?;
    println!(
        "Indexed {} geometries in {}ms, skipped {skipped} empty ones",
        tree.len(),
        start.elapsed().as_millis()
    );
    println!("{}", tree.stats());
    if let Some(root) = tree.root_key() {
        println!("Root key: {} (srid={})", root.bbox, root.srid);
    }
    Ok(())
}

#[snafu::report]
pub fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Info(input) => {
            let lines = read_geometries(&input)?;
            for_each_line(&lines, describe)
        }
        Command::Wkb { input, big_endian } => {
            let order = if big_endian {
                ByteOrder::BigEndian
            } else {
                ByteOrder::LittleEndian
            };
            let lines = read_geometries(&input)?;
            for_each_line(&lines, |g| to_hex_wkb(g, order))
        }
        Command::Simplify { input, tolerance } => {
            let lines = read_geometries(&input)?;
            for_each_line(&lines, |g| simplify_geometry(g, tolerance).map(|s| s.to_string()))
        }
        Command::Index {
            input,
            node_width,
            min_fill,
        } => {
            let config = IndexConfig {
                node_width,
                min_fill,
            };
            config.validate()?;
            let lines = read_geometries(&input)?;
            build_index(&lines, config)
        }
    }
}
