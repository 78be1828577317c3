use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use marsmap::{ElevationGrid, ElevationSourceFormat, GridShape, MARS_RADIUS_M};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

/// Raw elevation layouts understood by the viewer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Headerless signed 16-bit big-endian samples.
    Binary,
    /// One decimal integer per line.
    Text,
}

impl Format {
    /// `.txt` / `.csv` are text, anything else binary.
    fn guess(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("txt" | "csv") => Format::Text,
            _ => Format::Binary,
        }
    }

    fn resolve(explicit: Option<Self>, path: &Path) -> Self {
        explicit.unwrap_or_else(|| Self::guess(path))
    }
}

impl From<Format> for ElevationSourceFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Binary => ElevationSourceFormat::BinaryI16Be,
            Format::Text => ElevationSourceFormat::Text,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Format::Binary => "binary",
            Format::Text => "text",
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "elevconv", version, about = "Convert, inspect and synthesise Mars elevation grids")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-encode an elevation file between binary and text.
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Input layout; guessed from the extension when omitted.
        #[arg(long, value_enum)]
        from: Option<Format>,
        /// Output layout; guessed from the extension when omitted.
        #[arg(long, value_enum)]
        to: Option<Format>,
        /// Also check the sample count against this resolution.
        #[arg(long)]
        resolution: Option<u32>,
    },

    /// Validate a grid and print its statistics and packed size.
    Inspect {
        input: PathBuf,
        #[arg(long, value_enum)]
        format: Option<Format>,
        /// Samples per degree.
        #[arg(long, default_value_t = 4)]
        resolution: u32,
        #[arg(long, default_value_t = MARS_RADIUS_M)]
        radius_offset: u32,
    },

    /// Box-filter a grid down to `resolution / factor`.
    Downsample {
        input: PathBuf,
        output: PathBuf,
        #[arg(long, value_enum)]
        format: Option<Format>,
        #[arg(long, default_value_t = 4)]
        resolution: u32,
        #[arg(long, default_value_t = 2)]
        factor: u32,
    },

    /// Write a deterministic synthetic Mars-like grid.
    Synth {
        output: PathBuf,
        #[arg(long, value_enum)]
        format: Option<Format>,
        #[arg(long, default_value_t = 4)]
        resolution: u32,
        #[arg(long, default_value_t = 0x4d41_5253)]
        seed: u64,
        /// Number of random impact craters.
        #[arg(long, default_value_t = 400)]
        craters: usize,
    },
}

fn read_grid(path: &Path, format: Format, resolution: u32) -> Result<ElevationGrid> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    ElevationGrid::from_source(&bytes, format.into(), resolution)
        .with_context(|| format!("decoding {} as {format}", path.display()))
}

fn write_samples(path: &Path, format: Format, samples: &[i32]) -> Result<()> {
    let bytes = ElevationSourceFormat::from(format).write(samples)?;
    fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote {} samples ({} bytes, {format}) to {}", samples.len(), bytes.len(), path.display());
    Ok(())
}

fn convert(
    input: &Path,
    output: &Path,
    from: Format,
    to: Format,
    resolution: Option<u32>,
) -> Result<()> {
    if from == to {
        warn!("Input and output are both {from}; the file is only re-validated.");
    }

    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let samples = ElevationSourceFormat::from(from)
        .parse(&bytes)
        .with_context(|| format!("decoding {} as {from}", input.display()))?;

    if let Some(resolution) = resolution {
        GridShape::new(resolution)?.check(samples.len())?;
    }

    write_samples(output, to, &samples)
}

fn inspect(input: &Path, format: Format, resolution: u32, radius_offset: u32) -> Result<()> {
    let grid = read_grid(input, format, resolution)?;
    let stats = grid.stats();
    let packed = grid.encode(radius_offset)?;

    println!("file        {}", input.display());
    println!("format      {format}");
    println!("resolution  {resolution} samples/deg");
    println!("grid        {} rows x {} columns", grid.rows(), grid.columns());
    println!("elevation   min {} m, max {} m, mean {:.1} m", stats.min, stats.max, stats.mean);
    println!(
        "packed      {}x{} texels, {} bytes",
        packed.width(),
        packed.height(),
        packed.bytes().len()
    );

    if packed.saturated() > 0 {
        warn!(
            "{} samples do not fit 24 bits with offset {radius_offset} and would be clamped",
            packed.saturated()
        );
    }
    Ok(())
}

fn downsample(
    input: &Path,
    output: &Path,
    format: Format,
    resolution: u32,
    factor: u32,
) -> Result<()> {
    let grid = read_grid(input, format, resolution)?;
    let smaller = grid.downsample(factor)?;
    info!(
        "Downsampled {}x{} -> {}x{}",
        grid.columns(),
        grid.rows(),
        smaller.columns(),
        smaller.rows()
    );
    write_samples(output, format, smaller.samples())
}

// -------------------- Synthetic terrain --------------------

/// A circular feature: positive `depth_m` digs, negative builds up.
#[derive(Clone, Copy, Debug)]
struct Crater {
    lat: f64,
    lon: f64,
    radius: f64,
    depth_m: f64,
}

impl Crater {
    /// Bowl with a raised rim, zero beyond 1.5 radii.
    fn profile(&self, angle: f64) -> f64 {
        let x = angle / self.radius;
        if x < 1.0 {
            -self.depth_m * (1.0 - x * x)
        } else if x < 1.5 {
            let rim = 1.0 - (x - 1.0) * 2.0;
            self.depth_m * 0.2 * rim * rim
        } else {
            0.0
        }
    }
}

/// Great-circle angle between two points given in radians.
fn angular_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let cos = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * (lon1 - lon2).cos();
    cos.clamp(-1.0, 1.0).acos()
}

fn landmarks() -> Vec<Crater> {
    let feature = |lat: f64, lon: f64, radius_deg: f64, depth_m: f64| Crater {
        lat: lat.to_radians(),
        lon: lon.to_radians(),
        radius: radius_deg.to_radians(),
        depth_m,
    };

    vec![
        // Olympus Mons
        feature(18.6, -134.0, 6.0, -21_000.0),
        // Tharsis Montes
        feature(-0.8, -112.6, 3.0, -14_000.0),
        feature(1.6, -104.5, 3.0, -13_000.0),
        feature(11.8, -101.0, 3.0, -16_000.0),
        // Hellas basin
        feature(-42.4, 70.5, 20.0, 6_500.0),
        // Argyre basin
        feature(-49.7, -43.4, 10.0, 4_000.0),
    ]
}

fn random_craters(seed: u64, count: usize) -> Vec<Crater> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            // Uniform on the sphere.
            let lat = rng.gen_range(-1.0f64..1.0).asin();
            let lon = rng.gen_range(-std::f64::consts::PI..std::f64::consts::PI);
            let radius_deg: f64 = rng.gen_range(0.2..4.0);
            Crater {
                lat,
                lon,
                radius: radius_deg.to_radians(),
                depth_m: 300.0 + radius_deg * 400.0,
            }
        })
        .collect()
}

/// Northern lowlands against southern highlands, with a wavy boundary.
fn dichotomy(lat: f64, lon: f64) -> f64 {
    let boundary = 0.2 * (lon * 2.0).sin() + 0.1 * (lon * 5.0).cos();
    -2_500.0 * ((lat - boundary) * 4.0).tanh() - 1_000.0
}

fn synthesize(resolution: u32, seed: u64, craters: usize) -> Result<ElevationGrid> {
    let shape = GridShape::new(resolution)?;
    let mut features = landmarks();
    features.extend(random_craters(seed, craters));

    let res = resolution as f64;
    let mut samples = vec![0i32; shape.cells()];

    samples
        .par_chunks_mut(shape.columns)
        .enumerate()
        .for_each(|(row, out)| {
            // Cell centres, northernmost row first, longitude from -180.
            let lat = (90.0 - (row as f64 + 0.5) / res).to_radians();
            for (column, cell) in out.iter_mut().enumerate() {
                let lon = ((column as f64 + 0.5) / res - 180.0).to_radians();
                let mut h = dichotomy(lat, lon);
                for f in &features {
                    if (lat - f.lat).abs() > f.radius * 1.5 {
                        continue;
                    }
                    h += f.profile(angular_distance(lat, lon, f.lat, f.lon));
                }
                *cell = h.round().clamp(i16::MIN as f64, i16::MAX as f64) as i32;
            }
        });

    Ok(ElevationGrid::new(resolution, samples)?)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let started = Instant::now();

    match args.command {
        Command::Convert {
            input,
            output,
            from,
            to,
            resolution,
        } => {
            let from = Format::resolve(from, &input);
            let to = Format::resolve(to, &output);
            convert(&input, &output, from, to, resolution)?;
        }
        Command::Inspect {
            input,
            format,
            resolution,
            radius_offset,
        } => {
            let format = Format::resolve(format, &input);
            inspect(&input, format, resolution, radius_offset)?;
        }
        Command::Downsample {
            input,
            output,
            format,
            resolution,
            factor,
        } => {
            let format = Format::resolve(format, &input);
            downsample(&input, &output, format, resolution, factor)?;
        }
        Command::Synth {
            output,
            format,
            resolution,
            seed,
            craters,
        } => {
            if resolution > 64 {
                bail!("refusing to synthesise more than 64 samples per degree");
            }
            let format = Format::resolve(format, &output);
            let grid = synthesize(resolution, seed, craters)?;
            let stats = grid.stats();
            info!(
                "Synthesised {}x{} grid: min {} m, max {} m",
                grid.columns(),
                grid.rows(),
                stats.min,
                stats.max
            );
            write_samples(&output, format, grid.samples())?;
        }
    }

    info!("Done in {:.2?}", started.elapsed());
    Ok(())
}
