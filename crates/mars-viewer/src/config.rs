use crate::camera::ControllerSettings;
use clap::{ArgAction, Parser, ValueEnum};
use marsmap::ElevationSourceFormat;
use std::path::PathBuf;

/// On-disk layout of the elevation asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SourceFormat {
    /// Headerless signed 16-bit big-endian samples.
    Binary,
    /// One decimal integer per line.
    Text,
}

impl From<SourceFormat> for ElevationSourceFormat {
    fn from(format: SourceFormat) -> Self {
        match format {
            SourceFormat::Binary => ElevationSourceFormat::BinaryI16Be,
            SourceFormat::Text => ElevationSourceFormat::Text,
        }
    }
}

/// Sampling of the elevation texture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TextureFilterMode {
    /// Exact texels; decoding packed bytes stays lossless.
    #[default]
    Nearest,
    /// Bilinear; blends packed bytes between neighbouring texels.
    Linear,
}

/// `mars_viewer` - real-time ray-marched Mars terrain.
///
/// Loads a shader pair and a MOLA-style elevation grid from an asset
/// directory, then orbits the planet with mouse, touch and wheel.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory every asset name is resolved against.
    #[arg(long, env = "MARS_ASSETS_DIR", default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/assets"))]
    pub assets: PathBuf,

    #[arg(long, env = "MARS_VERTEX_SHADER", default_value = "shaders/quad.vert.wgsl")]
    pub vertex_shader: String,

    #[arg(long, env = "MARS_FRAGMENT_SHADER", default_value = "shaders/mars.frag.wgsl")]
    pub fragment_shader: String,

    /// Elevation asset name (see `elevconv synth` to generate one).
    #[arg(long, env = "MARS_ELEVATION", default_value = "mars_4ppd.bin")]
    pub elevation: String,

    #[arg(long, env = "MARS_ELEVATION_FORMAT", value_enum, default_value_t = SourceFormat::Binary)]
    pub format: SourceFormat,

    /// Samples per degree of the elevation grid (180*res rows, 360*res columns).
    #[arg(long, env = "MARS_RESOLUTION", default_value_t = 4)]
    pub resolution: u32,

    /// Added to every sample before packing; the shader subtracts it again.
    #[arg(long, env = "MARS_RADIUS_OFFSET", default_value_t = marsmap::MARS_RADIUS_M)]
    pub radius_offset: u32,

    #[arg(long, env = "MARS_TEXTURE_FILTER", value_enum, default_value_t = TextureFilterMode::Nearest)]
    pub filter: TextureFilterMode,

    /// Zoom change per wheel pixel.
    #[arg(long, default_value_t = 0.001)]
    pub wheel_sensitivity: f32,

    /// Zoom change per pixel of pinch spread.
    #[arg(long, default_value_t = 0.005)]
    pub pinch_sensitivity: f32,

    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Wait for vertical blank when presenting.
    #[arg(long, env = "MARS_VSYNC", action = ArgAction::Set, default_value_t = true)]
    pub vsync: bool,
}

impl Config {
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            wheel_sensitivity: self.wheel_sensitivity,
            pinch_sensitivity: self.pinch_sensitivity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_shipped_assets() {
        let config = Config::try_parse_from(["mars_viewer"]).unwrap();
        assert_eq!(config.resolution, 4);
        assert_eq!(config.radius_offset, marsmap::MARS_RADIUS_M);
        assert_eq!(config.format, SourceFormat::Binary);
        assert_eq!(config.filter, TextureFilterMode::Nearest);
        assert!(config.vsync);
        assert!(config.assets.ends_with("assets"));
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "mars_viewer",
            "--format",
            "text",
            "--filter",
            "linear",
            "--resolution",
            "1",
            "--vsync",
            "false",
            "--wheel-sensitivity",
            "0.01",
        ])
        .unwrap();

        assert_eq!(ElevationSourceFormat::from(config.format), ElevationSourceFormat::Text);
        assert_eq!(config.filter, TextureFilterMode::Linear);
        assert_eq!(config.resolution, 1);
        assert!(!config.vsync);
        assert_eq!(config.controller_settings().wheel_sensitivity, 0.01);
    }
}
