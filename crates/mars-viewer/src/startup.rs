//! CPU side of startup: shader program and packed elevation. Both must succeed
//! before any GPU resource that depends on them is created.

use crate::{
    assets::AssetSource,
    error::StartupError,
    frame::UNIFORM_NAMES,
    program::{ProgramBuilder, ProgramError, ShaderProgram, StageKind, UniformLocations},
};
use marsmap::{ElevationGrid, ElevationSourceFormat, PackedElevation};
use std::time::Instant;

/// A linked program and its resolved uniform contract.
#[derive(Debug, Clone)]
pub struct ProgramParts {
    pub program: ShaderProgram,
    pub locations: UniformLocations,
}

/// compile vertex → compile fragment → link → resolve uniforms.
pub fn build_program(
    assets: &impl AssetSource,
    vertex_name: &str,
    fragment_name: &str,
) -> Result<ProgramParts, StartupError> {
    let vertex_src = assets.load_text(vertex_name)?;
    let fragment_src = assets.load_text(fragment_name)?;

    let mut builder = ProgramBuilder::new();

    let vertex = builder
        .compile_stage(StageKind::Vertex, &vertex_src)
        .map_err(|e| report(vertex_name, e))?;
    let fragment = builder
        .compile_stage(StageKind::Fragment, &fragment_src)
        .map_err(|e| report(fragment_name, e))?;
    let program = builder
        .link_program(vertex, fragment)
        .map_err(|e| report(fragment_name, e))?;

    let locations = builder.resolve_uniforms(&program, &UNIFORM_NAMES);
    log::info!(
        "Shader program ready ({vertex_name} + {fragment_name}), {}/{} uniforms bound.",
        locations.resolved(),
        locations.len()
    );

    Ok(ProgramParts { program, locations })
}

fn report(name: &str, err: ProgramError) -> StartupError {
    log::error!("{name}: {err}");
    StartupError::Program(err)
}

/// What to load and how to pack it.
#[derive(Debug, Clone, Copy)]
pub struct ElevationRequest<'a> {
    pub name: &'a str,
    pub format: ElevationSourceFormat,
    pub resolution: u32,
    pub radius_offset: u32,
}

/// load → parse → validate shape → encode.
pub fn load_elevation(
    assets: &impl AssetSource,
    request: &ElevationRequest<'_>,
) -> Result<PackedElevation, StartupError> {
    let started = Instant::now();
    let bytes = assets.load_bytes(request.name)?;

    let grid = ElevationGrid::from_source(&bytes, request.format, request.resolution)
        .inspect_err(|e| log::error!("{}: {e}", request.name))?;

    let stats = grid.stats();
    log::debug!(
        "{}: {}x{} samples, min {} m, max {} m, mean {:.1} m.",
        request.name,
        grid.columns(),
        grid.rows(),
        stats.min,
        stats.max,
        stats.mean
    );

    let packed = grid.encode(request.radius_offset)?;
    if packed.saturated() > 0 {
        log::warn!(
            "{}: {} samples fell outside the 24-bit range with offset {} and were clamped.",
            request.name,
            packed.saturated(),
            request.radius_offset
        );
    }

    log::info!(
        "Elevation {} packed to {}x{} texels ({} bytes) in {:.2?}.",
        request.name,
        packed.width(),
        packed.height(),
        packed.bytes().len(),
        started.elapsed()
    );

    Ok(packed)
}
