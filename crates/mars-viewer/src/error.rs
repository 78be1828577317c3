use crate::{assets::AssetError, program::ProgramError};
use marsmap::ElevationError;
use thiserror::Error;

/// Anything that stops the viewer before its first frame.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("graphics context initialisation failed: {0}")]
    ContextInit(String),

    #[error(transparent)]
    Program(#[from] ProgramError),

    #[error("elevation data rejected: {0}")]
    Elevation(#[from] ElevationError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("elevation texture {width}x{height} exceeds the device limit of {limit} texels per side")]
    TextureTooLarge { width: u32, height: u32, limit: u32 },
}
