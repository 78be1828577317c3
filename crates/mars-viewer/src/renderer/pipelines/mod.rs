//! Render pipelines built from a linked [`crate::program::ShaderProgram`].

pub mod raymarch;
