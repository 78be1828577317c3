// src/lib.rs
//! Real-time ray-marched Mars terrain viewer.
//!
//! The host side builds one WGSL program, packs a MOLA-style elevation grid into
//! a texture, turns pointer/touch/wheel input into an orbit camera and drives a
//! full-screen quad once per display refresh.

pub mod app;
pub mod assets;
pub mod camera;
pub mod config;
pub mod error;
pub mod frame;
pub mod input;
pub mod program;
pub mod renderer;
pub mod startup;
pub mod ui;
