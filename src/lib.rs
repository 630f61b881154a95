//! GraphiT-Template
//!
//! Runs a fractal compute kernel from a precompiled module bundle, exports its
//! output buffer to the presentation side, and blits it into a window every
//! frame. The same kernel code also runs on the host:
//! - Vulkan (via rust-gpu/SPIR-V and vulkano)
//! - CPU (native Rust, headless)

pub mod app;
pub mod config;
pub mod error;
pub mod frame;
pub mod graphics;
pub mod logging;
pub mod runtime;

pub use config::AppConfig;
pub use error::{CrateResult, GraphitError};
pub use frame::FrameDriver;
