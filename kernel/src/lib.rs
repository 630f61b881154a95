//! Kernel bodies for the fractal demo.
//!
//! The same code runs inside the rust-gpu shaders (SPIR-V) and on the CPU
//! backend of the host application.

#![cfg_attr(target_arch = "spirv", no_std)]

pub mod blit;
pub mod fractal;

#[cfg(target_arch = "spirv")]
pub(crate) use spirv_std::glam;

#[cfg(not(target_arch = "spirv"))]
pub(crate) use ::glam;
