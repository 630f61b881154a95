//! Types and constants shared between the host application and the shaders
#![cfg_attr(not(test), no_std)]

use bytemuck::{Pod, Zeroable};

/// Local workgroup size of the fractal kernel
/// IMPORTANT: This must be kept in sync with the literal value in shaders/src/lib.rs
pub const FRACTAL_LOCAL_SIZE: [u32; 3] = [8, 8, 1];

/// Local workgroup size of the copy/blit shader
/// IMPORTANT: This must be kept in sync with the literal value in shaders/src/lib.rs
pub const BLIT_LOCAL_SIZE: [u32; 3] = [8, 8, 1];

/// Binding slots of the copy/blit shader (descriptor set 0)
pub const BLIT_UNIFORM_BINDING: u32 = 0;
pub const BLIT_SOURCE_BINDING: u32 = 1;
pub const BLIT_TARGET_BINDING: u32 = 2;

#[inline]
pub const fn div_ceil_u32(n: u32, d: u32) -> u32 {
    // Precondition: d > 0
    n / d + ((n % d) != 0) as u32
}

/// Number of workgroups needed to cover an `x` by `y` domain
pub fn num_workgroups_2d(num_elts_x: u32, num_elts_y: u32, local_size: [u32; 3]) -> [u32; 3] {
    [
        div_ceil_u32(num_elts_x, local_size[0]),
        div_ceil_u32(num_elts_y, local_size[1]),
        1,
    ]
}

/// Uniform block read by the copy/blit shader.
///
/// Laid out with scalar block layout on the GPU, so `color` is four tightly
/// packed floats followed by two ints.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BlitUniforms {
    pub color: [f32; 4],
    pub size: [i32; 2],
}

/// Push constant block of the fractal kernel: `(t: f32, canvas: ndarray<f32, 2>)`.
///
/// Scalars come first in declaration order, then the extents of each ndarray
/// argument.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FractalArgs {
    pub t: f32,
    pub canvas_shape: [u32; 2],
}
