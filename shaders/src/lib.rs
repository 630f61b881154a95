#![cfg_attr(target_arch = "spirv", no_std)]
// HACK(eddyb) can't easily see warnings otherwise from `spirv-builder` builds.
#![deny(warnings)]

use shared::{BlitUniforms, FractalArgs};
use spirv_std::{
    glam::{UVec2, UVec3, Vec4},
    spirv, Image,
};

/// Fractal kernel: `fractal(t: f32, canvas: ndarray<f32, 2>)`.
///
/// `t` and the canvas extents arrive as push constants, the canvas itself is
/// the first (and only) ndarray argument and so sits at binding 0.
#[spirv(compute(threads(8, 8)))]
pub fn fractal(
    #[spirv(global_invocation_id)] id: UVec3,
    #[spirv(push_constant)] args: &FractalArgs,
    #[spirv(storage_buffer, descriptor_set = 0, binding = 0)] canvas: &mut [f32],
) {
    kernel::fractal::fractal(id.x, id.y, args, canvas);
}

/// Copy/blit: `image[x, y] = color * src[y * size.x + x]`.
#[spirv(compute(threads(8, 8)))]
pub fn blit(
    #[spirv(global_invocation_id)] id: UVec3,
    #[spirv(uniform, descriptor_set = 0, binding = 0)] uniforms: &BlitUniforms,
    #[spirv(storage_buffer, descriptor_set = 0, binding = 1)] src: &[f32],
    #[spirv(descriptor_set = 0, binding = 2)] dst: &Image!(2D, type=f32, sampled=false),
) {
    if !kernel::blit::blit_in_bounds(id.x, id.y, uniforms.size) {
        return;
    }
    let idx = kernel::blit::source_index(id.x, id.y, uniforms.size);
    if idx >= src.len() {
        return;
    }
    let texel = kernel::blit::modulate(uniforms.color, src[idx]);
    unsafe {
        dst.write(UVec2::new(id.x, id.y), Vec4::from_array(texel));
    }
}
