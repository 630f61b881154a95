//! Julia-set fractal written into a 2D canvas of shape `(2n, n)`.

use crate::glam::{vec2, Vec2};
use shared::FractalArgs;

#[cfg(target_arch = "spirv")]
use spirv_std::num_traits::Float;

pub const MAX_ITERATIONS: u32 = 50;
pub const ESCAPE_RADIUS: f32 = 20.0;
pub const C_REAL: f32 = -0.8;
pub const C_IMAG_AMPLITUDE: f32 = 0.2;

#[inline]
fn complex_sqr(z: Vec2) -> Vec2 {
    vec2(z.x * z.x - z.y * z.y, z.y * z.x * 2.0)
}

/// Value of canvas cell `(i, j)` at time `t`, in `[0, 1]`.
///
/// `n` is the extent of the canvas' second dimension.
pub fn fractal_value(i: u32, j: u32, t: f32, n: u32) -> f32 {
    let n = n as f32;
    let c = vec2(C_REAL, t.cos() * C_IMAG_AMPLITUDE);
    let mut z = vec2(i as f32 / n - 1.0, j as f32 / n - 0.5) * 2.0;
    let mut iterations = 0u32;
    while z.length() < ESCAPE_RADIUS && iterations < MAX_ITERATIONS {
        z = complex_sqr(z) + c;
        iterations += 1;
    }
    1.0 - iterations as f32 * 0.02
}

/// Row-major linear index of `(i, j)`, or `None` outside the canvas.
#[inline]
pub fn canvas_index(i: u32, j: u32, shape: [u32; 2]) -> Option<usize> {
    if i < shape[0] && j < shape[1] {
        Some((i * shape[1] + j) as usize)
    } else {
        None
    }
}

/// One kernel invocation at global id `(i, j)`.
pub fn fractal(i: u32, j: u32, args: &FractalArgs, canvas: &mut [f32]) {
    if let Some(idx) = canvas_index(i, j, args.canvas_shape) {
        canvas[idx] = fractal_value(i, j, args.t, args.canvas_shape[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_stay_in_unit_range() {
        for i in (0..640).step_by(37) {
            for j in (0..320).step_by(23) {
                let v = fractal_value(i, j, 1.7, 320);
                assert!((0.0..=1.0).contains(&v), "({i}, {j}) -> {v}");
            }
        }
    }

    #[test]
    fn value_is_whole_number_of_steps() {
        let v = fractal_value(0, 0, 0.0, 320);
        let steps = (1.0 - v) / 0.02;
        assert!((steps - steps.round()).abs() < 1e-3);
    }

    #[test]
    fn canvas_index_is_row_major() {
        assert_eq!(canvas_index(0, 0, [640, 320]), Some(0));
        assert_eq!(canvas_index(1, 0, [640, 320]), Some(320));
        assert_eq!(canvas_index(639, 319, [640, 320]), Some(640 * 320 - 1));
        assert_eq!(canvas_index(640, 0, [640, 320]), None);
        assert_eq!(canvas_index(0, 320, [640, 320]), None);
    }

    #[test]
    fn invocation_outside_canvas_is_ignored() {
        let args = FractalArgs {
            t: 0.0,
            canvas_shape: [2, 2],
        };
        let mut canvas = [-1.0f32; 4];
        fractal(2, 0, &args, &mut canvas);
        assert_eq!(canvas, [-1.0; 4]);
        fractal(1, 1, &args, &mut canvas);
        assert!(canvas[3] >= 0.0);
    }
}
