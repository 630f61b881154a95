//! Copy/blit from the flat compute output into a colour image.

use shared::BlitUniforms;

/// Whether invocation `(x, y)` writes a texel.
///
/// The test is `x > size.x || y > size.y`, so coordinates equal to `size`
/// still write.
#[inline]
pub fn blit_in_bounds(x: u32, y: u32, size: [i32; 2]) -> bool {
    !(x as i32 > size[0] || y as i32 > size[1])
}

/// Index into the source buffer read by invocation `(x, y)`.
#[inline]
pub fn source_index(x: u32, y: u32, size: [i32; 2]) -> usize {
    (y as usize) * (size[0] as usize) + x as usize
}

#[inline]
pub fn modulate(color: [f32; 4], value: f32) -> [f32; 4] {
    [
        color[0] * value,
        color[1] * value,
        color[2] * value,
        color[3] * value,
    ]
}

/// Texel written by invocation `(x, y)`, or `None` when the invocation is a
/// no-op (out of `size`, or reading past the end of `src`).
pub fn blit_texel(x: u32, y: u32, uniforms: &BlitUniforms, src: &[f32]) -> Option<[f32; 4]> {
    if !blit_in_bounds(x, y, uniforms.size) {
        return None;
    }
    let idx = source_index(x, y, uniforms.size);
    if idx >= src.len() {
        return None;
    }
    Some(modulate(uniforms.color, src[idx]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniforms(w: i32, h: i32) -> BlitUniforms {
        BlitUniforms {
            color: [1.0, 0.5, 0.25, 1.0],
            size: [w, h],
        }
    }

    #[test]
    fn boundary_is_strictly_greater() {
        let size = [4, 2];
        assert!(blit_in_bounds(0, 0, size));
        assert!(blit_in_bounds(4, 2, size));
        assert!(!blit_in_bounds(5, 0, size));
        assert!(!blit_in_bounds(0, 3, size));
    }

    #[test]
    fn texel_is_color_times_source() {
        let src: Vec<f32> = (0..8).map(|v| v as f32).collect();
        let u = uniforms(4, 2);
        assert_eq!(blit_texel(1, 1, &u, &src), Some([5.0, 2.5, 1.25, 5.0]));
        assert_eq!(blit_texel(0, 0, &u, &src), Some([0.0; 4]));
    }

    #[test]
    fn edge_column_reads_next_row() {
        let src: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let u = uniforms(4, 2);
        // x == size.x wraps onto the start of the following row
        assert_eq!(blit_texel(4, 0, &u, &src), Some([4.0, 2.0, 1.0, 4.0]));
    }

    #[test]
    fn reads_past_source_are_skipped() {
        let src = [1.0f32; 8];
        let u = uniforms(4, 2);
        assert_eq!(blit_texel(0, 2, &u, &src), None);
        assert_eq!(blit_texel(9, 0, &u, &src), None);
    }
}
