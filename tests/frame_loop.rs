// End-to-end frame loop on the host backend
//
// Bundles are written with `write_host_assets`; the host backend resolves
// kernels by entry point name and never reads past the SPIR-V header.

use graphit_template::{
    app::run_headless,
    config::{AppConfig, Backend, EntryStyle},
    frame::{frame_color, FrameDriver},
    graphics::headless::{CpuPresenter, PresentStats},
    runtime::cpu::{write_host_assets, CpuRuntime, CpuStats},
};

fn config(dir: &std::path::Path, style: EntryStyle, frames: u64) -> AppConfig {
    let mut config = AppConfig::new(dir, style);
    config.backend = Backend::Cpu;
    config.max_frames = Some(frames);
    config
}

fn assert_one_of_each_per_frame(style: EntryStyle, shape: [u32; 2]) {
    let dir = tempfile::tempdir().unwrap();
    write_host_assets(dir.path()).unwrap();

    let mut config = config(dir.path(), style, 200);
    config.canvas_shape = shape;
    let mut driver =
        FrameDriver::new(CpuRuntime::new(), CpuPresenter::new(shape), &config).unwrap();

    for frame in 0..200u64 {
        driver.run_frame().unwrap();
        let n = frame + 1;
        assert_eq!(
            driver.runtime().stats(),
            CpuStats {
                launches: n,
                flushes: n,
                waits: n
            }
        );
        assert_eq!(
            driver.presenter().stats(),
            PresentStats {
                acquires: n,
                uploads: n,
                submits: n
            }
        );
    }
    assert_eq!(driver.frame_index(), 200);
}

// a small canvas keeps 200 host frames quick in debug builds
#[test]
fn kernel_frames_launch_wait_and_submit_once() {
    assert_one_of_each_per_frame(EntryStyle::Kernel, [64, 32]);
}

#[test]
fn graph_frames_launch_wait_and_submit_once() {
    assert_one_of_each_per_frame(EntryStyle::Graph, [64, 32]);
}

// default 640x320 canvas; slow without optimizations, run with --release
#[test]
#[cfg_attr(debug_assertions, ignore)]
fn full_size_kernel_frames_launch_wait_and_submit_once() {
    assert_one_of_each_per_frame(EntryStyle::Kernel, [640, 320]);
}

#[test]
#[cfg_attr(debug_assertions, ignore)]
fn full_size_graph_frames_launch_wait_and_submit_once() {
    assert_one_of_each_per_frame(EntryStyle::Graph, [640, 320]);
}

#[test]
fn presented_image_is_tinted_canvas() {
    let dir = tempfile::tempdir().unwrap();
    write_host_assets(dir.path()).unwrap();

    let driver = run_headless(&config(dir.path(), EntryStyle::Graph, 1)).unwrap();
    let texels = driver.presenter().last_presented().unwrap();
    let canvas = driver.runtime().read_f32(driver.canvas());
    let color = frame_color(0);

    // canvas is read row-major with a row length of the image width
    for idx in [0usize, 1, 641, 640 * 320 - 1] {
        let expected = color.map(|c| c * canvas[idx]);
        assert_eq!(texels[idx], expected, "texel {idx}");
    }
}

#[test]
fn headless_run_stops_at_frame_limit() {
    let dir = tempfile::tempdir().unwrap();
    write_host_assets(dir.path()).unwrap();

    let driver = run_headless(&config(dir.path(), EntryStyle::Kernel, 3)).unwrap();
    assert_eq!(driver.frame_index(), 3);
    assert_eq!(driver.presenter().stats().submits, 3);
}
