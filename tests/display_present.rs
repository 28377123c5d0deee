//! Presentation queue: shader negotiation, the single-slot-ahead hand-off and viewport policy.

mod common;

use std::thread;
use std::time::Duration;

use common::{Call, MockOptions, harness_with, running, sync, wait_until};
use gl_display::engine::gpu::Viewport;
use gl_display::{CropRect, DisplayConfig, DisplayState, Frame, VideoFormat};

fn rgba_frame(display: &gl_display::Display<common::MockBackend>, width: u32, height: u32) -> Frame {
    display
        .allocate_frame(VideoFormat::Rgba, width, height, CropRect::default())
        .unwrap()
}

fn drawn_textures(log: &common::GpuLog) -> Vec<u32> {
    log.calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::Draw { texture, .. } => Some(texture),
            _ => None,
        })
        .collect()
}

#[test]
fn redraw_before_any_frame_builds_nothing() {
    let harness = running(4);
    assert!(harness.display.present(None, 320, 240, false));
    sync(&harness.display);

    assert_eq!(
        harness
            .log
            .count(|call| matches!(call, Call::CompileProgram(_) | Call::Draw { .. })),
        0
    );
}

#[test]
fn first_present_builds_the_shader_once() {
    let harness = running(4);
    let display = &harness.display;

    let first = rgba_frame(display, 64, 64);
    let second = rgba_frame(display, 64, 64);
    assert!(display.present(Some(&first), 640, 480, false));
    assert!(display.present(Some(&second), 640, 480, false));
    assert!(display.present(None, 640, 480, false));
    sync(display);

    assert_eq!(
        harness
            .log
            .count(|call| matches!(call, Call::CompileProgram(_))),
        1
    );
    assert_eq!(
        drawn_textures(&harness.log),
        vec![
            first.texture_id().unwrap(),
            second.texture_id().unwrap(),
            second.texture_id().unwrap()
        ]
    );
}

#[test]
fn presenting_the_frame_on_screen_again_is_a_no_op() {
    let harness = running(4);
    let display = &harness.display;

    let frame = rgba_frame(display, 64, 64);
    assert!(display.present(Some(&frame), 640, 480, false));
    assert!(display.present(Some(&frame), 640, 480, false));
    sync(display);

    assert_eq!(harness.log.count(|call| matches!(call, Call::Draw { .. })), 1);
}

#[test]
fn only_one_frame_waits_ahead_of_the_screen() {
    let harness = running(4);
    let display = harness.display.clone();

    let a = rgba_frame(&display, 64, 64);
    let b = rgba_frame(&display, 64, 64);

    harness.log.block_draws();
    assert!(display.present(Some(&a), 640, 480, false));
    assert!(wait_until(Duration::from_secs(2), || harness.log.draws_entered() == 1));

    let presenter = {
        let display = display.clone();
        let b = b.clone();
        thread::spawn(move || display.present(Some(&b), 640, 480, false))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!presenter.is_finished());

    harness.log.unblock_draws();
    assert!(presenter.join().unwrap());
    sync(&display);

    assert_eq!(
        drawn_textures(&harness.log),
        vec![a.texture_id().unwrap(), b.texture_id().unwrap()]
    );
    // the display let go of `a` and keeps `b` on screen
    assert_eq!(a.ref_count(), 1);
    assert_eq!(b.ref_count(), 2);
}

#[test]
fn frame_queued_during_a_redraw_is_still_presented() {
    let harness = running(4);
    let display = harness.display.clone();

    let a = rgba_frame(&display, 64, 64);
    let b = rgba_frame(&display, 64, 64);
    let c = rgba_frame(&display, 64, 64);
    assert!(display.present(Some(&a), 640, 480, false));
    sync(&display);

    // hold a redraw of `a` between sampling and swap
    harness.log.block_draws();
    assert!(display.present(None, 640, 480, false));
    assert!(wait_until(Duration::from_secs(2), || harness.log.draws_entered() == 2));

    assert!(display.present(Some(&b), 640, 480, false));
    let presenter = {
        let display = display.clone();
        let c = c.clone();
        thread::spawn(move || display.present(Some(&c), 640, 480, false))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!presenter.is_finished());

    harness.log.unblock_draws();
    assert!(presenter.join().unwrap());
    sync(&display);

    let (a, b, c) = (
        a.texture_id().unwrap(),
        b.texture_id().unwrap(),
        c.texture_id().unwrap(),
    );
    assert_eq!(drawn_textures(&harness.log), vec![a, a, b, c]);
}

#[test]
fn destroy_releases_a_blocked_present() {
    let harness = running(4);
    let display = harness.display.clone();

    let a = rgba_frame(&display, 64, 64);
    let b = rgba_frame(&display, 64, 64);

    harness.log.block_draws();
    assert!(display.present(Some(&a), 640, 480, false));
    assert!(wait_until(Duration::from_secs(2), || harness.log.draws_entered() == 1));

    let presenter = {
        let display = display.clone();
        let b = b.clone();
        thread::spawn(move || display.present(Some(&b), 640, 480, false))
    };
    thread::sleep(Duration::from_millis(50));

    let destroyer = {
        let display = display.clone();
        thread::spawn(move || display.destroy_context())
    };
    assert!(!presenter.join().unwrap());

    harness.log.unblock_draws();
    destroyer.join().unwrap();
    assert_eq!(display.state(), DisplayState::Terminated);
    assert_eq!(harness.log.foreign_calls(), 0);

    drop((a, b));
    assert_eq!(harness.platform.frees(), harness.platform.allocations());
}

#[test]
fn shader_failure_kills_the_display() {
    let harness = harness_with(
        DisplayConfig::default(),
        MockOptions {
            fail_shader: true,
            ..MockOptions::default()
        },
    );
    let display = &harness.display;
    display.create_context(None).unwrap();

    let frame = rgba_frame(display, 64, 64);
    assert!(!display.present(Some(&frame), 640, 480, false));
    assert!(!display.is_alive());
    assert!(!display.present(None, 640, 480, false));
    assert_eq!(harness.log.count(|call| matches!(call, Call::Draw { .. })), 0);

    display.destroy_context();
    assert_eq!(display.state(), DisplayState::Terminated);
}

#[test]
fn format_change_drops_slots_and_rebuilds_the_shader() {
    let harness = running(4);
    let display = &harness.display;

    let small = rgba_frame(display, 64, 64);
    assert!(display.present(Some(&small), 640, 480, false));
    sync(display);
    assert_eq!(small.ref_count(), 2);

    let large = rgba_frame(display, 128, 64);
    assert_eq!(small.ref_count(), 1);
    assert!(display.present(Some(&large), 640, 480, false));
    sync(display);

    assert_eq!(
        harness
            .log
            .count(|call| matches!(call, Call::CompileProgram(_))),
        2
    );
    assert!(harness.log.calls().contains(&Call::DeleteProgram(1)));
}

#[test]
fn keep_aspect_ratio_letterboxes_the_frame() {
    let harness = running(4);
    let display = &harness.display;

    let frame = rgba_frame(display, 64, 32);
    assert!(display.present(Some(&frame), 100, 100, true));
    sync(display);

    let letterbox = Viewport {
        x: 0,
        y: 25,
        width: 100,
        height: 50,
    };
    let calls = harness.log.calls();
    assert!(calls.contains(&Call::SetViewport(letterbox)));
    assert!(calls.contains(&Call::ResizeSurface(dpi::PhysicalSize::new(100, 100))));
    let last_viewport = calls.iter().rev().find_map(|call| match call {
        Call::SetViewport(viewport) => Some(*viewport),
        _ => None,
    });
    assert_eq!(last_viewport, Some(letterbox));

    // switching the policy off stretches again
    assert!(display.present(None, 100, 100, false));
    sync(display);
    let last_viewport = harness.log.calls().iter().rev().find_map(|call| match call {
        Call::SetViewport(viewport) => Some(*viewport),
        _ => None,
    });
    assert_eq!(
        last_viewport,
        Some(Viewport {
            x: 0,
            y: 0,
            width: 100,
            height: 100,
        })
    );
}

#[test]
fn cropped_frames_sample_only_the_visible_region() {
    let harness = harness_with(
        DisplayConfig::default().with_capability_check(false),
        MockOptions::default(),
    );
    let display = &harness.display;
    display.create_context(None).unwrap();

    let crop = CropRect {
        left: 0,
        top: 0,
        right: 3,
        bottom: 1,
    };
    let frame = display
        .allocate_frame(VideoFormat::Rgba, 64, 32, crop)
        .unwrap();
    assert!(display.present(Some(&frame), 640, 480, false));
    sync(display);

    let sampler = harness
        .log
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::Draw { sampler, .. } => Some(sampler),
            _ => None,
        })
        .unwrap();
    assert_eq!(sampler.right, 61.0 / 64.0);
    assert_eq!(sampler.top, 31.0 / 32.0);
}
