//! Texture pool behavior as seen through the display: capacity, reuse, eviction, validation.

mod common;

use std::thread;
use std::time::Duration;

use common::{Call, MockOptions, harness_with, running, sync};
use gl_display::{
    CropRect, DEFAULT_POOL_CAPACITY, DisplayConfig, DisplayError, DisplayState, FrameRequest,
    TextureSpec, VideoFormat,
};

fn rgba(width: u32, height: u32) -> FrameRequest {
    FrameRequest::new(VideoFormat::Rgba, width, height)
}

#[test]
fn thirty_third_allocation_waits_for_a_release() {
    let harness = running(DEFAULT_POOL_CAPACITY);
    let display = harness.display.clone();

    let mut held: Vec<_> = (0..DEFAULT_POOL_CAPACITY)
        .map(|_| display.allocate_frame_with(&rgba(64, 64)).unwrap())
        .collect();
    assert_eq!(display.allocated_textures(), DEFAULT_POOL_CAPACITY);

    let waiter = {
        let display = display.clone();
        thread::spawn(move || display.allocate_frame_with(&rgba(64, 64)))
    };
    thread::sleep(Duration::from_millis(100));
    assert!(!waiter.is_finished());
    assert_eq!(display.allocated_textures(), DEFAULT_POOL_CAPACITY);

    let released = held.pop().unwrap();
    let released_texture = released.texture_id();
    drop(released);

    let frame = waiter.join().unwrap().unwrap();
    assert_eq!(frame.texture_id(), released_texture);
    assert_eq!(display.allocated_textures(), DEFAULT_POOL_CAPACITY);
    assert_eq!(
        harness
            .log
            .count(|call| matches!(call, Call::CreateTexture { .. })),
        DEFAULT_POOL_CAPACITY
    );
}

#[test]
fn new_geometry_at_capacity_evicts_a_released_texture() {
    let harness = running(DEFAULT_POOL_CAPACITY);
    let display = harness.display.clone();

    let mut held: Vec<_> = (1..=DEFAULT_POOL_CAPACITY as u32)
        .map(|height| display.allocate_frame_with(&rgba(64, height)).unwrap())
        .collect();
    assert_eq!(display.allocated_textures(), DEFAULT_POOL_CAPACITY);

    let waiter = {
        let display = display.clone();
        thread::spawn(move || display.allocate_frame_with(&rgba(64, 100)))
    };
    thread::sleep(Duration::from_millis(100));
    assert!(!waiter.is_finished());
    assert_eq!(display.allocated_textures(), DEFAULT_POOL_CAPACITY);

    let released = held.remove(0);
    let released_texture = released.texture_id().unwrap();
    drop(released);

    let frame = waiter.join().unwrap().unwrap();
    sync(&display);
    assert_eq!(frame.spec(), TextureSpec::new(VideoFormat::Rgba, 64, 100));
    assert_ne!(frame.texture_id(), Some(released_texture));
    assert_eq!(display.allocated_textures(), DEFAULT_POOL_CAPACITY);
    assert_eq!(display.free_textures(), 0);

    let calls = harness.log.calls();
    assert!(calls.contains(&Call::DeleteTexture(released_texture)));
    assert_eq!(
        calls
            .iter()
            .filter(|call| matches!(call, Call::CreateTexture { .. }))
            .count(),
        DEFAULT_POOL_CAPACITY + 1
    );
    assert_eq!(harness.platform.frees(), 1);
    assert_eq!(harness.log.foreign_calls(), 0);
}

#[test]
fn released_texture_is_reused_for_the_same_geometry() {
    let harness = running(4);
    let display = &harness.display;

    let first = display.allocate_frame_with(&rgba(64, 64)).unwrap();
    let texture = first.texture_id().unwrap();
    drop(first);
    assert_eq!(display.free_textures(), 1);

    let second = display.allocate_frame_with(&rgba(64, 64)).unwrap();
    assert_eq!(second.texture_id(), Some(texture));
    assert_eq!(harness.platform.allocations(), 1);
    assert_eq!(
        harness
            .log
            .count(|call| matches!(call, Call::CreateTexture { .. })),
        1
    );
}

#[test]
fn geometry_change_evicts_stale_free_textures() {
    let harness = running(2);
    let display = &harness.display;

    let kept = display.allocate_frame_with(&rgba(64, 64)).unwrap();
    let stale = display.allocate_frame_with(&rgba(64, 64)).unwrap();
    let stale_texture = stale.texture_id().unwrap();
    drop(stale);
    assert_eq!(display.allocated_textures(), 2);

    let resized = display.allocate_frame_with(&rgba(128, 64)).unwrap();
    sync(display);

    assert_eq!(resized.spec(), TextureSpec::new(VideoFormat::Rgba, 128, 64));
    assert!(
        harness
            .log
            .calls()
            .contains(&Call::DeleteTexture(stale_texture))
    );
    assert_eq!(display.allocated_textures(), 2);
    assert_eq!(display.free_textures(), 0);
    assert_eq!(harness.platform.frees(), 1);
    drop(kept);
}

#[test]
fn unsupported_format_is_rejected_without_allocating() {
    let harness = running(4);
    let display = &harness.display;

    for (format, width, height) in [
        (VideoFormat::Yuy2, 64, 64),
        (VideoFormat::Nv12, 640, 480),
        (VideoFormat::Rgba, 630, 480),
    ] {
        let err = display
            .allocate_frame(format, width, height, CropRect::default())
            .unwrap_err();
        assert!(matches!(err, DisplayError::Unsupported { .. }), "{err}");
    }
    assert_eq!(harness.platform.allocations(), 0);
    assert_eq!(display.allocated_textures(), 0);
    assert!(display.is_alive());
}

#[test]
fn allocator_refusal_surfaces_as_allocation_failure() {
    let harness = running(4);
    let display = &harness.display;

    let request = FrameRequest::new(VideoFormat::Yuy2, 64, 64).with_capability_check(false);
    assert!(matches!(
        display.allocate_frame_with(&request),
        Err(DisplayError::AllocationFailed)
    ));
    assert_eq!(harness.platform.allocations(), 1);
    assert_eq!(display.allocated_textures(), 0);
    assert!(display.is_alive());
}

#[test]
fn declared_payload_size_must_match_the_format() {
    let harness = running(4);
    let display = &harness.display;

    let wrong = rgba(64, 64).with_expected_size(64 * 64 * 3);
    match display.allocate_frame_with(&wrong) {
        Err(DisplayError::SizeMismatch {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 64 * 64 * 4);
            assert_eq!(actual, 64 * 64 * 3);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(harness.platform.allocations(), 0);

    let right = rgba(64, 64).with_expected_size(64 * 64 * 4);
    assert!(display.allocate_frame_with(&right).is_ok());
}

#[test]
fn yuv_geometry_is_aligned_and_padding_cropped() {
    let harness = harness_with(
        DisplayConfig::default().with_capability_check(false),
        MockOptions::default(),
    );
    let display = &harness.display;
    display.create_context(None).unwrap();

    let frame = display
        .allocate_frame(VideoFormat::I420, 62, 33, CropRect::default())
        .unwrap();
    assert_eq!((frame.width(), frame.height()), (64, 34));
    assert_eq!(
        frame.crop(),
        CropRect {
            left: 0,
            top: 0,
            right: 2,
            bottom: 1,
        }
    );
}

#[test]
fn destroy_releases_a_blocked_allocation() {
    let harness = running(1);
    let display = harness.display.clone();

    let held = display.allocate_frame_with(&rgba(64, 64)).unwrap();
    let waiter = {
        let display = display.clone();
        thread::spawn(move || display.allocate_frame_with(&rgba(64, 64)))
    };
    thread::sleep(Duration::from_millis(50));
    assert!(!waiter.is_finished());

    display.destroy_context();
    assert!(waiter.join().unwrap().is_err());
    assert_eq!(display.state(), DisplayState::Terminated);

    // the context is gone: only the CPU image is freed, no GPU call is made
    let frees_before = harness.platform.frees();
    drop(held);
    assert_eq!(harness.platform.frees(), frees_before + 1);
    assert_eq!(harness.log.foreign_calls(), 0);
}
