//! Uploads: direct sub-image writes, CPU conversion into the platform image, and failures.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use common::{Call, MockOptions, harness_with, running};
use gl_display::{
    CropRect, DisplayConfig, DisplayError, Frame, TextureDescriptor, TextureHooks, TextureSpec,
    VideoFormat,
};

#[test]
fn native_formats_upload_directly() {
    let harness = running(4);
    let display = &harness.display;

    let frame = display
        .allocate_frame(VideoFormat::Bgra, 64, 64, CropRect::default())
        .unwrap();
    display
        .upload(&frame, Bytes::from(vec![0x40; 64 * 64 * 4]))
        .unwrap();

    assert!(harness.log.calls().contains(&Call::UploadSubImage {
        texture: frame.texture_id().unwrap(),
        len: 64 * 64 * 4,
    }));
    assert!(!frame.has_payload());
}

#[test]
fn padded_formats_are_converted_before_commit() {
    let harness = harness_with(
        DisplayConfig::default().with_capability_check(false),
        MockOptions::default(),
    );
    let display = &harness.display;
    display.create_context(None).unwrap();

    let frame = display
        .allocate_frame(VideoFormat::Rgbx, 64, 2, CropRect::default())
        .unwrap();
    let payload: Vec<u8> = [1u8, 2, 3, 9].repeat(64 * 2);
    display.upload(&frame, Bytes::from(payload)).unwrap();

    assert!(harness.log.calls().contains(&Call::CommitImage {
        texture: frame.texture_id().unwrap(),
        head: vec![1, 2, 3, 255, 1, 2, 3, 255],
    }));
    assert_eq!(
        harness
            .log
            .count(|call| matches!(call, Call::UploadSubImage { .. })),
        0
    );
}

#[test]
fn payload_size_is_checked_before_any_gpu_work() {
    let harness = running(4);
    let display = &harness.display;

    let frame = display
        .allocate_frame(VideoFormat::Bgra, 64, 64, CropRect::default())
        .unwrap();
    for len in [4, 64 * 64 * 4 - 1, 64 * 64 * 4 + 4] {
        match display.upload(&frame, Bytes::from(vec![0; len])) {
            Err(DisplayError::SizeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 64 * 64 * 4);
                assert_eq!(actual, len);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    assert!(!frame.has_payload());
    assert_eq!(
        harness.log.count(|call| matches!(
            call,
            Call::UploadSubImage { .. } | Call::CommitImage { .. }
        )),
        0
    );
    assert!(display.is_alive());
}

#[test]
fn upload_after_destroy_is_refused() {
    let harness = running(2);
    let display = &harness.display;

    let frame = display
        .allocate_frame(VideoFormat::Rgba, 32, 32, CropRect::default())
        .unwrap();
    display.destroy_context();

    assert!(matches!(
        display.upload(&frame, Bytes::from(vec![0; 32 * 32 * 4])),
        Err(DisplayError::NotAlive)
    ));
    assert!(!frame.has_payload());
}

struct NoTextures {
    asked: AtomicUsize,
}

impl TextureHooks for NoTextures {
    fn gen_texture(&self, _spec: &TextureSpec) -> Option<TextureDescriptor> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        None
    }

    fn del_texture(&self, descriptor: Option<TextureDescriptor>) {
        assert!(descriptor.is_none());
    }
}

#[test]
fn frames_without_texture_cannot_be_uploaded() {
    let harness = running(2);
    let hooks = Arc::new(NoTextures {
        asked: AtomicUsize::new(0),
    });
    let frame = Frame::with_hooks(VideoFormat::Rgba, 32, 32, CropRect::default(), hooks.clone());
    assert_eq!(hooks.asked.load(Ordering::SeqCst), 1);

    assert!(matches!(
        harness
            .display
            .upload(&frame, Bytes::from(vec![0; 32 * 32 * 4])),
        Err(DisplayError::NoTexture)
    ));
    assert_eq!(harness.log.count(|call| matches!(call, Call::UploadSubImage { .. })), 0);
}
