//! Integration tests for overlay blending through the output port.
//!
//! Exercises vidout-overlay layers and events against frames presented by
//! vidout-port, in both sink-managed and software blending modes.

use std::sync::Arc;
use vidout_core::{Capabilities, FrameFlags, IRect, PixelFormat, Pts, StreamOrigin};
use vidout_overlay::{
    ArgbLayer, Clut, Highlight, OverlayEvent, OverlayKind, OverlayLayer, RleImage,
};
use vidout_port::{shared, ManualClock, MemorySink, OutputPort, OverlayCall, PortConfig, SinkLog};

const WHITE_YCRCB: u32 = 0xeb_8080;
const BLACK_YCRCB: u32 = 0x10_8080;

// ── Helpers ────────────────────────────────────────────────────

fn port_on(sink: MemorySink) -> (OutputPort, Arc<ManualClock>, SinkLog) {
    let log = sink.log();
    let clock = Arc::new(ManualClock::new(Pts::ZERO));
    let port = OutputPort::new(shared(sink), clock.clone(), PortConfig::default()).unwrap();
    (port, clock, log)
}

fn present_at(port: &OutputPort, clock: &ManualClock, vpts: i64) {
    let frame = port
        .get_frame(32, 16, 0.0, PixelFormat::Yv12, FrameFlags::NONE)
        .unwrap();
    frame.data_mut().unwrap().vpts = Pts(vpts);
    port.submit(frame, StreamOrigin::Anonymous).unwrap();
    clock.set(Pts(vpts));
    port.display_due().unwrap();
}

/// 4x2 subtitle block, every pixel palette index 1.
fn block(x: i32) -> OverlayLayer {
    let image = RleImage::encode(4, 2, &[1; 8]).unwrap();
    let clut = Clut::from_entries(false, &[(0, 0), (WHITE_YCRCB, 15)]);
    OverlayLayer::rle(image, x, 0, clut).unscaled()
}

// ── Blend order ────────────────────────────────────────────────

#[test]
fn persistent_sink_sees_layers_in_handle_order() {
    let (port, clock, log) = port_on(MemorySink::new().with_persistent_overlays());
    assert!(port
        .capabilities()
        .contains(Capabilities::PERSISTENT_OVERLAY));

    let manager = port.overlay_manager();
    let handles: Vec<_> = (0..4)
        .map(|_| manager.get_handle(OverlayKind::Osd).unwrap())
        .collect();
    // posted as {3, 1, 2}
    for i in [3usize, 1, 2] {
        manager
            .add_event(OverlayEvent::show(Pts::ZERO, handles[i], block(i as i32)))
            .unwrap();
    }

    present_at(&port, &clock, 0);
    assert_eq!(
        log.overlay_calls(),
        vec![
            OverlayCall::Begin { changed: true },
            OverlayCall::Blend { x: 1, y: 0 },
            OverlayCall::Blend { x: 2, y: 0 },
            OverlayCall::Blend { x: 3, y: 0 },
            OverlayCall::End,
        ]
    );

    log.clear();
    present_at(&port, &clock, 3600);
    assert_eq!(
        log.overlay_calls().first(),
        Some(&OverlayCall::Begin { changed: false })
    );
}

// ── Software blending ──────────────────────────────────────────

#[test]
fn software_blend_writes_palette_colors() {
    let (port, clock, log) = port_on(MemorySink::new().with_pixel_capture());
    let manager = port.overlay_manager();
    let handle = manager.get_handle(OverlayKind::Subtitle).unwrap();
    let layer = block(0).with_highlight(Highlight {
        rect: IRect::new(0, 0, 1, 1),
        clut: Clut::from_entries(false, &[(0, 0), (BLACK_YCRCB, 15)]),
    });
    manager
        .add_event(OverlayEvent::show(Pts::ZERO, handle, layer))
        .unwrap();

    present_at(&port, &clock, 0);
    let pixels = log.last_presentation().unwrap().pixels.unwrap();
    let luma = &pixels.planes[0];
    // highlight palette inside its rect, base palette outside
    assert_eq!(luma[0], 0x10);
    assert_eq!(luma[1], 0xeb);
    assert_eq!(luma[3], 0xeb);
    assert_eq!(luma[32 + 3], 0xeb);
    assert_ne!(luma[4], 0xeb);
}

#[test]
fn hidden_overlay_leaves_frames_clean() {
    let (port, clock, log) = port_on(MemorySink::new().with_pixel_capture());
    let manager = port.overlay_manager();
    let handle = manager.get_handle(OverlayKind::Subtitle).unwrap();
    manager
        .add_event(OverlayEvent::show(Pts::ZERO, handle, block(0)))
        .unwrap();
    manager
        .add_event(OverlayEvent::hide(Pts(3600), handle))
        .unwrap();

    present_at(&port, &clock, 0);
    assert_eq!(log.last_presentation().unwrap().pixels.unwrap().planes[0][0], 0xeb);

    present_at(&port, &clock, 3600);
    assert_ne!(log.last_presentation().unwrap().pixels.unwrap().planes[0][0], 0xeb);
    assert_eq!(manager.pending_events(), 0);
}

#[test]
fn disabled_overlays_are_not_drawn() {
    let (port, clock, log) = port_on(MemorySink::new().with_pixel_capture());
    let manager = port.overlay_manager();
    let handle = manager.get_handle(OverlayKind::Osd).unwrap();
    manager
        .add_event(OverlayEvent::show(Pts::ZERO, handle, block(0)))
        .unwrap();

    port.enable_overlay(false);
    present_at(&port, &clock, 0);
    assert_ne!(log.last_presentation().unwrap().pixels.unwrap().planes[0][0], 0xeb);

    // re-enabling redraws the still frame with the overlay
    port.enable_overlay(true);
    let report = port.display_due().unwrap();
    assert!(report.redrawn);
    assert_eq!(log.last_presentation().unwrap().pixels.unwrap().planes[0][0], 0xeb);
}

#[test]
fn overlay_event_on_still_frame_triggers_redraw() {
    let (port, clock, log) = port_on(MemorySink::new());
    present_at(&port, &clock, 0);
    assert_eq!(log.presented_count(), 1);

    let manager = port.overlay_manager();
    let handle = manager.get_handle(OverlayKind::Menu).unwrap();
    manager
        .add_event(OverlayEvent::show(Pts(100), handle, block(0)))
        .unwrap();
    assert!(!port.display_due().unwrap().redrawn);

    clock.set(Pts(100));
    let report = port.display_due().unwrap();
    assert!(report.redrawn);
    assert_eq!(report.overlays.layers_blended, 1);
}

// ── Shared ARGB surfaces ───────────────────────────────────────

#[test]
fn shared_argb_surface_outlives_first_release() {
    let (port, clock, _) = port_on(MemorySink::new().with_persistent_overlays());
    let manager = port.overlay_manager();
    let surface = ArgbLayer::new(8, 8);
    let first = manager.get_handle(OverlayKind::Osd).unwrap();
    let second = manager.get_handle(OverlayKind::Osd).unwrap();
    manager
        .add_event(OverlayEvent::show(
            Pts::ZERO,
            first,
            OverlayLayer::argb(surface.attach().unwrap(), 0, 0),
        ))
        .unwrap();
    manager
        .add_event(OverlayEvent::show(
            Pts::ZERO,
            second,
            OverlayLayer::argb(surface.attach().unwrap(), 8, 0),
        ))
        .unwrap();
    present_at(&port, &clock, 0);
    assert!(surface.ref_count() >= 2);

    manager.free_handle(first);
    assert!(!surface.is_disposed());
    assert!(surface.ref_count() >= 1);

    manager.free_handle(second);
    assert!(surface.is_disposed());
    assert_eq!(surface.ref_count(), 0);

    // retaining past the last release is a usage error
    assert!(surface.attach().unwrap_err().is_usage());
}

// ── RLE serialization ──────────────────────────────────────────

#[test]
fn rle_wire_form_reproduces_indices() {
    let indices: Vec<u8> = (0..64u32 * 8).map(|i| ((i / 5) % 4) as u8).collect();
    let image = RleImage::encode(64, 8, &indices).unwrap();

    let rebuilt = RleImage::from_bytes(&image.to_bytes()).unwrap();
    assert_eq!(rebuilt.decode().unwrap(), indices);

    let json = serde_json::to_string(&image).unwrap();
    let from_json: RleImage = serde_json::from_str(&json).unwrap();
    assert_eq!(from_json.decode().unwrap(), indices);
}
