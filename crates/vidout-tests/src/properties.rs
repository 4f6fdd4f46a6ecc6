//! Integration tests for the port property contract and configuration.

use std::sync::Arc;
use vidout_core::{Capabilities, FrameFlags, PixelFormat, PropertyId, Pts, StreamId, StreamOrigin};
use vidout_port::{shared, HostEvent, ManualClock, MemorySink, OutputPort, PortConfig};

fn port_on(sink: MemorySink) -> OutputPort {
    OutputPort::new(
        shared(sink),
        Arc::new(ManualClock::new(Pts::ZERO)),
        PortConfig::default(),
    )
    .unwrap()
}

// ── Clamping ───────────────────────────────────────────────────

#[test]
fn out_of_range_sets_are_clamped_and_read_back() {
    let port = port_on(MemorySink::new());
    let cases = [
        (PropertyId::Hue, 70_000),
        (PropertyId::Saturation, -1),
        (PropertyId::Contrast, 40_000),
        (PropertyId::ZoomX, -200),
        (PropertyId::ZoomY, 401),
        (PropertyId::AspectRatio, 9),
        (PropertyId::Interlaced, 1),
    ];
    for (id, requested) in cases {
        let (min, max) = port.property_range(id).unwrap();
        let applied = port.set_property(id, requested).unwrap();
        assert_eq!(applied, requested.clamp(min, max), "{:?}", id);
        assert_eq!(port.get_property(id).unwrap(), applied, "{:?}", id);
    }
}

// ── Capability mismatches ──────────────────────────────────────

#[test]
fn unadvertised_properties_are_unsupported() {
    let port = port_on(MemorySink::new().with_capabilities(Capabilities::YV12));
    for id in [
        PropertyId::Hue,
        PropertyId::ZoomX,
        PropertyId::Gamma,
        PropertyId::Sharpness,
        PropertyId::Colorkey,
    ] {
        assert!(port.get_property(id).unwrap_err().is_unsupported(), "{:?}", id);
        assert!(port.set_property(id, 1).unwrap_err().is_unsupported(), "{:?}", id);
    }
}

#[test]
fn read_only_properties_reject_writes() {
    let port = port_on(MemorySink::new());
    for id in PropertyId::ALL.iter().copied().filter(|id| id.is_read_only()) {
        let err = port.set_property(id, 1).unwrap_err();
        assert!(err.is_unsupported(), "{:?} accepted a write", id);
    }
    assert_eq!(port.get_property(PropertyId::MaxVideoWidth).unwrap(), 4096);
}

#[test]
fn window_geometry_follows_host_events() {
    let port = port_on(MemorySink::new());
    port.gui_data_exchange(HostEvent::Resize {
        width: 800,
        height: 600,
    })
    .unwrap();
    assert_eq!(port.get_property(PropertyId::WindowWidth).unwrap(), 800);
    assert_eq!(port.get_property(PropertyId::WindowHeight).unwrap(), 600);
    assert!(port
        .gui_data_exchange(HostEvent::Custom {
            kind: 3,
            payload: vec![]
        })
        .unwrap_err()
        .is_unsupported());
}

// ── Port-managed counters ──────────────────────────────────────

#[test]
fn buffer_counters_track_the_pool() {
    let port = port_on(MemorySink::new());
    assert_eq!(port.get_property(PropertyId::BufsTotal).unwrap(), 15);
    assert_eq!(port.get_property(PropertyId::BufsFree).unwrap(), 15);

    let frames: Vec<_> = (0..3)
        .map(|_| {
            port.get_frame(16, 16, 0.0, PixelFormat::Yv12, FrameFlags::NONE)
                .unwrap()
        })
        .collect();
    assert_eq!(port.get_property(PropertyId::BufsFree).unwrap(), 12);

    for frame in frames {
        port.submit(frame, StreamOrigin::Anonymous).unwrap();
    }
    assert_eq!(port.get_property(PropertyId::BufsInFifo).unwrap(), 3);
    port.flush();
    assert_eq!(port.get_property(PropertyId::BufsInFifo).unwrap(), 0);
    assert_eq!(port.get_property(PropertyId::BufsFree).unwrap(), 15);
}

#[test]
fn discard_frames_nests() {
    let port = port_on(MemorySink::new());
    assert_eq!(port.set_property(PropertyId::DiscardFrames, 1).unwrap(), 1);
    assert_eq!(port.set_property(PropertyId::DiscardFrames, 1).unwrap(), 2);
    assert_eq!(port.set_property(PropertyId::DiscardFrames, 0).unwrap(), 1);
    assert_eq!(port.set_property(PropertyId::DiscardFrames, 0).unwrap(), 0);
    // never goes below zero
    assert_eq!(port.set_property(PropertyId::DiscardFrames, 0).unwrap(), 0);
}

#[test]
fn num_streams_counts_distinct_origins() {
    let port = port_on(MemorySink::new());
    port.open(StreamOrigin::Stream(StreamId(1)));
    port.open(StreamOrigin::Stream(StreamId(2)));
    port.open(StreamOrigin::Anonymous);
    assert_eq!(port.get_property(PropertyId::NumStreams).unwrap(), 3);
    port.close(StreamOrigin::Anonymous).unwrap();
    assert_eq!(port.get_property(PropertyId::NumStreams).unwrap(), 2);
}

// ── Concurrency ────────────────────────────────────────────────

#[test]
fn properties_are_safe_across_threads() {
    let port = Arc::new(port_on(MemorySink::new()));
    let writers: Vec<_> = (0..4)
        .map(|t| {
            let port = Arc::clone(&port);
            std::thread::spawn(move || {
                for i in 0..200 {
                    let value = (t * 1000 + i) * 100;
                    let applied = port.set_property(PropertyId::Brightness, value).unwrap();
                    assert!((0..=65535).contains(&applied));
                    let read = port.get_property(PropertyId::Brightness).unwrap();
                    assert!((0..=65535).contains(&read));
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
}

// ── Configuration ──────────────────────────────────────────────

#[test]
fn config_file_drives_port_limits() {
    let path =
        std::env::temp_dir().join(format!("vidout-it-config-{}.json", std::process::id()));
    let config = PortConfig {
        num_frames: 5,
        ..Default::default()
    };
    config.save_to_file(&path).unwrap();
    let loaded = PortConfig::load_from_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let port = OutputPort::new(
        shared(MemorySink::new()),
        Arc::new(ManualClock::default()),
        loaded,
    )
    .unwrap();
    assert_eq!(port.get_property(PropertyId::MaxNumFrames).unwrap(), 5);
    assert_eq!(port.property_range(PropertyId::BufsFree).unwrap(), (0, 5));
}
