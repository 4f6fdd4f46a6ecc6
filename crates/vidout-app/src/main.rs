//! VidOut - Synthetic playback through an output port
//!
//! Decodes a generated test pattern on a worker thread, pushes it through an
//! output port bound to the in-memory sink, and shows a subtitle for the
//! first half of the clip.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vidout_core::{FrameFlags, PixelFormat, Pts, StreamId, StreamOrigin, VideoOutError};
use vidout_overlay::{Clut, OverlayEvent, OverlayKind, OverlayLayer, RleImage};
use vidout_port::{shared, MemorySink, OutputPort, PortConfig, SystemClock};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;
const FRAME_COUNT: i64 = 100;

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("VidOut starting...");

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => PortConfig::load_from_file(&path)
            .with_context(|| format!("loading port config {}", path.display()))?,
        None => PortConfig::default(),
    };

    let sink = MemorySink::new();
    let log = sink.log();
    let clock = Arc::new(SystemClock::new());
    let port = Arc::new(OutputPort::new(shared(sink), clock, config)?);
    let output = port.spawn_output_thread()?;

    let origin = StreamOrigin::Stream(StreamId(1));
    port.open(origin);

    let frame_duration = port.config().default_frame_duration;
    let clip_length = Pts(frame_duration.ticks() * FRAME_COUNT);
    show_subtitle(&port, Pts(clip_length.ticks() / 2))?;

    let decoder = {
        let port = Arc::clone(&port);
        std::thread::Builder::new()
            .name("vidout-decoder".into())
            .spawn(move || decode(&port, origin, frame_duration))?
    };
    let skipped = decoder
        .join()
        .map_err(|_| anyhow::anyhow!("decoder thread panicked"))??;

    // let the queue run dry before tearing down
    while port.queued_frames() > 0 {
        std::thread::sleep(frame_duration.to_duration());
    }
    output.stop();
    port.close(origin)?;
    port.exit();

    let stats = port.pool_stats();
    info!(
        "presented {} frames, skipped {}, pool {}/{} frames allocated",
        log.presented_count(),
        skipped,
        stats.total,
        stats.ceiling
    );
    Ok(())
}

/// Register a subtitle box shown from the start until `until`.
fn show_subtitle(port: &OutputPort, until: Pts) -> Result<()> {
    let (w, h) = (WIDTH / 2, 24);
    let indices: Vec<u8> = (0..w * h)
        .map(|i| u8::from(i % w > 2 && i % w < w - 3))
        .collect();
    let image = RleImage::encode(w, h, &indices)?;
    // YCrCb palette: transparent, then opaque white
    let clut = Clut::from_entries(false, &[(0x00_8080, 0), (0xeb_8080, 15)]);
    let layer = OverlayLayer::rle(image, (WIDTH / 4) as i32, (HEIGHT - 40) as i32, clut);

    let manager = port.overlay_manager();
    let handle = manager.get_handle(OverlayKind::Subtitle)?;
    manager.add_event(OverlayEvent::show(Pts::ZERO, handle, layer))?;
    manager.add_event(OverlayEvent::hide(until, handle))?;
    Ok(())
}

/// Produce the test pattern, honoring the port's skip advice.
fn decode(port: &OutputPort, origin: StreamOrigin, duration: Pts) -> Result<u32> {
    let mut skipped = 0;
    let mut to_skip = 0;
    for n in 0..FRAME_COUNT {
        if to_skip > 0 {
            to_skip -= 1;
            skipped += 1;
            continue;
        }
        let frame = match port.get_frame(
            WIDTH,
            HEIGHT,
            4.0 / 3.0,
            PixelFormat::Yv12,
            FrameFlags::NONE,
        ) {
            Ok(frame) => frame,
            Err(VideoOutError::PortClosed) => break,
            Err(e) => return Err(e.into()),
        };
        {
            let mut data = frame.data_mut()?;
            data.vpts = Pts(duration.ticks() * n);
            data.duration = duration;
            data.progressive_frame = true;
            let luma = &mut data.image.planes[0];
            for y in 0..HEIGHT {
                let row = luma.row_mut(y);
                for (x, px) in row.iter_mut().enumerate() {
                    *px = ((x as i64 + y as i64 + n * 4) % 220 + 16) as u8;
                }
            }
        }
        to_skip = port.submit(frame, origin)?;
        if to_skip > 0 {
            warn!("decoder behind at frame {}, skipping {}", n, to_skip);
        }
    }
    Ok(skipped)
}
