//! Output port: the generic layer between decoders and a sink.
//!
//! Decoders get frames from the port's pool, fill them and submit them.
//! Submitted frames wait in a display queue until their vpts is due; the
//! display stage (driven by [`OutputThread`] or by calling
//! [`OutputPort::display_due`]) blends overlays and hands frames to the sink.
//!
//! Lock order: the sink lock is taken before any frame data lock. The only
//! exception is pool reformatting, which touches a free slot nobody else can
//! reach.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};
use vidout_core::{
    Capabilities, FrameFlags, FrameFormat, PixelFormat, PropertyId, Pts, Result, StreamOrigin,
    VideoOutError,
};
use vidout_overlay::{BlendStats, OverlayManager};

use crate::clock::Clock;
use crate::config::PortConfig;
use crate::frame::Frame;
use crate::pool::{FramePool, PoolStats};
use crate::sink::{GrabbedImage, HostEvent, SharedSink, SINK_INTERFACE_VERSION};
use crate::skip::SkipPolicy;

/// What a stream sees when it asks about the port. For UI feedback only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortStatus {
    pub open: bool,
    pub width: u32,
    pub height: u32,
    pub duration: Pts,
}

/// Outcome of one display pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayReport {
    /// Id of the frame handed to the sink, if any.
    pub presented: Option<u32>,
    /// Due frames dropped for exceeding the late-frame limit.
    pub dropped_late: usize,
    /// Due frames replaced by a newer due frame in the same pass.
    pub superseded: usize,
    /// The last frame was shown again.
    pub redrawn: bool,
    pub overlays: BlendStats,
}

#[derive(Default)]
struct PortState {
    streams: HashMap<StreamOrigin, u32>,
    width: u32,
    height: u32,
    duration: Pts,
    discard_frames: i32,
    redraw_requested: bool,
    last_pts: Pts,
}

#[derive(Default)]
struct DisplayState {
    /// Popped from the queue but not yet due.
    held: Option<Frame>,
    /// Last presented frame, without overlays.
    last: Option<Frame>,
}

/// Generic video output port.
pub struct OutputPort {
    sink: SharedSink,
    clock: Arc<dyn Clock>,
    config: PortConfig,
    skip: SkipPolicy,
    capabilities: Capabilities,
    pool: FramePool,
    overlays: Arc<OverlayManager>,
    queue_tx: Sender<Frame>,
    queue_rx: Receiver<Frame>,
    state: Mutex<PortState>,
    display: Mutex<DisplayState>,
    overlay_enabled: AtomicBool,
    exiting: AtomicBool,
}

impl OutputPort {
    /// Bind `sink` to a new port. Fails if the sink was written against a
    /// different interface revision.
    pub fn new(sink: SharedSink, clock: Arc<dyn Clock>, config: PortConfig) -> Result<Self> {
        config.validate()?;

        let capabilities = {
            let mut s = sink.lock();
            let found = s.interface_version();
            if found != SINK_INTERFACE_VERSION {
                return Err(VideoOutError::InterfaceVersion {
                    expected: SINK_INTERFACE_VERSION,
                    found,
                });
            }
            let mut caps = s.capabilities();
            if s.overlay_target().is_some() {
                caps |= Capabilities::PERSISTENT_OVERLAY;
            }
            caps
        };

        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        let pool = FramePool::new(Arc::clone(&sink), config.num_frames);
        let overlays = Arc::new(OverlayManager::new(config.max_overlay_handles));
        info!(
            "output port opened: {} frames, capabilities {:#010x}",
            config.num_frames,
            capabilities.bits()
        );

        Ok(Self {
            sink,
            clock,
            skip: config.skip_policy(),
            config,
            capabilities,
            pool,
            overlays,
            queue_tx,
            queue_rx,
            state: Mutex::new(PortState::default()),
            display: Mutex::new(DisplayState::default()),
            overlay_enabled: AtomicBool::new(true),
            exiting: AtomicBool::new(false),
        })
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    // ── Sessions ────────────────────────────────────────────────

    /// Register a user of the port. Origins are counted.
    pub fn open(&self, origin: StreamOrigin) {
        let mut state = self.state.lock();
        *state.streams.entry(origin).or_insert(0) += 1;
        info!("port opened by {:?}", origin);
    }

    /// Unregister one `open` of `origin`.
    pub fn close(&self, origin: StreamOrigin) -> Result<()> {
        let mut state = self.state.lock();
        match state.streams.get_mut(&origin) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                state.streams.remove(&origin);
            }
            None => {
                return Err(VideoOutError::InvalidParameter(format!(
                    "{:?} has not opened this port",
                    origin
                )))
            }
        }
        info!("port closed by {:?}", origin);
        Ok(())
    }

    pub fn status(&self, origin: StreamOrigin) -> PortStatus {
        let state = self.state.lock();
        PortStatus {
            open: state.streams.contains_key(&origin),
            width: state.width,
            height: state.height,
            duration: state.duration,
        }
    }

    // ── Frame flow ──────────────────────────────────────────────

    /// Acquire a frame for decoding. Blocks while the pool is exhausted.
    pub fn get_frame(
        &self,
        width: u32,
        height: u32,
        ratio: f64,
        format: PixelFormat,
        flags: FrameFlags,
    ) -> Result<Frame> {
        if self.exiting.load(Ordering::Acquire) {
            return Err(VideoOutError::PortClosed);
        }
        // exit() may close the pool while this call waits on it
        self.pool.acquire_unless_closed(&FrameFormat {
            width,
            height,
            ratio,
            format,
            flags,
        })
    }

    /// Queue a filled frame for display.
    ///
    /// Returns how many upcoming frames the caller should skip to catch up.
    pub fn submit(&self, frame: Frame, origin: StreamOrigin) -> Result<u32> {
        if self.exiting.load(Ordering::Acquire) {
            return Err(VideoOutError::PortClosed);
        }

        let (vpts, duration, width, height) = {
            let mut data = frame.slot().data_mut();
            data.origin = origin;
            data.drawn = true;
            let duration = if data.duration.ticks() > 0 {
                data.duration
            } else {
                self.config.default_frame_duration
            };
            (data.vpts, duration, data.image.width, data.image.height)
        };

        let lateness = self.clock.now() - vpts;
        let skip = self.skip.frames_to_skip(lateness, duration);
        if skip > 0 {
            debug!("frame {} is {} late, skipping {}", frame.id(), lateness, skip);
        }

        let discard = {
            let mut state = self.state.lock();
            state.width = width;
            state.height = height;
            state.duration = duration;
            state.discard_frames > 0
        };

        self.sink.lock().process_frame(&frame);

        if discard {
            debug!("discarding frame {}", frame.id());
            return Ok(skip);
        }
        self.queue_tx
            .send(frame)
            .map_err(|_| VideoOutError::PortClosed)?;
        Ok(skip)
    }

    /// Drop every queued frame without presenting it. Returns how many.
    pub fn flush(&self) -> usize {
        let mut display = self.display.lock();
        let mut flushed = usize::from(display.held.take().is_some());
        flushed += self.queue_rx.try_iter().count();
        if flushed > 0 {
            debug!("flushed {} queued frames", flushed);
        }
        flushed
    }

    /// Ask for the last frame to be shown again on the next display pass.
    pub fn trigger_drawing(&self) {
        self.state.lock().redraw_requested = true;
    }

    /// Frames waiting in the display queue.
    pub fn queued_frames(&self) -> usize {
        let held = usize::from(self.display.lock().held.is_some());
        held + self.queue_rx.len()
    }

    /// One display pass: present the newest due frame, or redraw the last
    /// one if anything asked for it.
    pub fn display_due(&self) -> Result<DisplayReport> {
        if self.exiting.load(Ordering::Acquire) {
            return Err(VideoOutError::PortClosed);
        }
        let now = self.clock.now();
        let mut report = DisplayReport::default();
        let mut display = self.display.lock();

        let mut due: Option<Frame> = None;
        loop {
            let next = match display.held.take() {
                Some(frame) => frame,
                None => match self.queue_rx.try_recv() {
                    Ok(frame) => frame,
                    Err(_) => break,
                },
            };
            let vpts = next.data().vpts;
            if vpts > now {
                display.held = Some(next);
                break;
            }
            if now - vpts > self.config.drop_late_frames_after {
                debug!("dropping frame {}: {} late", next.id(), now - vpts);
                report.dropped_late += 1;
                continue;
            }
            if due.replace(next).is_some() {
                report.superseded += 1;
            }
        }

        let sink_redraw = self.sink.lock().redraw_needed();
        let requested = std::mem::take(&mut self.state.lock().redraw_requested);

        if let Some(frame) = due {
            let vpts = frame.data().vpts;
            display.last = Some(frame.retain());
            let (shown, stats) = self.blend_overlays(frame, vpts)?;
            report.presented = Some(shown.id());
            report.overlays = stats;
            self.state.lock().last_pts = vpts;
            self.sink.lock().display_frame(shown);
            return Ok(report);
        }

        let Some(last) = display.last.as_ref() else {
            return Ok(report);
        };
        if requested || sink_redraw || self.overlays.redraw_needed(now) {
            let (shown, stats) = self.blend_overlays(last.retain(), now)?;
            debug!("redrawing frame {}", last.id());
            report.presented = Some(shown.id());
            report.overlays = stats;
            report.redrawn = true;
            self.sink.lock().display_frame(shown);
        }
        Ok(report)
    }

    /// Blend the overlays visible at `vpts`. Returns the frame to present,
    /// which is a copy when `frame` is shared.
    fn blend_overlays(&self, frame: Frame, vpts: Pts) -> Result<(Frame, BlendStats)> {
        if !self.overlay_enabled.load(Ordering::Acquire) {
            self.overlays.has_visible(vpts);
            self.overlays.take_changed();
            return Ok((frame, BlendStats::default()));
        }

        {
            let mut sink = self.sink.lock();
            if let Some(target) = sink.overlay_target() {
                let mut data = frame.slot().data_mut();
                let stats =
                    self.overlays
                        .multiple_overlay_blend(vpts, Some(target), &mut data.image, true);
                drop(data);
                return Ok((frame, stats));
            }
        }

        if !self.overlays.has_visible(vpts) {
            self.overlays.take_changed();
            return Ok((frame, BlendStats::default()));
        }

        let target = if frame.ref_count() > 1 {
            match self.duplicate(&frame)? {
                Some(copy) => copy,
                None => {
                    warn!(
                        "no free frame to blend overlays onto frame {}; presenting without",
                        frame.id()
                    );
                    return Ok((frame, BlendStats::default()));
                }
            }
        } else {
            frame
        };

        let stats = {
            let mut data = target.slot().data_mut();
            self.overlays
                .multiple_overlay_blend(vpts, None, &mut data.image, true)
        };
        Ok((target, stats))
    }

    /// Copy `frame` into a fresh pool frame, if one is free.
    fn duplicate(&self, frame: &Frame) -> Result<Option<Frame>> {
        let format = frame.data().format();
        let Some(copy) = self.pool.try_acquire(&format)? else {
            return Ok(None);
        };
        {
            let mut sink = self.sink.lock();
            let src = frame.data();
            let mut dst = copy.slot().data_mut();
            sink.duplicate_frame_data(&mut dst, &src)?;
        }
        debug!("duplicated frame {} into {}", frame.id(), copy.id());
        Ok(Some(copy))
    }

    /// Another reference to the last presented frame, without overlays.
    pub fn get_last_frame(&self) -> Option<Frame> {
        self.display.lock().last.as_ref().map(Frame::retain)
    }

    /// Snapshot of the last presented frame.
    pub fn grab_frame(&self) -> Result<GrabbedImage> {
        let last = self
            .get_last_frame()
            .ok_or_else(|| VideoOutError::Unsupported("no frame has been displayed".into()))?;
        let mut sink = self.sink.lock();
        let data = last.data();
        sink.grab_frame(&data)
    }

    // ── Overlays ────────────────────────────────────────────────

    pub fn enable_overlay(&self, enabled: bool) {
        let was = self.overlay_enabled.swap(enabled, Ordering::AcqRel);
        if was != enabled {
            self.trigger_drawing();
        }
    }

    pub fn overlay_enabled(&self) -> bool {
        self.overlay_enabled.load(Ordering::Acquire)
    }

    pub fn overlay_manager(&self) -> Arc<OverlayManager> {
        Arc::clone(&self.overlays)
    }

    // ── Properties ──────────────────────────────────────────────

    pub fn get_property(&self, id: PropertyId) -> Result<i32> {
        if id.is_port_managed() {
            let state = self.state.lock();
            let pool = self.pool.stats();
            return Ok(match id {
                PropertyId::DiscardFrames => state.discard_frames,
                PropertyId::BufsInFifo => {
                    drop(state);
                    self.queued_frames() as i32
                }
                PropertyId::NumStreams => state.streams.len() as i32,
                PropertyId::BufsTotal | PropertyId::MaxNumFrames => pool.ceiling as i32,
                PropertyId::BufsFree => (pool.ceiling - pool.outstanding) as i32,
                // LastPts; wire values are 32 bits wide and saturate
                _ => state
                    .last_pts
                    .ticks()
                    .clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            });
        }
        self.check_capability(id)?;
        self.sink.lock().get_property(id)
    }

    /// Clamp `value` to the advertised range and apply it. Returns the
    /// value actually applied.
    pub fn set_property(&self, id: PropertyId, value: i32) -> Result<i32> {
        if id.is_read_only() || id == PropertyId::MaxNumFrames {
            return Err(VideoOutError::ReadOnlyProperty(id));
        }
        match id {
            PropertyId::DiscardFrames => {
                let count = {
                    let mut state = self.state.lock();
                    if value != 0 {
                        state.discard_frames += 1;
                    } else if state.discard_frames > 0 {
                        state.discard_frames -= 1;
                    }
                    state.discard_frames
                };
                if count > 0 {
                    self.flush();
                }
                Ok(count)
            }
            PropertyId::LastPts => {
                self.state.lock().last_pts = Pts(value as i64);
                Ok(value)
            }
            _ => {
                self.check_capability(id)?;
                let mut sink = self.sink.lock();
                let (min, max) = sink.property_range(id)?;
                sink.set_property(id, value.clamp(min, max))
            }
        }
    }

    /// Inclusive `(min, max)` of a property.
    pub fn property_range(&self, id: PropertyId) -> Result<(i32, i32)> {
        if id.is_port_managed() {
            let ceiling = self.pool.ceiling() as i32;
            return Ok(match id {
                PropertyId::BufsInFifo | PropertyId::BufsTotal | PropertyId::BufsFree => {
                    (0, ceiling)
                }
                PropertyId::MaxNumFrames => (ceiling, ceiling),
                PropertyId::LastPts => (i32::MIN, i32::MAX),
                _ => (0, i32::MAX),
            });
        }
        self.check_capability(id)?;
        self.sink.lock().property_range(id)
    }

    fn check_capability(&self, id: PropertyId) -> Result<()> {
        match id.required_capability() {
            Some(cap) if !self.capabilities.contains(cap) => {
                Err(VideoOutError::UnsupportedProperty(id))
            }
            _ => Ok(()),
        }
    }

    // ── Host channel and teardown ───────────────────────────────

    pub fn gui_data_exchange(&self, event: HostEvent) -> Result<i32> {
        self.sink.lock().gui_data_exchange(event)
    }

    /// Shut the port down without waiting for outstanding frames. They are
    /// disposed as their holders release them.
    pub fn exit(&self) {
        if self.exiting.swap(true, Ordering::AcqRel) {
            return;
        }
        let flushed = self.flush();
        self.display.lock().last = None;
        self.overlays.flush_events();
        self.pool.close();
        info!("output port exited ({} queued frames dropped)", flushed);
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }

    /// Run the display stage on its own thread.
    pub fn spawn_output_thread(self: &Arc<Self>) -> Result<OutputThread> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let port = Arc::clone(self);
        let interval = Duration::from_millis(self.config.output_poll_interval_ms);

        let handle = std::thread::Builder::new()
            .name("vidout-output".into())
            .spawn(move || {
                info!("output thread started");
                loop {
                    match port.display_due() {
                        Ok(_) => {}
                        Err(VideoOutError::PortClosed) => break,
                        Err(e) => warn!("display pass failed: {}", e),
                    }
                    match stop_rx.recv_timeout(interval) {
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                }
                info!("output thread stopped");
            })?;

        Ok(OutputThread {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

impl Drop for OutputPort {
    fn drop(&mut self) {
        self.exit();
    }
}

/// Handle to a running output thread. Stops and joins on drop.
pub struct OutputThread {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl OutputThread {
    /// Stop the thread and wait for it.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // dropping the sender wakes the thread
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("output thread panicked");
            }
        }
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
