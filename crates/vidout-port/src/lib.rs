//! VidOut Port - Output port, frame pool and sink contract
//!
//! This crate provides the runtime half of the video output pipeline:
//! - Reference-counted frames handed out by a bounded, format-aware pool
//! - The `Sink` trait platform backends implement, plus an in-memory sink
//! - The output port: display queue, overlay blending, properties, skip
//!   advice and a dedicated output thread
//! - Versioned JSON port configuration

pub mod clock;
pub mod config;
pub mod frame;
pub mod pool;
pub mod port;
pub mod sink;
pub mod skip;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PortConfig, CONFIG_VERSION};
pub use frame::Frame;
pub use pool::{FramePool, PoolStats};
pub use port::{DisplayReport, OutputPort, OutputThread, PortStatus};
pub use sink::{
    shared, GrabbedImage, HostEvent, MemorySink, OverlayCall, Presentation, SharedSink, Sink,
    SinkLog, SINK_INTERFACE_VERSION,
};
pub use skip::SkipPolicy;
