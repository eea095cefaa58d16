//! A flow-based stream pipeline with bounded, typed connections.
//!
//! Independently running stages exchange [`Packet`]s over single-producer,
//! single-consumer connections. A full connection suspends its producer, an
//! empty one suspends its consumer, and an in-band end-of-stream marker shuts
//! the chain down from source to sink.
//!
//! # Features
//!
//! - Typed packets with list brackets and an end-of-stream marker
//! - Bounded connections on crossbeam channels (default capacity 5)
//! - Explicit per-stage end-of-stream convention: propagate or re-frame
//! - One thread per stage, joined by the driver before it returns
//! - Per-stage metrics: throughput, latency percentiles, backpressure blocks
//! - A Brainfuck to C translator as the reference pipeline
//!
//! # Example
//!
//! ```ignore
//! use flow_pipeline::{IterSource, MapStage, PipelineBuilder, WriterSink};
//!
//! let report = PipelineBuilder::new()
//!     .with_capacity(5)
//!     .source(IterSource::new("numbers", 0..10))?
//!     .stage(MapStage::new("format", |n: i32| Ok(format!("{}\n", n))))
//!     .sink(WriterSink::<_, String>::new(std::io::stdout()))
//!     .run()?;
//! ```

pub mod connection;
pub mod error;
pub mod io;
pub mod lifecycle;
pub mod metrics;
pub mod packet;
pub mod pipeline;
pub mod stage;
pub mod translate;

// Re-exports for convenience
pub use connection::{connection, PacketReceiver, PacketSender, DEFAULT_CAPACITY};
pub use error::{PipelineError, Result};
pub use io::{CodePointSource, SharedBuffer, WriterSink};
pub use lifecycle::{Lifecycle, LifecycleGuard};
pub use metrics::{MetricsSnapshot, StageMetrics};
pub use packet::{Boxed, Packet};
pub use pipeline::{
    Pipeline, PipelineBuilder, PipelineChain, PipelineConfig, PipelineReport, RunningPipeline,
};
pub use stage::{FilterStage, IterSource, MapStage, Sink, Source, Stage, Termination};
pub use translate::{translate, translate_str};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
