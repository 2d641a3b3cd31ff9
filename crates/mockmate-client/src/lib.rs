//! # mockmate-client
//!
//! Client side of the MockMate interview channel.
//!
//! - [`ByteSource`]: raw chunks from an HTTP body or from memory
//! - [`ChannelHandle`]: the stream consumer, a lazy sequence of
//!   [`LogicalEvent`](mockmate_core::LogicalEvent)s that releases its source
//!   on every exit
//! - [`PlaybackScheduler`]: fixed-cadence reveal driven by a [`TickSource`]
//! - [`FallbackController`]: one turn over the stream, with exactly one
//!   synchronous fallback
//! - [`HttpTransport`]: streaming and synchronous requests built from the same
//!   [`TurnRequest`](mockmate_core::TurnRequest)

#![deny(unsafe_code)]

pub mod consumer;
pub mod errors;
pub mod fallback;
pub mod metrics;
pub mod playback;
pub mod source;
pub mod ticks;
pub mod transport;

pub use consumer::{ChannelHandle, ConsumerLimits, EventStream};
pub use errors::{ClientError, TurnError};
pub use fallback::{Delivery, FallbackController, NullObserver, TurnObserver, TurnReport};
pub use playback::{PlaybackScheduler, PlaybackState};
pub use source::{ByteSource, ChunkSource, HttpByteSource};
pub use ticks::{IntervalTicks, ManualTicks, TickSource};
pub use transport::{HttpTransport, TurnTransport};
