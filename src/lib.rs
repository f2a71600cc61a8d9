//! # relight - tick-bounded scheduling of light updates
//!
//! relight sits between a voxel host and its lighting algorithm. Light edits
//! are turned into requests that move through three stages (edit, recalculate,
//! send) either inline on the caller's thread or across host ticks, under a
//! per-tick time and request budget. Outbound chunk updates are aggregated
//! per chunk and flushed once per observer tick.
//!
//! ## Core Concepts
//!
//! - **Policies**: caller intent (`EditPolicy`, `SendPolicy`, `RelightPolicy`) resolved into stage flags and a priority
//! - **Request**: one unit of work, owned by exactly one queue at a time
//! - **LightEngine**: three priority queues drained within a tick budget
//! - **ChunkObserver**: deduplicating per-chunk aggregation of outbound updates
//! - **Handler**: the host's lighting capability (raw get/set, recalculation, sending)
//! - **RelightContext**: wires everything together and owns the background tasks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use relight::{BlockPos, ChunkPos, EngineConfig, InMemoryHandler, LightLevel, RelightContext, WorldId};
//!
//! let handler = Arc::new(InMemoryHandler::new());
//! let world = WorldId::from_name("overworld");
//! handler.add_world(world, -4, 19);
//! handler.load_chunk(world, ChunkPos::new(0, 0));
//!
//! let ctx = RelightContext::with_thread_pool(EngineConfig::default(), handler)?;
//! ctx.start()?;
//!
//! // Once per host tick:
//! ctx.host_tick();
//! ctx.set_light_level(world, BlockPos::new(1, 64, 1), LightLevel::MAX);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Values and requests
pub mod code;
pub mod error;
pub mod light;
pub mod policy;
pub mod request;

// Scheduling
pub mod config;
pub mod engine;
pub mod handler;
pub mod observer;
pub mod service;

// Host entry point
pub mod context;

pub use code::ResultCode;
pub use config::EngineConfig;
pub use context::RelightContext;
pub use engine::{DrainStats, DrainStop, LightEngine, PendingCounts, TickBudget, TickReport};
pub use error::{ConfigError, RelightError, RelightResult, ServiceError};
pub use handler::{Handler, InMemoryHandler, SentBatch};
pub use light::{BlockPos, ChunkPos, LightFlags, LightLevel, WorldId};
pub use observer::{delta_light, ChunkBatch, ChunkObserver};
pub use policy::{resolve, EditPolicy, RelightPolicy, Resolution, SendPolicy};
pub use request::{Callback, Request, RequestFlags, ResultSink, DEFAULT_PRIORITY, HIGH_PRIORITY, LOW_PRIORITY};
pub use service::{BackgroundService, ScheduledTask, Task, ThreadPoolService};
