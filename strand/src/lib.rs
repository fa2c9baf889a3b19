//! # Strand
//!
//! **Strand** is an asynchronous task composition library: callers describe
//! work as graphs of deferred [`Task`]s, combine them with algebraic
//! operators, and run them on an engine that tracks priority, cancellation
//! and completion causality.
//!
//! A task is inert until an engine activates it. When it runs, its work
//! function receives a [`Context`] to start children, sequence tasks and arm
//! timers, and returns a [`Promise`] carrying its result. Combinators build
//! new tasks around existing ones:
//!
//! - **Sequencing and mapping**: `map`, `flat_map`, `and_then`,
//!   `and_then_task`, `flatten`
//! - **Recovery**: `recover`, `recover_with`, `on_failure`, `to_try`,
//!   `transform`, `transform_with`
//! - **Detached work**: `with_side_effect`, `shareable`
//! - **Time**: `with_timeout`, `with_delay`
//! - **Fan-out/fan-in**: [`par!`], [`par::par2`] .. [`par::par15`],
//!   [`par::par`]
//! - **Retry**: [`Task::with_retry_policy`]
//!
//! When a task finishes, children it scheduled that have not started yet are
//! cancelled. Chains of cheap synchronous steps are fused into a single
//! activation.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strand::{EngineBuilder, Task};
//! use std::time::Duration;
//!
//! let engine = EngineBuilder::new().worker_threads(4).build();
//!
//! let greeting = Task::value("name", "world")
//!     .map("greet", |name| format!("hello, {name}"))
//!     .with_timeout("greet in time", Duration::from_millis(100));
//!
//! assert_eq!(engine.block_on(&greeting)?, "hello, world");
//! ```
//!
//! ## Modules
//!
//! - [`promise`]: write-once result cells
//! - [`task`]: the task handle, its state and trace metadata
//! - [`combinator`]: combinators on tasks
//! - [`par`]: concurrent joins
//! - [`tools`]: retry, blocking and future adapters
//! - [`engine`]: the reference multi-threaded engine

mod context;
mod scheduler;

pub mod combinator;
pub mod engine;
pub mod error;
pub mod par;
pub mod promise;
pub mod task;
pub mod tools;

pub use combinator::IntoTask;
pub use context::{After, Context};
pub use engine::{Engine, EngineBuilder};
pub use error::{CancelReason, Error, Result};
pub use promise::{Promise, SettablePromise, Value};
pub use scheduler::{Activation, Scheduler};
pub use task::{ShallowTrace, Task, TaskId, TaskState, TaskType, priority};

pub use strand_macros::{par, test};
