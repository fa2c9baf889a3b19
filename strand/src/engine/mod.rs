//! A reference engine executing tasks on a pool of threads.
//!
//! The task core only talks to the [`Scheduler`](crate::Scheduler) trait;
//! this module provides one implementation of it. It is composed of:
//! - [`builder`]: configuration,
//! - `core`: the engine handle and the shared scheduler state,
//! - `worker`: worker threads running activations with work stealing,
//! - `queue`: priority-ordered ready queues and the global injector,
//! - `timer`: the thread arming delayed activations.
//!
//! Ready activations are ordered by priority, then by arrival. Work scheduled
//! from a worker lands on that worker's local queue; work scheduled from any
//! other thread, and timers that fired, go through the injector.

mod core;
mod current;
mod queue;
mod timer;
mod worker;

pub mod builder;

pub use self::builder::EngineBuilder;
pub use self::core::Engine;
