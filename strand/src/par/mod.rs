//! Fan-out/fan-in: running independent tasks concurrently and joining their
//! outcomes.
//!
//! Two join flavours exist:
//!
//! - **fast-fail**, used by the fixed-arity [`par2`] .. [`par15`]: the join
//!   fails with the first member error and cancels the other members;
//! - **best-effort**, used by the list form [`par()`]: the join waits for
//!   every member and always succeeds with per-member outcomes.
//!
//! Members are started as children of the join task, in no particular
//! order.

mod join;
mod tuple;

pub use join::{ParResults, ParTask, par};
pub use tuple::{
    par2, par3, par4, par5, par6, par7, par8, par9, par10, par11, par12, par13, par14, par15,
};
