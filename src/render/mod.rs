//! # Command Resolution
//!
//! The per-command matching core: a press consumes the next step pair's
//! onset group and remembers its release group under the pressed
//! control; the matching release flushes that group as one batch.
//!
//! Split into three parts:
//! - [`BindingTable`] - which pitches each control currently holds
//! - [`CoalescingBuffer`] - release groups deferred until their control
//!   is released
//! - [`Combiner`] - the resolution algorithm itself, driven through a
//!   [`StepSource`]

mod bindings;
mod coalesce;
mod engine;


pub use bindings::{Binding, BindingTable};
pub use coalesce::CoalescingBuffer;
pub use engine::{CombineOptions, Combiner, StepSource};
