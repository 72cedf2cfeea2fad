//! Rivulet Core
//!
//! A fine-grained, single-threaded reactive engine. It implements:
//!
//! - Reactive primitives (signals, computeds, effects)
//! - Automatic dependency tracking with per-run pruning
//! - Push-pull propagation: writes mark, reads resolve
//! - Batched writes and a FIFO effect queue
//!
//! # Architecture
//!
//! The crate is organized into two layers:
//!
//! - `graph`: node and link storage, propagation marks, the effect queue.
//!   Nothing in it runs user code.
//! - `reactive`: the [`Runtime`] and the typed handles. This layer calls
//!   getters, effect bodies and equality predicates.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use rivulet_core::Runtime;
//!
//! let rt = Runtime::new();
//!
//! // Create a signal
//! let count = rt.create_signal(0);
//!
//! // Create a derived value
//! let doubled = rt.create_computed({
//!     let count = count.clone();
//!     move |_| count.get() * 2
//! });
//!
//! // Create an effect
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let _effect = rt.create_effect({
//!     let (count, doubled, log) = (count.clone(), doubled.clone(), log.clone());
//!     move || log.borrow_mut().push((count.get(), doubled.get()))
//! });
//!
//! // Update the signal
//! count.set(5);
//! // Effect automatically runs
//! assert_eq!(*log.borrow(), vec![(0, 0), (5, 10)]);
//! ```
//!
//! # Logging
//!
//! The engine emits [`tracing`] events under the `rivulet` target: warnings
//! for tripped limits and swallowed predicate panics, debug events for node
//! teardown, trace events for effect runs and flushes.

pub mod graph;
pub mod reactive;

mod config;
mod error;

pub use config::RuntimeConfig;
pub use error::{ConfigError, ReactiveError, Result};
pub use graph::{NodeId, NodeState};
pub use reactive::{Computed, Effect, Runtime, Signal};
