//! Reactive Primitives
//!
//! This module implements the user-facing side of the engine: the runtime,
//! signals, computeds and effects.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while a computed or effect is evaluating, the signal automatically links
//! itself to that consumer. When the signal's value changes, everything
//! downstream is marked and the affected effects are queued.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It re-evaluates only
//! when read after one of its dependencies actually changed. Computeds are
//! useful for expensive derivations that should not be repeated
//! unnecessarily.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems.
//!
//! # Implementation Notes
//!
//! Each [`Runtime`] keeps a stack of the consumers currently evaluating. When
//! a signal or computed is read, the runtime checks the top of that stack
//! and, if there is a consumer, records the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod handle;
mod runtime;
mod signal;

pub use computed::Computed;
pub use effect::Effect;
pub use runtime::Runtime;
pub use signal::Signal;
