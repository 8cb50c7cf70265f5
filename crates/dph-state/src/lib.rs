//! # dph-state: Project Lifecycle State Machine
//!
//! Owns the legal status transitions of a project and the conditions under
//! which each may be invoked.
//!
//! ## States
//!
//! ```text
//!            publish (owner)          approve (staff)
//!   Draft ───────────────────▶ Pending ───────────────▶ Live
//!     ▲                          │                       │
//!     │   reject (staff)         │                       │
//!     ├──────────────────────────┘                       │
//!     │   withdraw (owner)                               │
//!     │                                                  │
//!     │   unpublish / redraft (owner), takedown (staff)  │
//!     └──────────────────────────────────────────────────┘
//! ```
//!
//! No state is terminal. Deletion is an out-of-band destructive operation
//! handled by the store, not a state.
//!
//! - **Lifecycle** (`lifecycle.rs`): triggers, the guard table, and
//!   [`fire`], which applies a trigger to anything implementing
//!   [`Lifecycle`].
//! - **Featuring** (`feature.rs`): promotion windows, orthogonal to status
//!   and evaluated at read time.

pub mod feature;
pub mod lifecycle;

pub use feature::{feature, is_featured, unfeature, FeatureError};
pub use lifecycle::{
    fire, on_content_edit, resolve_trigger, Authority, Lifecycle, LifecycleError,
    TransitionRecord, Trigger,
};
