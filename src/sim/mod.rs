//! Simulation kernel
//!
//! Everything that runs inside the frame loop lives here. This module must
//! stay single-threaded and deterministic:
//! - Deferred spawning, double-buffered queues
//! - Stable iteration order (by slot)
//! - No rendering or platform dependencies

pub mod body;
pub mod filter;
pub mod script;
pub mod slots;
pub mod space;
pub mod subscribe;
pub mod tick;

pub use body::{Body, BoxCollider, Collider, Hit, HitCallback, SphereCollider, Transform};
pub use filter::{Filter, FilterId, FilterTable, pair_allowed};
pub use script::{
    AsAny, Executor, Registration, Script, ScriptCx, ScriptHandle, ScriptStatus, Spawn,
};
pub use slots::{OwnerId, SlotAllocator, SlotId};
pub use space::{BodyHandle, Space};
pub use subscribe::{Subscribable, Subscriber};
pub use tick::{TickReport, World, tick};
