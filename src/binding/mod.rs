//! Resource Binding
//!
//! Everything between shader reflection and the command stream: the merged
//! [`BindingLayout`] with its compatibility hash, the per-backend binding
//! models, the pool-backed [`ResourceCache`], and the user-facing
//! [`ShaderResourceBinding`].

pub mod cache;
pub mod layout;
pub mod model;
pub mod srb;

pub use cache::{CachedSlot, ResourceCache};
pub use layout::{BindingLayout, CacheLayout, ResourceSlot, SlotRange, SlotSignature};
pub use model::BindingModelKind;
pub use srb::{BindFlags, ResourceMapping, ShaderResourceBinding};
