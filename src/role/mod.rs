//! Role-specific event handling (spec.md §4.7): a hub tracks many peers, a
//! node tracks exactly one (its hub). `Core` picks one at construction time
//! and exposes only the operations valid for it, returning
//! [`crate::error::RoleMismatch`] if the wrong-role API is called.

pub mod hub;
pub mod node;
