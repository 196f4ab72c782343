//! Type definitions for whereabouts storage.

mod groups;
mod ids;
mod invites;
mod locations;
mod roles;
mod users;

// Re-export all types from submodules
pub use groups::*;
pub use ids::*;
pub use invites::*;
pub use locations::*;
pub use roles::*;
pub use users::*;
