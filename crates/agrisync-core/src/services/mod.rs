//! Services shared by every AgriSync front end.

mod farm;
mod store;

pub use farm::{FarmService, Saved};
pub use store::{Store, StoreCell};
