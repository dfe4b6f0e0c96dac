pub mod model;
pub mod store;

pub use model::{Profile, Resolution};
pub use store::{DirectoryProfileStore, InMemoryProfileStore, ProfileStore};
