pub mod live_store;

pub use live_store::{LiveDocument, LiveStore};
