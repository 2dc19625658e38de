pub mod error;
pub mod item;
pub mod key;
pub mod store;

pub use error::{KvError, Result};
pub use item::{Item, JsonItem, MsgPackItem, RawItem, transfer};
pub use store::{Completion, SharedItem, Store, StoreExt};
