//! Orders and sticky notes: the entity, undo history, collections, linking,
//! filtering, display grouping and persistence.
//!
//! [`OrderLog`] ties the pieces together; the submodules are usable on their
//! own for callers that manage their own state.

pub mod archive;
pub mod bulk;
pub mod collections;
pub mod filter;
pub mod grouping;
pub mod id;
pub mod linking;
pub mod models;
pub mod service;
pub mod store;
pub mod undo;
pub mod work_time;

pub use collections::{CollectionManager, Location};
pub use filter::FilterCriteria;
pub use grouping::{DisplayOptions, OrderItemGroup, SortMode, StatusLanes};
pub use id::{GroupId, OrderId};
pub use linking::{LinkError, LinkedGroup};
pub use models::{EditableField, NoteType, OrderItem, OrderStatus};
pub use service::OrderLog;
pub use store::{OrderRepository, PersistenceGateway, SqliteOrderStore, StorageFailure};
pub use undo::{UndoRedoManager, UndoableAction};
pub use work_time::{TimeAccrual, WorkHours};
