pub mod guard;
pub mod request_queue;

pub use crate::domain::model::{Document, Query};
pub use crate::domain::ports::{AuthBackend, Clock, DocumentStore, KeyValueStore, SessionGate};
pub use crate::utils::error::Result;
pub use guard::{authorize, Access, GuardedStore};
pub use request_queue::{QueuedStore, RequestQueue};
