/*!
 * Data Store Module
 * Durability-scoped object store through which modules communicate
 */

mod store;
pub mod types;

pub use store::DataStore;
pub use types::{Durability, EventMetaData, StoreError, StoreResult};
