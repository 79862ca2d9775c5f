mod model;
mod repository;

pub use model::{SymbolPriorityDB, SyncJobDB};
pub use repository::{SymbolPriorityRepository, SyncJobRepository};
