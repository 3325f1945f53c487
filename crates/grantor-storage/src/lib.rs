pub mod memory;
pub mod postgres;
pub mod traits;

pub use traits::{
    EntityStore, PermissionStore, RelationStore, RoleStore, StorageError, UserStore,
};
