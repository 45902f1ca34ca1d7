//! State trait and macro for handlers that need the database in guards.

use crate::db::Database;

/// Trait for state types that give ownership guards database access.
pub trait HasDatabase {
    fn db(&self) -> &Database;
}

/// Macro to implement `HasDatabase` for state structs with a `db: Database` field.
///
/// # Example
/// ```ignore
/// use crate::impl_has_database;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     // ... other fields
/// }
///
/// impl_has_database!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_database {
    ($state_type:ty) => {
        impl $crate::auth::HasDatabase for $state_type {
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
        }
    };
}
