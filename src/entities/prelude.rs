//! `SeaORM` Entity prelude

pub use super::last_rebase::Entity as LastRebase;
pub use super::rebase_history::Entity as RebaseHistory;
