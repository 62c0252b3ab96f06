mod categories;
mod items;
mod meta;
mod rules;
mod schema;
mod sources;
mod types;

pub use schema::Database;
pub use types::{
    Category, DatabaseError, NewItem, NewRule, Rule, Source, StoredItem, UncountedItem,
};
