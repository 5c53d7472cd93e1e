//! SQLite schema migrations for the persistent store.
refinery::embed_migrations!("./src/schema");
