//! Job CRUD on [`JobStore`](super::db::JobStore).

mod read;
mod write;
