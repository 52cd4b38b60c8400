#![forbid(unsafe_code)]

//! SQLite persistence for reconciled studies: study snapshots, the version
//! counter, the attachment vocabulary and a journal of entity changes.

mod store;

pub use store::*;
