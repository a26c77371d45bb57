//! The session store.

pub mod store;
