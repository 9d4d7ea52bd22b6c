/// Datasource plumbing
///
/// - [`conn_cache`]: one downstream connection per datasource ID
///
/// Query dispatch lives outside this crate. It holds a [`ConnCache`] of its
/// own connection type; nothing here dispatches queries.

pub mod conn_cache;

pub use conn_cache::ConnCache;
