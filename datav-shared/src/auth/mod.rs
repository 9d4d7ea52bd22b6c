/// Authentication and authorization
///
/// # Modules
///
/// - [`acl`]: pure allow/deny decisions over membership facts
/// - [`visibility`]: dashboard visibility resolution against storage
/// - [`jwt`]: bearer token validation for the acting user

pub mod acl;
pub mod jwt;
pub mod visibility;

pub use acl::AclError;
pub use visibility::{resolve_row_visibility, resolve_visibility, Visibility};
