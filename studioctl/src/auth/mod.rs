//! Authentication: identity comes from a trusted upstream proxy via the
//! `x-studio-user` header. The engine itself never handles credentials.

pub mod current_user;

pub use current_user::CurrentUser;

/// Header set by the authenticating proxy, carrying the user's email.
pub static USER_HEADER: &str = "x-studio-user";
