//! sea-orm entities for the identity and authorization tables.

pub mod auth_authorize;
pub mod auth_client;
pub mod auth_client_callback;
pub mod auth_client_secret;
pub mod auth_refresh;
pub mod login;
pub mod login_reset;
pub mod login_role;
pub mod register_route;
pub mod role;
