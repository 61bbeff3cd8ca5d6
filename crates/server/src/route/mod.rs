pub mod middleware;
pub mod registry;

pub use middleware::{AuthMethod, AuthState, Authenticated, Identity};
pub use registry::RouteRegistry;
