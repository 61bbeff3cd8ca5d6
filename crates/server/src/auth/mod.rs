//! Authentication core: password hashing, PKCE, token signing, refresh token
//! rotation and the OAuth2 authorization code flow built on top of them.

pub mod oauth;
pub mod password;
pub mod pkce;
pub mod refresh;
pub mod signer;

pub use oauth::OAuthFlow;
pub use password::{PasswordHasher, validate_password};
pub use refresh::{RefreshPolicy, RefreshRotator, hash_token};
pub use signer::{Claims, TokenSigner};

/// OpenAPI tag for the OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
