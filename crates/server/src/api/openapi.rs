//! OpenAPI/Utoipa configuration.

use crate::api::{
    auth_client::CLIENT_TAG, health::MISC_TAG, login::LOGIN_TAG, register_route::ROUTE_TAG,
    role::ROLE_TAG,
};
use crate::auth::OAUTH2_TAG;
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let bearer = HttpBuilder::new()
            .scheme(HttpAuthScheme::Bearer)
            .bearer_format("JWT")
            .description(Some(
                "Token from `/login/sign-in` or `/auth/oauth2/token-exchange`.",
            ))
            .build();
        components.add_security_scheme("Bearer", SecurityScheme::Http(bearer));

        let basic = HttpBuilder::new()
            .scheme(HttpAuthScheme::Basic)
            .description(Some("Configured operator credentials, granted the `admin` role."))
            .build();
        components.add_security_scheme("Basic", SecurityScheme::Http(basic));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Tithe Declare API",
        version = "1.0.0",
        description = "Logins, roles, OAuth2 clients and route level authorization.\n\n\
                       Every API route expects `Accept: application/vnd.tithe-declare.v1+json`."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "OAuth2 authorization code flow with PKCE"),
        (name = LOGIN_TAG, description = "Logins, passwords and role assignments"),
        (name = ROLE_TAG, description = "Role management"),
        (name = CLIENT_TAG, description = "OAuth2 clients, callbacks, secrets and issued grants"),
        (name = ROUTE_TAG, description = "Route to role mappings")
    )
)]
pub struct ApiDoc;
