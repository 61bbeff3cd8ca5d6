//! OAuth2 endpoints. All four are on the public allow-list.

use crate::AppResources;
use crate::api::Payload;
use crate::auth::OAUTH2_TAG;
use crate::auth::oauth::{
    AuthorizeRequest, ConsentRequest, ConsentResponse, OAuthFlow, SignInRequest, SignInResponse,
    TokenRequest, TokenResponse,
};
use crate::error::ApiError;
use crate::response::Output;
use axum::{Extension, Json, extract::Query, response::Redirect};
use utoipa_axum::{router::OpenApiRouter, routes};

pub fn router() -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(authorize))
        .routes(routes!(sign_in))
        .routes(routes!(verify_consent))
        .routes(routes!(token_exchange))
}

#[tracing::instrument(skip(resources, params), fields(client_id = ?params.client_id))]
#[utoipa::path(
    get,
    path = "/auth/oauth2/authorize",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize",
    summary = "Start an authorization code flow",
    description = "Validates the client and PKCE method, then redirects the browser to the consent page \
                   with the client name, scope, state and code challenge in the query string.",
    params(AuthorizeRequest),
    responses(
        (status = 303, description = "Redirect to the consent page"),
        (status = 400, description = "Missing parameter or unsupported challenge method"),
        (status = 404, description = "Unknown client")
    )
)]
pub async fn authorize(
    Extension(resources): Extension<AppResources>,
    Query(params): Query<AuthorizeRequest>,
) -> Result<Redirect, ApiError> {
    let location = OAuthFlow::new(&resources).authorize(params).await?;
    Ok(Redirect::to(&location))
}

#[tracing::instrument(skip(resources, payload), fields(client_id = ?payload.client_id))]
#[utoipa::path(
    post,
    path = "/auth/oauth2/sign-in",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Sign In",
    summary = "Authenticate a login for a client",
    description = "Checks the login credentials and records the authorization. The returned `code` \
                   is redeemed at the token exchange together with the PKCE code verifier.",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Authorization code issued", body = Output<SignInResponse>),
        (status = 401, description = "Unknown email address or wrong password"),
        (status = 403, description = "Login is not active")
    )
)]
pub async fn sign_in(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<SignInRequest>,
) -> Result<Json<Output<SignInResponse>>, ApiError> {
    let response = OAuthFlow::new(&resources).sign_in(payload).await?;
    Ok(Json(Output::data(response)))
}

#[tracing::instrument(skip(resources, payload), fields(client_id = ?payload.client_id))]
#[utoipa::path(
    post,
    path = "/auth/oauth2/verify-consent",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Verify Consent",
    summary = "Resolve the client redirect for an issued code",
    request_body = ConsentRequest,
    responses(
        (status = 200, description = "Redirect target for the browser", body = Output<ConsentResponse>),
        (status = 404, description = "Code unknown, redeemed or issued to another client")
    )
)]
pub async fn verify_consent(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<ConsentRequest>,
) -> Result<Json<Output<ConsentResponse>>, ApiError> {
    let response = OAuthFlow::new(&resources).verify_consent(payload).await?;
    Ok(Json(Output::data(response)))
}

#[tracing::instrument(skip(resources, payload), fields(client_id = ?payload.client_id, grant_type = ?payload.grant_type))]
#[utoipa::path(
    post,
    path = "/auth/oauth2/token-exchange",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token Exchange",
    summary = "Redeem an authorization code or refresh token",
    description = "`grant_type=authorization_code` needs `code` and `code_verifier`; \
                   `grant_type=refresh_token` needs `refresh_token`. Both need an active client secret.",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Tokens issued", body = Output<TokenResponse>),
        (status = 400, description = "Missing parameter"),
        (status = 500, description = "Inactive secret, expired code, PKCE mismatch or replayed refresh token")
    )
)]
pub async fn token_exchange(
    Extension(resources): Extension<AppResources>,
    Payload(payload): Payload<TokenRequest>,
) -> Result<Json<Output<TokenResponse>>, ApiError> {
    let response = OAuthFlow::new(&resources).exchange(payload).await?;
    Ok(Json(Output::data(response)))
}
