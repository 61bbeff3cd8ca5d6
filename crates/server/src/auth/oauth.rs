//! OAuth2 authorization code flow with PKCE.
//!
//! 1. `authorize` validates the request and points the browser at the consent page.
//! 2. `sign_in` checks the login credentials and records an [`auth_authorize`] row
//!    whose id is the authorization code.
//! 3. `verify_consent` turns an outstanding code into the client redirect.
//! 4. `exchange` redeems a code or a refresh token for an access token.
//!
//! Access tokens minted here live as long as an authorization code
//! (`auth.authorization_expires_minutes`) and carry the client id as subject
//! with no roles.

use crate::AppResources;
use crate::auth::password::PasswordHasher;
use crate::auth::pkce;
use crate::auth::refresh::{RefreshPolicy, RefreshRotator};
use crate::auth::signer::TokenSigner;
use crate::entity::{auth_authorize, auth_client, auth_client_callback, auth_client_secret, login};
use crate::error::ApiError;
use crate::util::{generate_random_string, require};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;
use url::form_urlencoded;
use utoipa::{IntoParams, ToSchema};

pub const AUTHORIZATION_CODE_LEN: usize = 32;
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
pub struct AuthorizeRequest {
    /// Must be `code`
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    /// `S256` or `S512`
    pub code_challenge_method: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SignInRequest {
    #[serde(rename = "email_address")]
    pub email_addr: Option<String>,
    #[serde(rename = "password")]
    pub pwd: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
    pub code_challenge: Option<String>,
    pub code_challenge_method: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SignInResponse {
    pub code: String,
    pub access_token: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ConsentRequest {
    pub client_id: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConsentResponse {
    pub redirect_url: String,
    pub code: String,
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
}

#[derive(Clone, Debug)]
pub struct OAuthFlow {
    db: Arc<DatabaseConnection>,
    signer: Arc<TokenSigner>,
    rotator: RefreshRotator,
    hasher: PasswordHasher,
    code_lifetime_secs: i64,
    consent_url: String,
}

impl OAuthFlow {
    pub fn new(resources: &AppResources) -> Self {
        let auth = &resources.config.auth;
        Self {
            db: resources.db.clone(),
            signer: resources.signer.clone(),
            rotator: RefreshRotator::new(
                resources.db.clone(),
                RefreshPolicy::from_secs(auth.refresh_token_expires),
            ),
            hasher: PasswordHasher::new(auth.pwd_cost),
            code_lifetime_secs: auth.authorization_expires_secs(),
            consent_url: resources.config.consent_url.clone(),
        }
    }

    /// Validates an authorization request and returns the consent page URL
    /// carrying everything the consent form needs to call `sign_in`.
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<String, ApiError> {
        if req.response_type.as_deref() != Some("code") {
            return Err(ApiError::general(
                "Invalid response_type, 'code' is the only valid option",
            ));
        }
        let client_id = require("client_id", req.client_id.as_deref(), 32)?;
        let client = self.client(&client_id).await?;
        if let Some(uri) = req.redirect_uri.as_deref().filter(|u| !u.is_empty()) {
            self.check_redirect(&client, uri).await?;
        }
        if let Some(method) = req.code_challenge_method.as_deref()
            && !pkce::is_supported(method)
        {
            return Err(ApiError::InvalidMethod(method.to_string()));
        }

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &client.id)
            .append_pair("client_name", &client.name)
            .append_pair("scope", req.scope.as_deref().unwrap_or_default())
            .append_pair("state", req.state.as_deref().unwrap_or_default())
            .append_pair("redirect_uri", req.redirect_uri.as_deref().unwrap_or_default())
            .append_pair("code_challenge", req.code_challenge.as_deref().unwrap_or_default())
            .append_pair(
                "code_challenge_method",
                req.code_challenge_method.as_deref().unwrap_or_default(),
            )
            .finish();
        Ok(format!("{}?{}", self.consent_url, query))
    }

    /// Authenticates the login and records the authorization attempt.
    pub async fn sign_in(&self, req: SignInRequest) -> Result<SignInResponse, ApiError> {
        let email = require("email_address", req.email_addr.as_deref(), 100)?;
        let pwd = req
            .pwd
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::missing("password"))?;
        let client_id = require("client_id", req.client_id.as_deref(), 32)?;
        let challenge = require("code_challenge", req.code_challenge.as_deref(), 255)?;
        let method = require(
            "code_challenge_method",
            req.code_challenge_method.as_deref(),
            10,
        )?;
        if !pkce::is_supported(&method) {
            return Err(ApiError::InvalidMethod(method));
        }

        let client = self.client(&client_id).await?;
        let redirect_uri = req.redirect_uri.filter(|u| !u.is_empty());
        if let Some(uri) = redirect_uri.as_deref() {
            self.check_redirect(&client, uri).await?;
        }

        let account = login::Entity::find()
            .filter(login::Column::EmailAddr.eq(email.as_str()))
            .one(self.db.as_ref())
            .await?
            .ok_or(ApiError::EmailPasswordCombo)?;
        if !self.hasher.verify(&pwd, &account.pwd).await {
            return Err(ApiError::EmailPasswordCombo);
        }
        if !account.active {
            return Err(ApiError::LoginInactive);
        }

        let now = OffsetDateTime::now_utc();
        let code = generate_random_string(AUTHORIZATION_CODE_LEN);
        auth_authorize::ActiveModel {
            id: Set(code.clone()),
            client_id: Set(client.id.clone()),
            login_id: Set(account.id.clone()),
            verifier: Set(challenge),
            verifier_encode_method: Set(method),
            state: Set(req.state),
            scope: Set(req.scope),
            redirect_uri: Set(redirect_uri),
            authorized_at: Set(Some(now)),
            auth_code_at: Set(Some(now)),
            auth_code: Set(Some(code.clone())),
            created_at: Set(now),
        }
        .insert(self.db.as_ref())
        .await?;

        let access_token = self.mint(&client.id)?;
        tracing::info!(client_id = %client.id, login_id = %account.id, "authorization code issued");
        Ok(SignInResponse { code, access_token })
    }

    /// Builds the client redirect for a code that has not been redeemed yet.
    pub async fn verify_consent(&self, req: ConsentRequest) -> Result<ConsentResponse, ApiError> {
        let client_id = require("client_id", req.client_id.as_deref(), 32)?;
        let code = require("code", req.code.as_deref(), AUTHORIZATION_CODE_LEN)?;

        let record = auth_authorize::Entity::find_by_id(code.as_str())
            .one(self.db.as_ref())
            .await?
            .filter(|r| r.client_id == client_id && !r.is_consumed())
            .ok_or_else(|| ApiError::NotFound("authorization".into()))?;
        let client = self.client(&client_id).await?;

        let target = record
            .redirect_uri
            .clone()
            .unwrap_or_else(|| client.callback_url.clone());
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("code", &record.id);
        if let Some(state) = record.state.as_deref() {
            query.append_pair("state", state);
        }
        let separator = if target.contains('?') { '&' } else { '?' };
        Ok(ConsentResponse {
            redirect_url: format!("{target}{separator}{}", query.finish()),
            code: record.id,
            state: record.state,
        })
    }

    pub async fn exchange(&self, req: TokenRequest) -> Result<TokenResponse, ApiError> {
        let grant_type = require("grant_type", req.grant_type.as_deref(), 32)?;
        let client_id = require("client_id", req.client_id.as_deref(), 32)?;
        let secret = require("client_secret", req.client_secret.as_deref(), 255)?;
        self.check_secret(&client_id, &secret).await?;

        match grant_type.as_str() {
            GRANT_AUTHORIZATION_CODE => {
                let code = require("code", req.code.as_deref(), AUTHORIZATION_CODE_LEN)?;
                let verifier = require("code_verifier", req.code_verifier.as_deref(), 255)?;
                self.exchange_code(&client_id, &code, &verifier).await
            }
            GRANT_REFRESH_TOKEN => {
                let token = require("refresh_token", req.refresh_token.as_deref(), 255)?;
                self.exchange_refresh(&client_id, &token).await
            }
            other => Err(ApiError::general(format!("unsupported grant_type: {other}"))),
        }
    }

    async fn exchange_code(
        &self,
        client_id: &str,
        code: &str,
        verifier: &str,
    ) -> Result<TokenResponse, ApiError> {
        let record = auth_authorize::Entity::find_by_id(code)
            .one(self.db.as_ref())
            .await?
            .filter(|r| r.client_id == client_id && !r.is_consumed())
            .ok_or_else(|| ApiError::general("expired"))?;

        if !record.is_code_fresh(OffsetDateTime::now_utc(), self.code_lifetime_secs) {
            return Err(ApiError::general("expired"));
        }
        if !pkce::verify(verifier, &record.verifier_encode_method, &record.verifier)? {
            return Err(ApiError::general("invalid PKCE"));
        }

        let access_token = self.mint(client_id)?;

        // Redeem exactly once: only the request that clears auth_code wins.
        // The code stays redeemable unless the refresh token is stored too.
        let txn = self.db.begin().await?;
        let redeemed = auth_authorize::Entity::update_many()
            .col_expr(
                auth_authorize::Column::AuthCode,
                Expr::value(Option::<String>::None),
            )
            .filter(auth_authorize::Column::Id.eq(code))
            .filter(auth_authorize::Column::AuthCode.is_not_null())
            .exec(&txn)
            .await?;
        if redeemed.rows_affected != 1 {
            return Err(ApiError::general("expired"));
        }
        let refresh_token = match self.rotator.issue_in(&txn, client_id).await {
            Ok(token) => token,
            Err(e) => {
                txn.rollback().await?;
                return Err(e);
            }
        };
        txn.commit().await?;
        tracing::info!(client_id, "authorization code exchanged");
        Ok(self.token_response(access_token, refresh_token))
    }

    async fn exchange_refresh(
        &self,
        client_id: &str,
        token: &str,
    ) -> Result<TokenResponse, ApiError> {
        if self.rotator.find(client_id, token).await?.is_none() {
            return Err(ApiError::general("invalid refresh token"));
        }
        let access_token = self.mint(client_id)?;
        let refresh_token = self.rotator.cycle(client_id, token).await?;
        Ok(self.token_response(access_token, refresh_token))
    }

    fn mint(&self, client_id: &str) -> Result<String, ApiError> {
        self.signer
            .build_with_ttl(client_id, &[], self.code_lifetime_secs)
    }

    fn token_response(&self, access_token: String, refresh_token: String) -> TokenResponse {
        TokenResponse {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.code_lifetime_secs,
            refresh_token,
        }
    }

    async fn client(&self, client_id: &str) -> Result<auth_client::Model, ApiError> {
        auth_client::Entity::find_by_id(client_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("client {client_id}")))
    }

    async fn check_redirect(&self, client: &auth_client::Model, uri: &str) -> Result<(), ApiError> {
        if client.callback_url == uri {
            return Ok(());
        }
        let allowed = auth_client_callback::Entity::find_by_id((client.id.clone(), uri.to_string()))
            .one(self.db.as_ref())
            .await?
            .is_some();
        if allowed {
            Ok(())
        } else {
            Err(ApiError::general("redirect_uri is not registered for this client"))
        }
    }

    async fn check_secret(&self, client_id: &str, secret: &str) -> Result<(), ApiError> {
        let found = auth_client_secret::Entity::find_by_id((client_id.to_string(), secret.to_string()))
            .one(self.db.as_ref())
            .await?;
        match found {
            Some(s) if s.active => Ok(()),
            _ => {
                tracing::warn!(client_id, "token exchange with unknown or inactive secret");
                Err(ApiError::general("Inactive secret"))
            }
        }
    }
}
