//! An issuer that exchanges client credentials with an OAuth2 authority

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::IssuerClient;
use crate::{Audience, ClientId, ClientSecret, TokenResource};

/// Client credentials, optionally scoped to an audience
#[derive(Debug)]
pub struct ClientCredentials {
    /// The client ID
    pub client_id: ClientId,

    /// The client secret
    pub client_secret: ClientSecret,

    /// The target audience, if the authority requires one
    pub audience: Option<Audience>,
}

impl Serialize for ClientCredentials {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut ser = serializer.serialize_struct("ClientCredentials", 4)?;
        ser.serialize_field("grant_type", GRANT_TYPE)?;
        ser.serialize_field("client_id", &self.client_id)?;
        ser.serialize_field("client_secret", &self.client_secret)?;
        if let Some(audience) = &self.audience {
            ser.serialize_field("audience", audience)?;
        } else {
            ser.skip_field("audience")?;
        }
        ser.end()
    }
}

const GRANT_TYPE: &str = "client_credentials";

/// Fetches tokens using the client credentials flow
#[derive(Debug)]
pub struct ClientCredentialsIssuer<T = JsonBody> {
    client: reqwest::Client,
    token_url: reqwest::Url,
    credentials: ClientCredentials,
    content_type: PhantomData<fn() -> T>,
}

impl ClientCredentialsIssuer<JsonBody> {
    /// Constructs a new client credentials issuer
    pub fn new(
        client: reqwest::Client,
        token_url: reqwest::Url,
        credentials: ClientCredentials,
    ) -> Self {
        Self {
            client,
            token_url,
            credentials,
            content_type: PhantomData,
        }
    }

    /// Configures the issuer to send credentials to the authority as form
    /// data
    pub fn using_form_data(self) -> ClientCredentialsIssuer<FormBody> {
        ClientCredentialsIssuer {
            client: self.client,
            token_url: self.token_url,
            credentials: self.credentials,
            content_type: PhantomData,
        }
    }
}

#[async_trait]
impl<T: RequestType> IssuerClient for ClientCredentialsIssuer<T> {
    type Error = TokenRequestError;

    #[tracing::instrument(
        err,
        skip(self),
        fields(
            token_url = %self.token_url,
            credentials.grant_type = GRANT_TYPE,
            credentials.client_id = %self.credentials.client_id,
        ),
    )]
    async fn fetch_token(&self) -> Result<TokenResource, Self::Error> {
        tracing::trace!("requesting token from authority");

        let req = T::attach_payload(self.client.post(self.token_url.clone()), &self.credentials);
        let resp = req.send().await.map_err(TokenRequestError::RequestSend)?;

        tracing::debug!(
            response.status = resp.status().as_u16(),
            "received token response from authority"
        );

        if let Err(error) = resp.error_for_status_ref() {
            let body = resp
                .text()
                .await
                .map_err(TokenRequestError::BodyReadError)?;
            return Err(TokenRequestError::ErrorWithBody {
                source: error,
                body,
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(TokenRequestError::BodyReadError)?;
        let token: TokenResource = serde_json::from_slice(&body)?;

        tracing::debug!(
            has_access_token = token.access_token().is_some(),
            lifetime_secs = token.lifetime_secs(),
            "parsed token response"
        );

        Ok(token)
    }
}

/// An error while attempting to request a new token from the authority
#[derive(Debug, Error)]
pub enum TokenRequestError {
    /// An error from the authority with an error body
    #[error("error requesting token from authority: {body}")]
    ErrorWithBody {
        /// The underlying request error
        source: reqwest::Error,
        /// The body of the error
        body: String,
    },
    /// Unable to deserialize the token body
    #[error("error deserializing token body from authority")]
    TokenBodyError(#[from] serde_json::Error),
    /// Unable to read the response
    #[error("error reading response body")]
    BodyReadError(#[source] reqwest::Error),
    /// Unable to send a token request to the authority
    #[error("error sending request to authority")]
    RequestSend(#[source] reqwest::Error),
}

/// A manner of attaching a serializable payload to a request
pub trait RequestType: Send + Sync + 'static {
    /// Attaches the serializable payload to the request body
    fn attach_payload<S: Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder;
}

/// Attaches credentials to the request body as JSON
#[derive(Debug)]
pub struct JsonBody;

/// Attaches credentials to the request body as URL-encoded form data
#[derive(Debug)]
pub struct FormBody;

impl RequestType for JsonBody {
    fn attach_payload<S: Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.json(payload)
    }
}

impl RequestType for FormBody {
    fn attach_payload<S: Serialize>(
        request: reqwest::RequestBuilder,
        payload: &S,
    ) -> reqwest::RequestBuilder {
        request.form(payload)
    }
}
