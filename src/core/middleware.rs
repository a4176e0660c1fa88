use http::Extensions;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use reqwest::{header, Client, Request, Response};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, Middleware, Next};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::sync::Arc;
use tokio::sync::OnceCell;
use yup_oauth2::authenticator::Authenticator;
use yup_oauth2::{ServiceAccountAuthenticator, ServiceAccountKey};

type AuthType = Authenticator<HttpsConnector<HttpConnector>>;

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/datastore",
    "https://www.googleapis.com/auth/identitytoolkit",
];

/// Attaches a service-account OAuth token to every outgoing request.
///
/// The authenticator is built on first use and shared between clones.
#[derive(Clone)]
pub struct AuthMiddleware {
    key: ServiceAccountKey,
    authenticator: Arc<OnceCell<AuthType>>,
}

impl AuthMiddleware {
    pub fn new(key: ServiceAccountKey) -> Self {
        Self {
            key,
            authenticator: Arc::new(OnceCell::new()),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    async fn get_token(&self) -> Result<String, anyhow::Error> {
        let auth = self
            .authenticator
            .get_or_try_init(|| async {
                ServiceAccountAuthenticator::builder(self.key.clone())
                    .build()
                    .await
            })
            .await?;

        let token = auth.token(SCOPES).await?;

        Ok(token
            .token()
            .ok_or_else(|| anyhow::anyhow!("No token found"))?
            .to_string())
    }
}

#[async_trait::async_trait]
impl Middleware for AuthMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        let token = self.get_token().await.map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!(
                "Failed to get auth token: {}",
                e
            ))
        })?;

        let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            reqwest_middleware::Error::Middleware(anyhow::anyhow!("Invalid auth token: {}", e))
        })?;
        req.headers_mut().insert(header::AUTHORIZATION, value);

        next.run(req, extensions).await
    }
}

/// Builds the shared HTTP client: transient retries first, then authentication.
pub fn authorized_client(middleware: AuthMiddleware) -> ClientWithMiddleware {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);

    ClientBuilder::new(Client::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .with(middleware)
        .build()
}
