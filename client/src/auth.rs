use crate::client::ApiClient;
use crate::error::ClientError;
use crate::models::{LoginData, RegisterData, User};
use crate::response::{AuthResponse, MeResponse};
use reqwest::Method;

impl ApiClient {
    /// POST /auth/login, storing the returned token on success.
    pub async fn login(&self, data: &LoginData) -> Result<AuthResponse, ClientError> {
        let resp: AuthResponse = self.with_body(Method::POST, &["auth", "login"], data).await?;
        self.remember(&resp)?;
        Ok(resp)
    }

    /// POST /auth/register, storing the returned token on success.
    pub async fn register(&self, data: &RegisterData) -> Result<AuthResponse, ClientError> {
        let resp: AuthResponse = self
            .with_body(Method::POST, &["auth", "register"], data)
            .await?;
        self.remember(&resp)?;
        Ok(resp)
    }

    /// GET /auth/me
    pub async fn me(&self) -> Result<User, ClientError> {
        let resp: MeResponse = self.get(&["auth", "me"]).await?;
        resp.user
            .ok_or_else(|| ClientError::Rejected("response carried no user".into()))
    }

    /// Forgets the stored token. No request is made.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.tokens().clear()
    }

    fn remember(&self, resp: &AuthResponse) -> Result<(), ClientError> {
        if let (Some(token), Some(user)) = (&resp.token, &resp.user) {
            self.tokens().set_token(token)?;
            tracing::info!(user = %user.email, role = ?user.role, "logged in");
        }
        Ok(())
    }
}
