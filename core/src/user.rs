//! Merchant account operations.
//!
//! These calls act on the caller's own Shipfunk account, so they need only
//! the API key and never carry an order id.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::envelope::{exchange, Endpoint, RequestType};
use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::transport::{Transport, UreqTransport};
use crate::types::{check_email, StatusMessage, UserAccount};

#[derive(Serialize)]
struct UserBlock<U> {
    user: U,
}

#[derive(Serialize)]
struct EmailOnly<'a> {
    email: &'a str,
}

/// Client for creating and managing merchant accounts under the caller's
/// account.
#[derive(Debug, Clone)]
pub struct UserClient<T = UreqTransport> {
    endpoint: Endpoint,
    transport: T,
}

impl UserClient<UreqTransport> {
    pub fn new(api_key: &str, config: &ClientConfig) -> Result<Self, ApiError> {
        Self::with_transport(api_key, config, config.ureq_transport()?)
    }
}

impl<T: Transport> UserClient<T> {
    pub fn with_transport(api_key: &str, config: &ClientConfig, transport: T) -> Result<Self, ApiError> {
        Ok(Self {
            endpoint: Endpoint::new(&config.endpoint, api_key)?,
            transport,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.base()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn user_request<U: Serialize>(&self, operation: &str, user: U) -> Result<HttpRequest, ApiError> {
        self.endpoint
            .post(operation, RequestType::Json, None, &UserBlock { user })
    }

    fn email_request(&self, operation: &str, email: &str) -> Result<HttpRequest, ApiError> {
        check_email(email, "email")?;
        self.user_request(
            operation,
            EmailOnly {
                email: email.trim(),
            },
        )
    }

    fn call<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R, ApiError> {
        exchange(&self.transport, request)
    }

    pub fn build_create_user(&self, account: &UserAccount) -> Result<HttpRequest, ApiError> {
        account.validate()?;
        self.user_request("create_user", account)
    }

    /// Create a new account under the caller's account and return its data.
    /// If the email already has an account, use `create_invitation` instead.
    pub fn create_user(&self, account: &UserAccount) -> Result<Value, ApiError> {
        self.call(self.build_create_user(account)?)
    }

    pub fn build_get_user(&self, email: &str) -> Result<HttpRequest, ApiError> {
        self.email_request("get_user", email)
    }

    pub fn get_user(&self, email: &str) -> Result<Value, ApiError> {
        self.call(self.build_get_user(email)?)
    }

    pub fn build_edit_user(&self, account: &UserAccount) -> Result<HttpRequest, ApiError> {
        account.validate()?;
        self.user_request("edit_user", account)
    }

    pub fn edit_user(&self, account: &UserAccount) -> Result<Value, ApiError> {
        self.call(self.build_edit_user(account)?)
    }

    pub fn build_detach_user(&self, email: &str) -> Result<HttpRequest, ApiError> {
        self.email_request("delete_user", email)
    }

    /// Detach the account from the caller's account. The account itself is
    /// not removed from Shipfunk.
    pub fn detach_user(&self, email: &str) -> Result<StatusMessage, ApiError> {
        self.call(self.build_detach_user(email)?)
    }

    pub fn build_create_invitation(&self, email: &str) -> Result<HttpRequest, ApiError> {
        self.email_request("create_invitation", email)
    }

    /// Invite an existing account to attach itself under the caller's account.
    pub fn create_invitation(&self, email: &str) -> Result<StatusMessage, ApiError> {
        self.call(self.build_create_invitation(email)?)
    }
}
