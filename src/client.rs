use crate::config::Config;
use crate::error::ClientError;
use crate::models::{ApiFault, ApiMethod, Params, Recipient, SendResult, UserList};
use crate::response::{decode_send_result, decode_user_list};

/// Authenticated client for the IMified bot API.
///
/// Every call is a single form-encoded POST to the configured endpoint with
/// HTTP basic auth. Calls are never retried.
pub struct BotClient {
    http: reqwest::Client,
    config: Config,
}

impl BotClient {
    /// Create a client whose transport timeout follows `config`.
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ClientError::HttpClient)?;
        Ok(Self::with_http(config, http))
    }

    /// Create a client on top of an existing reqwest client.
    pub fn with_http(config: Config, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn get_config(&self, key: &str) -> Option<&toml::Value> {
        self.config.get(key)
    }

    pub fn set_config(
        &mut self,
        key: impl Into<String>,
        value: impl Into<toml::Value>,
    ) -> &mut Self {
        self.config.set(key, value);
        self
    }

    pub fn replace_config(&mut self, values: toml::Table) {
        self.config.replace(values);
    }

    /// Push `message` to `recipient`, or to the configured default recipient
    /// when none (or an empty one) is given.
    pub async fn send_message(
        &self,
        message: &str,
        recipient: Option<&Recipient>,
    ) -> Result<SendResult, ClientError> {
        let configured;
        let recipient = match recipient.filter(|r| !r.is_empty()) {
            Some(r) => r,
            None => {
                configured = self
                    .config
                    .recipient()
                    .filter(|r| !r.is_empty())
                    .ok_or(ClientError::NoRecipient)?;
                &configured
            }
        };

        let mut params = Params::from([("msg".to_string(), message.to_string())]);
        recipient.apply_to(&mut params);

        let result = self
            .request(ApiMethod::Send, params, decode_send_result)
            .await?;
        if let Some(ref fault) = result.fault {
            tracing::warn!(
                code = fault.code.as_deref().unwrap_or_default(),
                "API reported a failure: {}",
                fault.message.as_deref().unwrap_or("(no message)")
            );
        }
        Ok(result)
    }

    /// Fetch every user of the bot, optionally only those on `network`.
    pub async fn get_all_users(&self, network: Option<&str>) -> Result<UserList, ClientError> {
        let mut params = Params::new();
        if let Some(network) = network.filter(|n| !n.is_empty()) {
            params.insert("network".to_string(), network.to_string());
        }

        let users = self
            .request(ApiMethod::GetAllUsers, params, decode_user_list)
            .await?;
        tracing::debug!(count = users.count, "Fetched bot users");
        Ok(users)
    }

    /// Send `message` to every user in one request.
    ///
    /// With no users the joined recipient is empty, so the configured default
    /// recipient applies. A rejected or malformed user listing, or a rejected
    /// send, fails the whole broadcast.
    pub async fn send_message_to_all_users(&self, message: &str) -> Result<(), ClientError> {
        let users = self.get_all_users(None).await?;
        ensure_accepted(ApiMethod::GetAllUsers, users.is_ok(), users.fault.as_ref())?;
        if !users.users_present {
            return Err(ClientError::InvalidResponse {
                method: ApiMethod::GetAllUsers,
                detail: "response has no <users> element".to_string(),
            });
        }

        let keys = users.userkeys();
        tracing::info!(recipients = keys.len(), "Broadcasting message to all users");
        let result = self
            .send_message(message, Some(&Recipient::KeyList(keys)))
            .await?;
        ensure_accepted(ApiMethod::Send, result.is_ok(), result.fault.as_ref())
    }

    async fn request<T>(
        &self,
        method: ApiMethod,
        mut params: Params,
        decode: fn(&[u8]) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        params.insert("apimethod".to_string(), method.as_str().to_string());
        params.insert("botkey".to_string(), self.config.botkey().to_string());

        let endpoint = self.config.endpoint();
        tracing::debug!(%method, endpoint, "Sending API request");

        let failed = |source: reqwest::Error| {
            tracing::warn!(%method, "API request failed: {source}");
            ClientError::RequestFailed { method, source }
        };

        let response = self
            .http
            .post(endpoint)
            .basic_auth(self.config.username(), Some(self.config.password()))
            .form(&params)
            .send()
            .await
            .map_err(failed)?;
        let status_error = response.error_for_status_ref().err();
        let body = response.bytes().await.map_err(failed)?;

        let Some(status_error) = status_error else {
            return decode(&body);
        };
        // Error statuses may still carry the API's XML error envelope.
        match decode(&body) {
            Ok(decoded) => {
                tracing::warn!(%method, "API answered with {status_error}");
                Ok(decoded)
            }
            Err(_) => Err(failed(status_error)),
        }
    }
}

fn ensure_accepted(
    method: ApiMethod,
    accepted: bool,
    fault: Option<&ApiFault>,
) -> Result<(), ClientError> {
    if accepted {
        return Ok(());
    }
    Err(ClientError::Rejected {
        method,
        detail: fault.map_or_else(|| "stat=\"fail\"".to_string(), ApiFault::describe),
    })
}
