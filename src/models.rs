use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Form parameters of a single API call, keyed by parameter name.
pub type Params = BTreeMap<String, String>;

/// Remote operation named by the `apimethod` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApiMethod {
    #[serde(rename = "send")]
    Send,
    #[serde(rename = "getAllUsers")]
    GetAllUsers,
}

impl ApiMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::GetAllUsers => "getAllUsers",
        }
    }
}

impl fmt::Display for ApiMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a message is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// One userkey, or a pre-joined comma-separated list passed through as is.
    SingleKey(String),
    KeyList(Vec<String>),
    /// Raw parameters merged into the request, e.g. `user` + `network`.
    NetworkTarget(BTreeMap<String, String>),
}

impl Recipient {
    pub fn user_on_network(user: impl Into<String>, network: impl Into<String>) -> Self {
        Self::NetworkTarget(BTreeMap::from([
            ("user".to_string(), user.into()),
            ("network".to_string(), network.into()),
        ]))
    }

    /// Writes this recipient into `params`, overwriting keys it shares with them.
    pub fn apply_to(&self, params: &mut Params) {
        match self {
            Self::SingleKey(key) => {
                params.insert("userkey".to_string(), key.clone());
            }
            Self::KeyList(keys) => {
                params.insert("userkey".to_string(), keys.join(","));
            }
            Self::NetworkTarget(target) => {
                params.extend(target.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
    }

    /// Interprets a configured `recipient` value.
    ///
    /// Strings become a single key, arrays a key list and tables a network
    /// target. Anything else is not a recipient.
    pub fn from_toml(value: &toml::Value) -> Option<Self> {
        match value {
            toml::Value::String(key) => Some(Self::SingleKey(key.clone())),
            toml::Value::Array(items) => Some(Self::KeyList(
                items.iter().filter_map(scalar_to_string).collect(),
            )),
            toml::Value::Table(table) => Some(Self::NetworkTarget(
                table
                    .iter()
                    .filter_map(|(k, v)| scalar_to_string(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            _ => None,
        }
    }

    /// True when applying this recipient would address nobody.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::SingleKey(key) => key.is_empty(),
            Self::KeyList(keys) => keys.iter().all(String::is_empty),
            Self::NetworkTarget(target) => target.is_empty(),
        }
    }
}

impl From<&str> for Recipient {
    fn from(key: &str) -> Self {
        Self::SingleKey(key.to_string())
    }
}

impl From<Vec<String>> for Recipient {
    fn from(keys: Vec<String>) -> Self {
        Self::KeyList(keys)
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Messaging networks the API documents. Requests accept any name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Jabber,
    Aim,
    Msn,
    Yahoo,
    Gtalk,
    Twitter,
    Sms,
}

impl Network {
    pub const ALL: [Self; 7] = [
        Self::Jabber,
        Self::Aim,
        Self::Msn,
        Self::Yahoo,
        Self::Gtalk,
        Self::Twitter,
        Self::Sms,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jabber => "Jabber",
            Self::Aim => "AIM",
            Self::Msn => "MSN",
            Self::Yahoo => "Yahoo",
            Self::Gtalk => "Gtalk",
            Self::Twitter => "Twitter",
            Self::Sms => "SMS",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown network: {s}"))
    }
}

/// Error envelope the API may embed in an otherwise successful response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApiFault {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendResult {
    /// Value of the root `stat` attribute, e.g. `ok` or `fail`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<ApiFault>,
}

impl SendResult {
    pub fn is_ok(&self) -> bool {
        accepted(self.status.as_deref(), self.fault.as_ref())
    }
}

fn accepted(status: Option<&str>, fault: Option<&ApiFault>) -> bool {
    fault.is_none() && status != Some("fail")
}

impl ApiFault {
    /// One-line description, e.g. `code 100: Invalid botkey`.
    pub fn describe(&self) -> String {
        match (self.code.as_deref(), self.message.as_deref()) {
            (Some(code), Some(message)) => format!("code {code}: {message}"),
            (Some(code), None) => format!("code {code}"),
            (None, Some(message)) => message.to_string(),
            (None, None) => "no error details".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub userkey: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Any other per-user fields the API returned.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserList {
    pub users: Vec<UserRecord>,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<ApiFault>,
    /// Whether the response carried a `users` element at all.
    #[serde(skip)]
    pub users_present: bool,
}

impl UserList {
    pub fn is_ok(&self) -> bool {
        accepted(self.status.as_deref(), self.fault.as_ref())
    }

    pub fn userkeys(&self) -> Vec<String> {
        self.users.iter().map(|u| u.userkey.clone()).collect()
    }
}
