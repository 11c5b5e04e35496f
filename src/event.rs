use serde::{Deserialize, Serialize};
use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::campaign::JobId;
use crate::capabilities::TimerId;

// --- Typed IDs ---

macro_rules! typed_id {
    ($name:ident) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(ListId);
typed_id!(InstanceName);

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("message template is empty")]
    EmptyTemplate,
    #[error("value too long ({len} > {max})")]
    TooLong { len: usize, max: usize },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

// --- Message template: validated, bounded ---

pub const MAX_TEMPLATE_LENGTH: usize = 4096;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MessageTemplate(String);

impl MessageTemplate {
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        if s.trim().is_empty() {
            return Err(ValidationError::EmptyTemplate);
        }
        if s.len() > MAX_TEMPLATE_LENGTH {
            return Err(ValidationError::TooLong {
                len: s.len(),
                max: MAX_TEMPLATE_LENGTH,
            });
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// --- Validated gateway URL ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ApiUrl(String);

impl ApiUrl {
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let s = s.into();
        let parsed = url::Url::parse(&s).map_err(|_| ValidationError::InvalidUrl(s.clone()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ValidationError::InvalidUrl(s));
        }
        Ok(Self(s.trim_end_matches('/').to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a path onto the base, keeping exactly one slash between them.
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }
}

// --- Gateway API key: redacted Debug, exposed only on the wire ---

#[derive(Clone, Deserialize)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(SecretString::new(s.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl PartialEq for ApiKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.expose_secret() == other.0.expose_secret()
    }
}

impl Eq for ApiKey {}

// The key has to cross to the shell inside settings payloads, so serialization
// exposes it. Logging goes through Debug, which stays redacted.
impl Serialize for ApiKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.expose_secret())
    }
}

// --- Raw contact input, validated into a Recipient at submit time ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContactInput {
    pub name: String,
    pub destination: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SubmitPayload {
    pub message: String,
    pub contacts: Vec<ContactInput>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SettingsPayload {
    pub api_url: ApiUrl,
    pub api_key: ApiKey,
    pub instance: InstanceName,
    pub default_message: String,
}

// --- Wire DTOs for the management backend ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDto {
    pub api_url: String,
    pub api_key: String,
    pub instance: String,
    #[serde(default)]
    pub default_message: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContactListDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub contacts: Vec<ContactDto>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContactDto {
    pub name: String,
    pub phone: String,
}

// --- Serializable snapshots of capability results ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum HttpOutcome {
    Response { status: u16, body: Vec<u8> },
    Failure { message: String },
}

impl HttpOutcome {
    pub fn ok_body(&self) -> Option<&[u8]> {
        match self {
            HttpOutcome::Response { status, body } if (200..300).contains(status) => {
                Some(body.as_slice())
            }
            _ => None,
        }
    }
}

impl From<crux_http::Result<crux_http::Response<Vec<u8>>>> for HttpOutcome {
    fn from(result: crux_http::Result<crux_http::Response<Vec<u8>>>) -> Self {
        match result {
            Ok(mut response) => HttpOutcome::Response {
                status: response.status().into(),
                body: response.take_body().unwrap_or_default(),
            },
            Err(error) => HttpOutcome::Failure {
                message: error.to_string(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum KvOutcome {
    Read(Option<Vec<u8>>),
    Written(bool),
}

impl KvOutcome {
    pub fn from_get(result: Result<Option<Vec<u8>>, crux_kv::error::KeyValueError>) -> Self {
        KvOutcome::Read(result.unwrap_or_default())
    }

    pub fn from_set(result: Result<Option<Vec<u8>>, crux_kv::error::KeyValueError>) -> Self {
        KvOutcome::Written(result.is_ok())
    }
}

// --- Event enum: large variants boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle
    AppStarted,
    StoreRestored(KvOutcome),
    StoreWritten(KvOutcome),

    // Dashboard
    DashboardOpened,
    DashboardClosed,
    PollTicked { generation: u64 },
    RefreshRequested,

    // Campaign
    SubmitRequested(Box<SubmitPayload>),
    DeliveryTimerFired { job_id: JobId },
    ClearAllRequested,

    // Settings & gateway
    SettingsOpened,
    SettingsFetched(Box<HttpOutcome>),
    SettingsSaveRequested(Box<SettingsPayload>),
    SettingsSaved(Box<HttpOutcome>),
    TestConnectionRequested,
    ConnectionTested(Box<HttpOutcome>),

    // Contact lists
    ContactListsRequested,
    ContactListsFetched(Box<HttpOutcome>),
    ContactListSelected { list_id: ListId },
    ContactsFetched { list_id: ListId, outcome: Box<HttpOutcome> },

    // Housekeeping
    TimerCancelled { id: TimerId },
    DismissError,
    DismissToast,
}

impl Event {
    /// Stable name for telemetry counters.
    pub fn name(&self) -> &'static str {
        match self {
            Event::AppStarted => "app_started",
            Event::StoreRestored(_) => "store_restored",
            Event::StoreWritten(_) => "store_written",
            Event::DashboardOpened => "dashboard_opened",
            Event::DashboardClosed => "dashboard_closed",
            Event::PollTicked { .. } => "poll_ticked",
            Event::RefreshRequested => "refresh_requested",
            Event::SubmitRequested(_) => "submit_requested",
            Event::DeliveryTimerFired { .. } => "delivery_timer_fired",
            Event::ClearAllRequested => "clear_all_requested",
            Event::SettingsOpened => "settings_opened",
            Event::SettingsFetched(_) => "settings_fetched",
            Event::SettingsSaveRequested(_) => "settings_save_requested",
            Event::SettingsSaved(_) => "settings_saved",
            Event::TestConnectionRequested => "test_connection_requested",
            Event::ConnectionTested(_) => "connection_tested",
            Event::ContactListsRequested => "contact_lists_requested",
            Event::ContactListsFetched(_) => "contact_lists_fetched",
            Event::ContactListSelected { .. } => "contact_list_selected",
            Event::ContactsFetched { .. } => "contacts_fetched",
            Event::TimerCancelled { .. } => "timer_cancelled",
            Event::DismissError => "dismiss_error",
            Event::DismissToast => "dismiss_toast",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rejects_blank_input() {
        assert!(MessageTemplate::new("").is_err());
        assert!(MessageTemplate::new("   \n\t").is_err());
        assert!(MessageTemplate::new("Olá {{nome}}!").is_ok());
    }

    #[test]
    fn template_enforces_length_limit() {
        let long = "x".repeat(MAX_TEMPLATE_LENGTH + 1);
        assert!(matches!(
            MessageTemplate::new(long),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn api_url_requires_http_scheme() {
        assert!(ApiUrl::new("https://gateway.example.com").is_ok());
        assert!(ApiUrl::new("http://localhost:8080").is_ok());
        assert!(ApiUrl::new("ftp://gateway.example.com").is_err());
        assert!(ApiUrl::new("not a url").is_err());
    }

    #[test]
    fn api_url_join_normalizes_slashes() {
        let base = ApiUrl::new("https://gw.example.com/").unwrap();
        assert_eq!(
            base.join("/instance/connectionState"),
            "https://gw.example.com/instance/connectionState"
        );
        assert_eq!(base.join("api/lists"), "https://gw.example.com/api/lists");
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("super-secret-key");
        assert_eq!(format!("{key:?}"), "[REDACTED]");
        assert_eq!(key.expose(), "super-secret-key");
    }

    #[test]
    fn http_outcome_gates_on_status() {
        let ok = HttpOutcome::Response {
            status: 200,
            body: b"hello".to_vec(),
        };
        assert_eq!(ok.ok_body(), Some(&b"hello"[..]));

        let not_found = HttpOutcome::Response {
            status: 404,
            body: vec![],
        };
        assert!(not_found.ok_body().is_none());

        let failed = HttpOutcome::Failure {
            message: "connection refused".into(),
        };
        assert!(failed.ok_body().is_none());
    }

    #[test]
    fn settings_dto_uses_camel_case_keys() {
        let json = r#"{"apiUrl":"https://gw.example.com","apiKey":"k","instance":"main"}"#;
        let dto: SettingsDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.api_url, "https://gw.example.com");
        assert_eq!(dto.instance, "main");
        assert_eq!(dto.default_message, "");
    }
}
