use serde::{Deserialize, Serialize};

use crate::campaign::CampaignStore;
use crate::capabilities::TimerId;
use crate::delivery::DeliveryConfig;
use crate::event::{ApiUrl, ContactInput, InstanceName, ListId};

/// Gateway settings as the UI edits them. The key itself lives in
/// [`RuntimeSecrets`] and never touches the persisted model.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Settings {
    pub api_url: Option<ApiUrl>,
    pub instance: Option<InstanceName>,
    pub default_message: String,
}

/// Runtime-only secrets: do NOT Serialize/Deserialize.
#[derive(Clone, Debug, Default)]
pub struct RuntimeSecrets {
    pub api_key: Option<secrecy::SecretString>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContactList {
    pub id: ListId,
    pub name: String,
    pub contacts: Vec<ContactInput>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Model {
    // Campaign queue
    pub store: CampaignStore,
    pub delivery: DeliveryConfig,

    // Dashboard polling
    pub poll_interval_ms: u64,
    pub polling: bool,
    /// Bumped whenever polling stops or restarts; ticks carrying an older
    /// generation are dropped.
    pub poll_generation: u64,
    pub poll_timer: Option<TimerId>,
    next_timer_id: u64,

    // Settings & gateway
    pub settings: Settings,
    #[serde(skip)]
    pub secrets: RuntimeSecrets,
    pub testing_connection: bool,

    // Contact lists
    pub contact_lists: Vec<ContactList>,
    pub selected_list: Option<ListId>,

    // Generic UI state
    pub restored: bool,
    pub is_refreshing: bool,
    pub active_error: Option<crate::AppError>,
    pub active_toast: Option<String>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            store: CampaignStore::default(),
            delivery: DeliveryConfig::default(),
            poll_interval_ms: crate::DEFAULT_POLL_INTERVAL_MS,
            polling: false,
            poll_generation: 0,
            poll_timer: None,
            next_timer_id: 0,
            settings: Settings::default(),
            secrets: RuntimeSecrets::default(),
            testing_connection: false,
            contact_lists: Vec::new(),
            selected_list: None,
            restored: false,
            is_refreshing: false,
            active_error: None,
            active_toast: None,
        }
    }

    /// Timer ids are never reused within one core instance.
    pub fn allocate_timer_id(&mut self) -> TimerId {
        self.next_timer_id += 1;
        TimerId(self.next_timer_id)
    }
}
