#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod campaign;
pub mod capabilities;
pub mod delivery;
pub mod event;
pub mod model;
pub mod storage;

#[cfg(not(target_arch = "wasm32"))]
pub mod dispatch;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use event::Event;
pub use model::Model;

/// Dashboard refresh cadence. The shell's timer drives it; a stale tick from
/// a previous polling generation is dropped, never acted on.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Key the campaign queue is persisted under in shell key-value storage.
pub const STORE_KEY: &str = "campaign_store_v1";

/// Management backend the dashboard is served from.
pub const BACKEND_BASE_URL: &str = "http://localhost:3000";

pub const SETTINGS_PATH: &str = "api/settings";
pub const LISTS_PATH: &str = "api/lists";
pub const CONNECTION_STATE_PATH: &str = "instance/connectionState";

// ============================================================================
// Error taxonomy
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Validation,
    NotFound,
    Conflict,
    Storage,
    Serialization,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Storage => "storage",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Internal => "internal",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            ErrorKind::Network | ErrorKind::Storage => ErrorSeverity::Transient,
            ErrorKind::Validation
            | ErrorKind::NotFound
            | ErrorKind::Conflict
            | ErrorKind::Serialization => ErrorSeverity::Permanent,
            ErrorKind::Internal => ErrorSeverity::Fatal,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::Storage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    /// Message shown to the operator. The dashboard is pt-BR, matching the
    /// wire status labels.
    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Não foi possível conectar. Verifique sua conexão e tente novamente.".into()
            }
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::NotFound => "Registro não encontrado.".into(),
            ErrorKind::Conflict => "Operação já realizada.".into(),
            ErrorKind::Storage => "Falha ao salvar os dados localmente.".into(),
            ErrorKind::Serialization => "Resposta inválida do servidor.".into(),
            ErrorKind::Internal => "Erro inesperado. Tente novamente mais tarde.".into(),
        }
    }
}

impl From<campaign::CampaignError> for AppError {
    fn from(error: campaign::CampaignError) -> Self {
        let kind = match error {
            campaign::CampaignError::NotFound(_) => ErrorKind::NotFound,
            campaign::CampaignError::AlreadyResolved { .. } => ErrorKind::Conflict,
            _ => ErrorKind::Validation,
        };
        AppError::new(kind, error.to_string())
    }
}

// ============================================================================
// View model
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsView {
    pub sent: usize,
    pub pending: usize,
    pub error: usize,
    pub total: usize,
}

impl From<campaign::StoreStats> for StatsView {
    fn from(stats: campaign::StoreStats) -> Self {
        Self {
            sent: stats.sent,
            pending: stats.pending,
            error: stats.error,
            total: stats.total,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRow {
    pub id: u64,
    pub name: String,
    pub destination: String,
    pub status: campaign::DeliveryStatus,
    pub status_label: String,
    pub created_at: u64,
}

impl From<&campaign::Job> for JobRow {
    fn from(job: &campaign::Job) -> Self {
        Self {
            id: job.id.0,
            name: job.name.clone(),
            destination: job.destination.clone(),
            status: job.status,
            status_label: job.status.label().to_string(),
            created_at: job.created_at.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFacingError {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl From<&AppError> for UserFacingError {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.user_facing_message(),
            retryable: error.is_retryable(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactListView {
    pub id: String,
    pub name: String,
    pub contact_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub stats: StatsView,
    pub rows: Vec<JobRow>,
    pub polling: bool,
    pub is_refreshing: bool,
    pub testing_connection: bool,
    pub gateway_configured: bool,
    pub default_message: String,
    pub contact_lists: Vec<ContactListView>,
    pub selected_list: Option<String>,
    pub error: Option<UserFacingError>,
    pub toast: Option<String>,
}

// ============================================================================
// App core
// ============================================================================

pub mod app {
    use super::*;
    use crate::campaign::{render_template, CampaignStore, JobId, Recipient, UnixTimeMs};
    use crate::capabilities::TimerOutput;
    use crate::delivery::{DeliveryBackend, SimulatedGateway};
    use crate::event::{
        ApiUrl, ContactDto, ContactInput, ContactListDto, InstanceName, KvOutcome,
        MessageTemplate, SettingsDto, SubmitPayload,
    };
    use crate::model::ContactList;
    use secrecy::{ExposeSecret, SecretString};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn backend(path: &str) -> String {
            format!("{BACKEND_BASE_URL}/{path}")
        }

        fn persist_store(model: &Model, caps: &Capabilities) {
            match serde_json::to_vec(&model.store) {
                Ok(bytes) => {
                    caps.kv.set(STORE_KEY.to_string(), bytes, |result| {
                        Event::StoreWritten(KvOutcome::from_set(result))
                    });
                }
                Err(e) => {
                    caps.telemetry.error("store_serialize_failed", &e.to_string());
                }
            }
        }

        fn schedule_poll(model: &mut Model, caps: &Capabilities) {
            let id = model.allocate_timer_id();
            model.poll_timer = Some(id);
            let generation = model.poll_generation;
            caps.timer
                .start(id, model.poll_interval_ms, move |output| match output {
                    TimerOutput::Fired { .. } => Event::PollTicked { generation },
                    TimerOutput::Cancelled { id } => Event::TimerCancelled { id },
                });
        }

        fn schedule_delivery(model: &mut Model, caps: &Capabilities, job_id: JobId) {
            let Some(job) = model.store.get(job_id) else {
                return;
            };
            let gateway = SimulatedGateway::new(model.delivery).unwrap_or_default();
            let delay_ms = gateway.schedule(job).as_millis() as u64;
            let id = model.allocate_timer_id();
            caps.timer.start(id, delay_ms, move |output| match output {
                TimerOutput::Fired { .. } => Event::DeliveryTimerFired { job_id },
                TimerOutput::Cancelled { id } => Event::TimerCancelled { id },
            });
        }

        fn restore_store(model: &mut Model, caps: &Capabilities, bytes: &[u8]) {
            match serde_json::from_slice::<CampaignStore>(bytes) {
                Ok(store) => {
                    caps.telemetry
                        .event("store_restored", &[("jobs", &store.len().to_string())]);
                    model.store = store;
                }
                Err(e) => {
                    // Start from an empty queue rather than refusing to boot.
                    caps.telemetry.error("store_restore_failed", &e.to_string());
                }
            }
        }

        fn apply_settings_dto(model: &mut Model, caps: &Capabilities, dto: SettingsDto) {
            match ApiUrl::new(&dto.api_url) {
                Ok(url) => model.settings.api_url = Some(url),
                Err(e) => {
                    caps.telemetry.error("settings_bad_url", &e.to_string());
                    model.settings.api_url = None;
                }
            }
            model.settings.instance = if dto.instance.is_empty() {
                None
            } else {
                Some(InstanceName::new(dto.instance))
            };
            model.settings.default_message = dto.default_message;
            model.secrets.api_key = if dto.api_key.is_empty() {
                None
            } else {
                Some(SecretString::new(dto.api_key))
            };
        }

        /// Validate a submission end to end before any job exists. Returns
        /// the typed template and recipients, or the first failure.
        fn validate_payload(
            payload: &SubmitPayload,
        ) -> Result<(MessageTemplate, Vec<Recipient>), AppError> {
            let template = MessageTemplate::new(&payload.message)
                .map_err(|e| AppError::new(ErrorKind::Validation, e.to_string()))?;
            let mut recipients = Vec::with_capacity(payload.contacts.len());
            for (index, contact) in payload.contacts.iter().enumerate() {
                let recipient = Recipient::new(&contact.name, &contact.destination)
                    .map_err(|reason| campaign::CampaignError::InvalidRecipient { index, reason })
                    .map_err(AppError::from)?;
                recipients.push(recipient);
            }
            CampaignStore::validate_submission(template.as_str(), &recipients)
                .map_err(AppError::from)?;
            Ok((template, recipients))
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            caps.telemetry.counter(&format!("event.{}", event.name()), 1);

            match event {
                Event::AppStarted => {
                    caps.kv.get(STORE_KEY.to_string(), |result| {
                        Event::StoreRestored(KvOutcome::from_get(result))
                    });
                    caps.http
                        .get(Self::backend(SETTINGS_PATH))
                        .send(|result| Event::SettingsFetched(Box::new(result.into())));
                    caps.render.render();
                }

                Event::StoreRestored(outcome) => {
                    match outcome {
                        KvOutcome::Read(Some(bytes)) => {
                            Self::restore_store(model, caps, &bytes);
                        }
                        KvOutcome::Read(None) => {}
                        KvOutcome::Written(_) => {
                            caps.telemetry
                                .error("store_restore_failed", "unexpected write output");
                        }
                    }
                    model.restored = true;
                    caps.render.render();
                }

                Event::StoreWritten(outcome) => {
                    if matches!(outcome, KvOutcome::Written(false)) {
                        caps.telemetry.error("store_persist_failed", STORE_KEY);
                        model.active_error =
                            Some(AppError::new(ErrorKind::Storage, "persist failed"));
                        caps.render.render();
                    }
                }

                Event::DashboardOpened => {
                    // Reopening while already polling replaces the pending
                    // shell timer instead of orphaning it.
                    if let Some(id) = model.poll_timer.take() {
                        caps.timer.cancel(id);
                    }
                    model.polling = true;
                    model.poll_generation += 1;
                    Self::schedule_poll(model, caps);
                    caps.render.render();
                }

                Event::DashboardClosed => {
                    model.polling = false;
                    model.poll_generation += 1;
                    if let Some(id) = model.poll_timer.take() {
                        caps.timer.cancel(id);
                    }
                    caps.render.render();
                }

                Event::PollTicked { generation } => {
                    if !model.polling || generation != model.poll_generation {
                        caps.telemetry.counter("poll.stale_tick", 1);
                        return;
                    }
                    Self::schedule_poll(model, caps);
                    caps.render.render();
                }

                Event::RefreshRequested => {
                    // Stats and rows are derived straight from the store, so a
                    // manual refresh is just a re-render.
                    caps.render.render();
                }

                Event::SubmitRequested(payload) => {
                    let (template, recipients) = match Self::validate_payload(&payload) {
                        Ok(validated) => validated,
                        Err(error) => {
                            caps.telemetry
                                .error("submit_rejected", &error.message);
                            model.active_error = Some(error);
                            caps.render.render();
                            return;
                        }
                    };

                    let now = UnixTimeMs::now();
                    match model.store.insert_batch(template.as_str(), &recipients, now) {
                        Ok(ids) => {
                            caps.telemetry
                                .event("batch_submitted", &[("jobs", &ids.len().to_string())]);
                            for job_id in ids {
                                Self::schedule_delivery(model, caps, job_id);
                            }
                            Self::persist_store(model, caps);
                            model.active_toast =
                                Some(format!("{} mensagens na fila", recipients.len()));
                        }
                        Err(error) => {
                            caps.telemetry.error("submit_rejected", &error.to_string());
                            model.active_error = Some(error.into());
                        }
                    }
                    caps.render.render();
                }

                Event::DeliveryTimerFired { job_id } => {
                    let Some(job) = model.store.get(job_id).cloned() else {
                        // Queue was cleared while the timer was pending.
                        caps.telemetry.counter("delivery.stale_resolution", 1);
                        return;
                    };
                    let gateway = SimulatedGateway::new(model.delivery).unwrap_or_default();
                    // Each job carries the template it was submitted with;
                    // later submissions never change an in-flight body.
                    let body = render_template(&job.message, &job.name);
                    let outcome = gateway.resolve(&job, &body);

                    match model.store.resolve(job_id, outcome, UnixTimeMs::now()) {
                        Ok(job) => {
                            caps.telemetry
                                .counter(&format!("delivery.{}", job.status.label()), 1);
                            Self::persist_store(model, caps);
                            caps.render.render();
                        }
                        Err(error) => {
                            // Double fire for the same job; first one won.
                            caps.telemetry
                                .counter("delivery.duplicate_resolution", 1);
                            caps.telemetry
                                .error("delivery_resolve_failed", &error.to_string());
                        }
                    }
                }

                Event::ClearAllRequested => {
                    let removed = model.store.len();
                    model.store.clear_all();
                    Self::persist_store(model, caps);
                    caps.telemetry
                        .event("queue_cleared", &[("removed", &removed.to_string())]);
                    model.active_toast = Some("Fila limpa".into());
                    caps.render.render();
                }

                Event::SettingsOpened => {
                    model.is_refreshing = true;
                    caps.http
                        .get(Self::backend(SETTINGS_PATH))
                        .send(|result| Event::SettingsFetched(Box::new(result.into())));
                    caps.render.render();
                }

                Event::SettingsFetched(outcome) => {
                    model.is_refreshing = false;
                    match outcome.ok_body() {
                        Some(body) => match serde_json::from_slice::<SettingsDto>(body) {
                            Ok(dto) => Self::apply_settings_dto(model, caps, dto),
                            Err(e) => {
                                caps.telemetry
                                    .error("settings_parse_failed", &e.to_string());
                                model.active_error = Some(
                                    AppError::new(ErrorKind::Serialization, "settings parse")
                                        .with_internal(e.to_string()),
                                );
                            }
                        },
                        None => {
                            caps.telemetry.error("settings_fetch_failed", "");
                            model.active_error =
                                Some(AppError::new(ErrorKind::Network, "settings fetch"));
                        }
                    }
                    caps.render.render();
                }

                Event::SettingsSaveRequested(payload) => {
                    model.settings.api_url = Some(payload.api_url.clone());
                    model.settings.instance = Some(payload.instance.clone());
                    model.settings.default_message = payload.default_message.clone();
                    model.secrets.api_key =
                        Some(SecretString::new(payload.api_key.expose().to_string()));

                    let dto = SettingsDto {
                        api_url: payload.api_url.as_str().to_string(),
                        api_key: payload.api_key.expose().to_string(),
                        instance: payload.instance.as_str().to_string(),
                        default_message: payload.default_message.clone(),
                    };
                    match caps.http.post(Self::backend(SETTINGS_PATH)).body_json(&dto) {
                        Ok(builder) => {
                            builder.send(|result| Event::SettingsSaved(Box::new(result.into())));
                        }
                        Err(e) => {
                            caps.telemetry
                                .error("settings_serialize_failed", &e.to_string());
                            model.active_error =
                                Some(AppError::new(ErrorKind::Serialization, "settings save"));
                        }
                    }
                    caps.render.render();
                }

                Event::SettingsSaved(outcome) => {
                    if outcome.ok_body().is_some() {
                        model.active_toast = Some("Configurações salvas".into());
                    } else {
                        caps.telemetry.error("settings_save_failed", "");
                        model.active_error =
                            Some(AppError::new(ErrorKind::Network, "settings save"));
                    }
                    caps.render.render();
                }

                Event::TestConnectionRequested => {
                    let (Some(url), Some(key)) =
                        (model.settings.api_url.clone(), model.secrets.api_key.clone())
                    else {
                        model.active_error = Some(AppError::new(
                            ErrorKind::Validation,
                            "Configure o gateway antes de testar a conexão.",
                        ));
                        caps.render.render();
                        return;
                    };
                    model.testing_connection = true;
                    caps.http
                        .get(url.join(CONNECTION_STATE_PATH))
                        .header("apikey", key.expose_secret())
                        .send(|result| Event::ConnectionTested(Box::new(result.into())));
                    caps.render.render();
                }

                Event::ConnectionTested(outcome) => {
                    model.testing_connection = false;
                    if outcome.ok_body().is_some() {
                        caps.telemetry.event("gateway_reachable", &[]);
                        model.active_toast = Some("Gateway conectado".into());
                    } else {
                        caps.telemetry.error("gateway_unreachable", "");
                        model.active_error =
                            Some(AppError::new(ErrorKind::Network, "connection test"));
                    }
                    caps.render.render();
                }

                Event::ContactListsRequested => {
                    model.is_refreshing = true;
                    caps.http
                        .get(Self::backend(LISTS_PATH))
                        .send(|result| Event::ContactListsFetched(Box::new(result.into())));
                    caps.render.render();
                }

                Event::ContactListsFetched(outcome) => {
                    model.is_refreshing = false;
                    match outcome.ok_body() {
                        Some(body) => match serde_json::from_slice::<Vec<ContactListDto>>(body) {
                            Ok(lists) => {
                                model.contact_lists = lists
                                    .into_iter()
                                    .map(|dto| ContactList {
                                        id: crate::event::ListId::new(dto.id),
                                        name: dto.name,
                                        contacts: dto
                                            .contacts
                                            .into_iter()
                                            .map(|c| ContactInput {
                                                name: c.name,
                                                destination: c.phone,
                                            })
                                            .collect(),
                                    })
                                    .collect();
                            }
                            Err(e) => {
                                caps.telemetry.error("lists_parse_failed", &e.to_string());
                                model.active_error =
                                    Some(AppError::new(ErrorKind::Serialization, "lists parse"));
                            }
                        },
                        None => {
                            caps.telemetry.error("lists_fetch_failed", "");
                            model.active_error =
                                Some(AppError::new(ErrorKind::Network, "lists fetch"));
                        }
                    }
                    caps.render.render();
                }

                Event::ContactListSelected { list_id } => {
                    model.selected_list = Some(list_id.clone());
                    let loaded = model
                        .contact_lists
                        .iter()
                        .any(|l| l.id == list_id && !l.contacts.is_empty());
                    if !loaded {
                        let path = format!("{LISTS_PATH}/{}/contacts", list_id.as_str());
                        caps.http.get(Self::backend(&path)).send(move |result| {
                            Event::ContactsFetched {
                                list_id: list_id.clone(),
                                outcome: Box::new(result.into()),
                            }
                        });
                    }
                    caps.render.render();
                }

                Event::ContactsFetched { list_id, outcome } => {
                    match outcome.ok_body() {
                        Some(body) => match serde_json::from_slice::<Vec<ContactDto>>(body) {
                            Ok(contacts) => {
                                if let Some(list) =
                                    model.contact_lists.iter_mut().find(|l| l.id == list_id)
                                {
                                    list.contacts = contacts
                                        .into_iter()
                                        .map(|c| ContactInput {
                                            name: c.name,
                                            destination: c.phone,
                                        })
                                        .collect();
                                }
                            }
                            Err(e) => {
                                caps.telemetry
                                    .error("contacts_parse_failed", &e.to_string());
                            }
                        },
                        None => {
                            caps.telemetry.error("contacts_fetch_failed", "");
                        }
                    }
                    caps.render.render();
                }

                Event::TimerCancelled { id } => {
                    if model.poll_timer == Some(id) {
                        model.poll_timer = None;
                    }
                }

                Event::DismissError => {
                    model.active_error = None;
                    caps.render.render();
                }

                Event::DismissToast => {
                    model.active_toast = None;
                    caps.render.render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            ViewModel {
                stats: model.store.stats().into(),
                rows: model
                    .store
                    .jobs_newest_first()
                    .iter()
                    .map(JobRow::from)
                    .collect(),
                polling: model.polling,
                is_refreshing: model.is_refreshing,
                testing_connection: model.testing_connection,
                gateway_configured: model.settings.api_url.is_some()
                    && model.secrets.api_key.is_some(),
                default_message: model.settings.default_message.clone(),
                contact_lists: model
                    .contact_lists
                    .iter()
                    .map(|list| ContactListView {
                        id: list.id.as_str().to_string(),
                        name: list.name.clone(),
                        contact_count: list.contacts.len(),
                    })
                    .collect(),
                selected_list: model.selected_list.as_ref().map(|id| id.as_str().to_string()),
                error: model.active_error.as_ref().map(UserFacingError::from),
                toast: model.active_toast.clone(),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::campaign::DeliveryOutcome;
        use crux_core::App as _;

        fn model_with_jobs() -> Model {
            let mut model = Model::new();
            let recipients = vec![
                Recipient::new("Ana", "+5511999990001").unwrap(),
                Recipient::new("Bruno", "+5511999990002").unwrap(),
            ];
            model
                .store
                .insert_batch("Olá {{nome}}", &recipients, UnixTimeMs(10))
                .unwrap();
            model
        }

        #[test]
        fn view_reports_derived_stats() {
            let model = model_with_jobs();
            let view = App.view(&model);
            assert_eq!(view.stats.total, 2);
            assert_eq!(view.stats.pending, 2);
            assert_eq!(view.stats.sent + view.stats.error, 0);
        }

        #[test]
        fn view_rows_carry_wire_labels() {
            let mut model = model_with_jobs();
            model
                .store
                .resolve(JobId(1), DeliveryOutcome::Delivered, UnixTimeMs(20))
                .unwrap();
            let view = App.view(&model);
            let labels: Vec<_> = view.rows.iter().map(|r| r.status_label.as_str()).collect();
            assert!(labels.contains(&"enviado"));
            assert!(labels.contains(&"pendente"));
        }

        #[test]
        fn validate_payload_rejects_bad_contact_with_index() {
            let payload = SubmitPayload {
                message: "Olá {{nome}}".into(),
                contacts: vec![
                    ContactInput {
                        name: "Ana".into(),
                        destination: "+5511999990001".into(),
                    },
                    ContactInput {
                        name: "Bruno".into(),
                        destination: "not-a-phone".into(),
                    },
                ],
            };
            let error = App::validate_payload(&payload).unwrap_err();
            assert_eq!(error.kind, ErrorKind::Validation);
            assert!(error.message.contains("position 1"));
        }

        #[test]
        fn validate_payload_accepts_clean_batch() {
            let payload = SubmitPayload {
                message: "Olá {{nome}}".into(),
                contacts: vec![ContactInput {
                    name: "Ana".into(),
                    destination: "5511999990001".into(),
                }],
            };
            let (template, recipients) = App::validate_payload(&payload).unwrap();
            assert_eq!(template.as_str(), "Olá {{nome}}");
            assert_eq!(recipients.len(), 1);
            assert_eq!(recipients[0].name, "Ana");
        }

        #[test]
        fn error_severity_defaults_follow_kind() {
            assert_eq!(
                ErrorKind::Network.default_severity(),
                ErrorSeverity::Transient
            );
            assert_eq!(
                ErrorKind::Validation.default_severity(),
                ErrorSeverity::Permanent
            );
            assert!(AppError::new(ErrorKind::Storage, "x").is_retryable());
            assert!(!AppError::new(ErrorKind::Conflict, "x").is_retryable());
        }

        #[test]
        fn user_facing_validation_message_passes_through() {
            let error = AppError::new(ErrorKind::Validation, "mensagem vazia");
            assert_eq!(error.user_facing_message(), "mensagem vazia");
        }
    }
}
