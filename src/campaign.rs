use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_JOBS: usize = 10_000;
pub const MAX_BATCH_SIZE: usize = 1_000;
pub const MAX_NAME_LENGTH: usize = 256;
pub const MAX_DESTINATION_LENGTH: usize = 20;
pub const NAME_PLACEHOLDER: &str = "{{nome}}";

/// Unix timestamp in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    pub fn now() -> Self {
        Self(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        )
    }
}

/// Store-assigned job identifier. Monotonic within one store, never reused,
/// not even after clear-all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CampaignError {
    #[error("message template is empty")]
    EmptyMessage,

    #[error("no recipients provided")]
    NoRecipients,

    #[error("invalid recipient at position {index}: {reason}")]
    InvalidRecipient { index: usize, reason: String },

    #[error("store is full ({0} jobs)")]
    Full(usize),

    #[error("batch too large: {count} recipients, max {max}")]
    BatchTooLarge { count: usize, max: usize },

    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("job {id} already resolved as {status}")]
    AlreadyResolved { id: JobId, status: DeliveryStatus },
}

// ============================================================================
// Delivery status: single-shot state machine
// ============================================================================

/// Per-job delivery status. Serialized with the legacy labels the dashboard
/// and the persisted rows use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    #[serde(rename = "pendente")]
    Pending,
    #[serde(rename = "enviado")]
    Sent,
    #[serde(rename = "erro")]
    Error,
}

impl DeliveryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pendente",
            DeliveryStatus::Sent => "enviado",
            DeliveryStatus::Error => "erro",
        }
    }

    /// Sent and Error are terminal. No transition leaves them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryStatus::Pending)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal outcome reported by a delivery backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

impl DeliveryOutcome {
    pub fn status(self) -> DeliveryStatus {
        match self {
            DeliveryOutcome::Delivered => DeliveryStatus::Sent,
            DeliveryOutcome::Failed => DeliveryStatus::Error,
        }
    }
}

// ============================================================================
// Recipients and jobs
// ============================================================================

/// One {name, destination} pair as handed over by the contact-list service.
/// Fields are trimmed and validated on construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub destination: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, destination: impl Into<String>) -> Result<Self, String> {
        let name = name.into().trim().to_string();
        let destination = destination.into().trim().to_string();

        if name.is_empty() {
            return Err("name is empty".into());
        }
        if name.len() > MAX_NAME_LENGTH {
            return Err(format!("name exceeds {} bytes", MAX_NAME_LENGTH));
        }
        if destination.is_empty() {
            return Err("destination is empty".into());
        }
        if destination.len() > MAX_DESTINATION_LENGTH {
            return Err(format!("destination exceeds {} bytes", MAX_DESTINATION_LENGTH));
        }
        if !destination.chars().all(|c| c.is_ascii_digit() || c == '+') {
            return Err("destination must be a phone number".into());
        }

        Ok(Self { name, destination })
    }
}

/// One tracked attempt to deliver a message to one contact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub destination: String,
    /// The submission's template, captured per job so later submissions
    /// cannot change what an in-flight job will send.
    pub message: String,
    pub status: DeliveryStatus,
    pub created_at: UnixTimeMs,
    /// Resolution time for terminal jobs, creation time otherwise.
    pub updated_at: UnixTimeMs,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Substitute the contact's name into the shared template. Performed per
/// recipient at send time; the template itself is never mutated.
pub fn render_template(template: &str, name: &str) -> String {
    template.replace(NAME_PLACEHOLDER, name)
}

// ============================================================================
// Aggregate stats, derived on demand
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub sent: usize,
    pub pending: usize,
    pub error: usize,
    pub total: usize,
}

// ============================================================================
// Campaign store
// ============================================================================

/// Ordered collection of send jobs. Membership changes only through batch
/// insert and clear-all; status fields change only through `resolve`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CampaignStore {
    jobs: Vec<Job>,
    next_id: u64,
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignStore {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    /// Rebuild a store from persisted rows. The id counter resumes past the
    /// highest id seen so ids stay unique across restarts.
    pub fn from_jobs(jobs: Vec<Job>) -> Self {
        let next_id = jobs.iter().map(|j| j.id.0).max().unwrap_or(0) + 1;
        Self { jobs, next_id }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Validate a submission without creating anything. Used so that batch
    /// expansion is all-or-nothing: no job exists until every recipient has
    /// passed.
    pub fn validate_submission(
        message: &str,
        recipients: &[Recipient],
    ) -> Result<(), CampaignError> {
        if message.trim().is_empty() {
            return Err(CampaignError::EmptyMessage);
        }
        if recipients.is_empty() {
            return Err(CampaignError::NoRecipients);
        }
        if recipients.len() > MAX_BATCH_SIZE {
            return Err(CampaignError::BatchTooLarge {
                count: recipients.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        Ok(())
    }

    /// Expand one submission into N pending jobs, appended in input order.
    /// Either every recipient becomes a job or none does.
    pub fn insert_batch(
        &mut self,
        message: &str,
        recipients: &[Recipient],
        now: UnixTimeMs,
    ) -> Result<Vec<JobId>, CampaignError> {
        Self::validate_submission(message, recipients)?;

        if self.jobs.len() + recipients.len() > MAX_JOBS {
            return Err(CampaignError::Full(MAX_JOBS));
        }

        let mut ids = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let id = JobId(self.next_id);
            self.next_id += 1;
            self.jobs.push(Job {
                id,
                name: recipient.name.clone(),
                destination: recipient.destination.clone(),
                message: message.to_string(),
                status: DeliveryStatus::Pending,
                created_at: now,
                updated_at: now,
            });
            ids.push(id);
        }

        Ok(ids)
    }

    /// Single-shot transition Pending -> terminal. A job already resolved is
    /// never revisited; a missing job (cleared before its resolution fired)
    /// is reported as `NotFound` for the caller to swallow.
    pub fn resolve(
        &mut self,
        id: JobId,
        outcome: DeliveryOutcome,
        now: UnixTimeMs,
    ) -> Result<&Job, CampaignError> {
        let job = self
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(CampaignError::NotFound(id))?;

        if job.status.is_terminal() {
            return Err(CampaignError::AlreadyResolved {
                id,
                status: job.status,
            });
        }

        job.status = outcome.status();
        job.updated_at = now;
        Ok(job)
    }

    /// Empty the store. Idempotent; ids are not reused afterwards.
    pub fn clear_all(&mut self) {
        self.jobs.clear();
    }

    /// Undo a batch insert whose persistence failed. Only ever called with
    /// ids that were just inserted and cannot have been resolved yet.
    pub(crate) fn remove_batch(&mut self, ids: &[JobId]) {
        self.jobs.retain(|j| !ids.contains(&j.id));
    }

    /// Counts by status over the live store, recomputed on every call.
    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total: self.jobs.len(),
            ..Default::default()
        };
        for job in &self.jobs {
            match job.status {
                DeliveryStatus::Sent => stats.sent += 1,
                DeliveryStatus::Pending => stats.pending += 1,
                DeliveryStatus::Error => stats.error += 1,
            }
        }
        stats
    }

    /// Detail list for the dashboard: creation order reversed. Ids are
    /// assigned in creation order, so id descending is exactly that, and it
    /// holds even when the wall clock steps backwards between batches.
    pub fn jobs_newest_first(&self) -> Vec<Job> {
        let mut jobs = self.jobs.clone();
        jobs.sort_by(|a, b| b.id.cmp(&a.id));
        jobs
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }
}
