// Optional external fallback capabilities.
//
// The pipeline depends on these traits, never on a provider. Both calls
// are best-effort: every error (timeout, schema violation, transport
// failure) is treated as "no result" and the rule-based outcome stands.
//
// Cost is bounded twice: a process-wide semaphore caps concurrent
// in-flight calls across all extractor instances, and a per-extractor
// mutex serializes calls from one instance so retries do not contend.

#[cfg(feature = "llm")]
pub mod openai;

use std::future::Future;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore};

use crate::table::header::{HeaderRoles, Role, RoleInfo, RoleSource};

/// A role assignment as returned by an external fallback.
#[derive(Debug, Clone)]
pub struct FallbackRole {
    pub role: String,
    pub col_index: usize,
    pub confidence: f64,
}

/// Capability: infer column roles from sample body rows.
///
/// Returning an empty list means "no answer".
#[async_trait]
pub trait HeaderRoleFallback: Send + Sync {
    async fn infer_header_roles(&self, sample_rows: &[Vec<String>]) -> Result<Vec<FallbackRole>>;
}

/// Capability: extract the patient name from the header-region text.
///
/// Returning an empty string means "no answer".
#[async_trait]
pub trait PatientNameFallback: Send + Sync {
    async fn extract_patient_name(
        &self,
        header_region_text: &str,
        known_client_name: Option<&str>,
    ) -> Result<String>;
}

/// No-op default: the core works without any network at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFallback;

#[async_trait]
impl HeaderRoleFallback for NoopFallback {
    async fn infer_header_roles(&self, _sample_rows: &[Vec<String>]) -> Result<Vec<FallbackRole>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl PatientNameFallback for NoopFallback {
    async fn extract_patient_name(
        &self,
        _header_region_text: &str,
        _known_client_name: Option<&str>,
    ) -> Result<String> {
        Ok(String::new())
    }
}

static GLOBAL_SEMAPHORE: OnceLock<Arc<Semaphore>> = OnceLock::new();

/// The process-wide fallback semaphore, sized by the first caller.
fn global_semaphore(max_concurrency: usize) -> Arc<Semaphore> {
    GLOBAL_SEMAPHORE
        .get_or_init(|| Arc::new(Semaphore::new(max_concurrency.max(1))))
        .clone()
}

/// Per-extractor serialization plus the shared global bound.
#[derive(Debug, Default)]
pub struct FallbackGuard {
    instance_lock: Mutex<()>,
}

impl FallbackGuard {
    /// Run one fallback call under both the global semaphore and this
    /// instance's lock. Dropping the returned future aborts the call and
    /// releases both immediately.
    pub async fn run<F, T>(&self, max_concurrency: usize, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let semaphore = global_semaphore(max_concurrency);
        let _permit = semaphore
            .acquire()
            .await
            .expect("fallback semaphore is never closed");
        let _serial = self.instance_lock.lock().await;
        fut.await
    }
}

/// Convert fallback output into validated header roles.
///
/// Rejected wholesale when any role name is outside the allowed set; the
/// survivor then passes through the usual sanitization (unique columns,
/// reference xor min/max).
pub fn roles_from_fallback(raw: Vec<FallbackRole>) -> Option<HeaderRoles> {
    if raw.is_empty() {
        return None;
    }
    let mut entries: Vec<RoleInfo> = Vec::with_capacity(raw.len());
    for item in raw {
        let role = Role::from_str(&item.role)?;
        entries.push(RoleInfo {
            role,
            col_index: item.col_index,
            confidence: item.confidence.clamp(0.0, 1.0),
            source: RoleSource::Llm,
            meets_threshold: true,
            forced: false,
            label: Some("llm".to_string()),
        });
    }
    let roles = HeaderRoles::sanitize(entries);
    if roles.is_empty() {
        None
    } else {
        Some(roles)
    }
}
