//! Identity synchronization: mirror external identities into local
//! user records.
//!
//! Local records are keyed by the external id, never by email, so the
//! request-path sync and the batch backfill may race freely: whichever
//! insert lands first wins and the other observes an existing row.

use std::collections::HashSet;

use serde::Serialize;
use storegate_core::error::GateError;
use storegate_core::models::identity::ExternalIdentity;
use storegate_core::models::local_user::{CreateLocalUser, InsertOutcome, LocalUserRecord};
use storegate_core::models::sync_log::{CreateSyncLogEntry, SyncConclusion, SyncLogStats};
use storegate_core::repository::{LocalUserRepository, SyncLogRepository};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::SyncError;
use crate::identity::IdentityProvider;

/// Page size used when enumerating the identity provider.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Existing,
    Created,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub action: SyncAction,
    pub record: LocalUserRecord,
    /// Sync log entry recording this attempt.
    pub log_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub external_id: String,
    pub email: String,
    pub message: String,
}

/// Result of a full backfill.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Identities known to the provider.
    pub total: usize,
    /// Local records created by this run.
    pub synced: usize,
    /// Identities that already had a local record.
    pub existing: usize,
    pub errors: Vec<SyncFailure>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStats {
    pub local_users: u64,
    pub attempts: SyncLogStats,
}

pub struct SyncEngine<L: LocalUserRepository, G: SyncLogRepository> {
    users: L,
    log: G,
    page_size: u32,
}

impl<L: LocalUserRepository, G: SyncLogRepository> SyncEngine<L, G> {
    pub fn new(users: L, log: G) -> Self {
        Self {
            users,
            log,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Ensure a local record exists for `identity`.
    ///
    /// Every attempt appends a sync log entry that is concluded before
    /// this returns; if the conclusion cannot be written the sync fails.
    /// An existing record is never overwritten.
    pub async fn sync_one(&self, identity: &ExternalIdentity) -> Result<SyncOutcome, SyncError> {
        if identity.external_id.trim().is_empty() {
            return Err(SyncError::InvalidIdentity("empty external id".into()));
        }
        let external_id = identity.external_id.clone();

        let entry = self
            .log
            .begin(CreateSyncLogEntry {
                external_id: external_id.clone(),
                email: identity.email.clone(),
            })
            .await
            .map_err(|source| SyncError::Datastore {
                external_id: external_id.clone(),
                source,
            })?;

        match self.reconcile(identity, entry.id).await {
            Ok((action, record)) => {
                let conclusion = SyncConclusion::Completed {
                    local_id: record.id.clone(),
                };
                // An attempt whose log entry stays pending is not a success.
                if let Err(source) = self.log.conclude(entry.id, conclusion).await {
                    warn!(error = %source, sync_id = %entry.id, "Failed to conclude sync log entry");
                    return Err(SyncError::Datastore {
                        external_id,
                        source,
                    });
                }
                debug!(external_id = %external_id, action = ?action, "Identity synchronized");
                Ok(SyncOutcome {
                    action,
                    record,
                    log_id: entry.id,
                })
            }
            Err(source) => {
                let conclusion = SyncConclusion::Failed {
                    error_message: source.to_string(),
                };
                if let Err(e) = self.log.conclude(entry.id, conclusion).await {
                    warn!(error = %e, sync_id = %entry.id, "Failed to conclude sync log entry");
                }
                warn!(external_id = %external_id, error = %source, "Identity sync failed");
                Err(SyncError::Datastore {
                    external_id,
                    source,
                })
            }
        }
    }

    async fn reconcile(
        &self,
        identity: &ExternalIdentity,
        sync_id: Uuid,
    ) -> Result<(SyncAction, LocalUserRecord), GateError> {
        match self.users.get_by_id(&identity.external_id).await {
            Ok(record) => return Ok((SyncAction::Existing, record)),
            Err(GateError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let full_name = identity
            .full_name()
            .map(str::to_string)
            .unwrap_or_else(|| email_local_part(&identity.email).to_string());

        let inserted = self
            .users
            .insert_if_absent(CreateLocalUser {
                id: identity.external_id.clone(),
                email: identity.email.clone(),
                full_name,
                email_verified: identity.email_verified,
                origin_sync_id: sync_id.to_string(),
            })
            .await;

        let outcome = match inserted {
            Ok(outcome) => outcome,
            // A racing first sync that commits first makes this write
            // conflict; its row is the one to observe.
            Err(GateError::Transient(reason)) => {
                match self.users.get_by_id(&identity.external_id).await {
                    Ok(record) => {
                        debug!(local_id = %record.id, "Insert lost a race; using existing record");
                        InsertOutcome::AlreadyPresent(record)
                    }
                    Err(_) => return Err(GateError::Transient(reason)),
                }
            }
            Err(e) => return Err(e),
        };

        Ok(match outcome {
            InsertOutcome::Inserted(record) => {
                info!(local_id = %record.id, "Local user created");
                (SyncAction::Created, record)
            }
            InsertOutcome::AlreadyPresent(record) => (SyncAction::Existing, record),
        })
    }

    /// Backfill every identity the provider knows about.
    ///
    /// Only a failure to enumerate identities aborts the run; individual
    /// sync failures are collected in [`SyncReport::errors`].
    pub async fn sync_all<I: IdentityProvider>(
        &self,
        provider: &I,
    ) -> Result<SyncReport, SyncError> {
        let mut identities = Vec::new();
        let mut page = 1;
        loop {
            let batch = provider.list_identities(page, self.page_size).await?;
            let len = batch.len();
            identities.extend(batch);
            if len < self.page_size as usize {
                break;
            }
            page += 1;
        }

        let known: HashSet<String> = self
            .users
            .list_ids()
            .await
            .map_err(|source| SyncError::Datastore {
                external_id: "*".into(),
                source,
            })?
            .into_iter()
            .collect();

        let mut report = SyncReport {
            total: identities.len(),
            ..Default::default()
        };

        for identity in &identities {
            if known.contains(&identity.external_id) {
                report.existing += 1;
                continue;
            }
            match self.sync_one(identity).await {
                Ok(outcome) => match outcome.action {
                    SyncAction::Created => report.synced += 1,
                    SyncAction::Existing => report.existing += 1,
                },
                Err(e) => report.errors.push(SyncFailure {
                    external_id: identity.external_id.clone(),
                    email: identity.email.clone(),
                    message: e.to_string(),
                }),
            }
        }

        info!(
            total = report.total,
            synced = report.synced,
            existing = report.existing,
            errors = report.errors.len(),
            "Identity backfill finished"
        );
        Ok(report)
    }

    pub async fn stats(&self) -> Result<SyncStats, GateError> {
        Ok(SyncStats {
            local_users: self.users.count().await?,
            attempts: self.log.stats().await?,
        })
    }
}

/// The part of an email before `@`, or the whole string when there is
/// none.
fn email_local_part(email: &str) -> &str {
    match email.split_once('@') {
        Some((local, _)) if !local.is_empty() => local,
        _ => email,
    }
}

#[cfg(test)]
mod tests {
    use super::email_local_part;

    #[test]
    fn local_part_fallback() {
        assert_eq!(email_local_part("ana.lima@shop.example"), "ana.lima");
        assert_eq!(email_local_part("no-at-sign"), "no-at-sign");
        assert_eq!(email_local_part("@shop.example"), "@shop.example");
    }
}
