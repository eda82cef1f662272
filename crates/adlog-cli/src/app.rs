//! Command dispatch against file-backed storage
//!
//! The cache is process-local, so every invocation starts cold. Listing
//! re-projects the latest ledger records first; single reads fall back to
//! the ledger and content store on their own.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{info, Instrument};

use adlog_coordinator::EventCoordinator;
use adlog_core::{AccountId, ContentAddress, EventSubmission, RecordId};
use adlog_logging::{spans, CorrelationContext};
use adlog_storage::{
    FileContentStore, FileContentStoreConfig, FileLedger, FileLedgerConfig, MemoryCache,
};

use crate::config::{AppConfig, Command};

pub struct App {
    config: AppConfig,
    coordinator: EventCoordinator,
}

impl App {
    /// Open the stores under the configured data directory
    pub async fn open(config: AppConfig) -> anyhow::Result<Self> {
        let content = FileContentStore::open(FileContentStoreConfig::with_base_dir(
            config.content_dir(),
        ))
        .await
        .context("opening content store")?;
        let ledger = FileLedger::open(FileLedgerConfig::with_base_dir(config.ledger_dir()))
            .await
            .context("opening ledger")?;

        let coordinator = EventCoordinator::new(
            config.coordinator.clone(),
            Arc::new(content),
            Arc::new(ledger),
            Arc::new(MemoryCache::new()),
        )?;

        info!(data_dir = %config.data_dir.display(), "Opened adlog data directory");
        Ok(Self {
            config,
            coordinator,
        })
    }

    pub fn coordinator(&self) -> &EventCoordinator {
        &self.coordinator
    }

    /// Run one command and return its JSON output
    pub async fn run(&self, command: Command) -> anyhow::Result<Value> {
        match command {
            Command::Create {
                event_type,
                ip,
                device,
                location,
                timestamp,
                account,
            } => {
                let submission = EventSubmission {
                    ip_address: ip,
                    device_info: device,
                    location,
                    timestamp: timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp()),
                };
                let ctx = CorrelationContext::new_request().with_operation(spans::CREATE_EVENT);
                let receipt = self
                    .coordinator
                    .create_event(event_type, submission, AccountId::new(account))
                    .instrument(ctx.span())
                    .await?;
                Ok(serde_json::to_value(receipt)?)
            }
            Command::Get { record_id } => {
                let ctx = CorrelationContext::new_request()
                    .with_operation(spans::GET_EVENT)
                    .with_record_id(record_id.clone());
                let event = self
                    .coordinator
                    .get_event(&RecordId::new(record_id))
                    .instrument(ctx.span())
                    .await?;
                Ok(serde_json::to_value(event)?)
            }
            Command::List { skip, limit } => {
                let limit = limit.unwrap_or(self.config.coordinator.default_list_limit);
                let ctx =
                    CorrelationContext::new_request().with_operation(spans::LIST_RECENT_EVENTS);
                let warm = ctx.child().with_operation(spans::REBUILD_INDEX);
                let events = async {
                    self.coordinator
                        .rebuild_recent_index(self.config.index_window)
                        .instrument(warm.span())
                        .await?;
                    self.coordinator.list_recent_events(skip, limit).await
                }
                .instrument(ctx.span())
                .await?;
                Ok(serde_json::to_value(events)?)
            }
            Command::Resume { record_id, address } => {
                let ctx = CorrelationContext::new_request()
                    .with_operation(spans::RESUME_EVENT)
                    .with_record_id(record_id.clone());
                let receipt = self
                    .coordinator
                    .resume_event(&RecordId::new(record_id), &ContentAddress::new(address))
                    .instrument(ctx.span())
                    .await?;
                Ok(serde_json::to_value(receipt)?)
            }
            Command::RebuildIndex { max } => {
                let ctx = CorrelationContext::new_request().with_operation(spans::REBUILD_INDEX);
                let report = self
                    .coordinator
                    .rebuild_recent_index(max.unwrap_or(self.config.index_window))
                    .instrument(ctx.span())
                    .await?;
                Ok(json!({
                    "report": report,
                    "stats": self.coordinator.stats(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adlog_core::EventType;
    use tempfile::TempDir;

    fn config(temp: &TempDir) -> AppConfig {
        AppConfig {
            data_dir: temp.path().to_path_buf(),
            ..AppConfig::default()
        }
    }

    fn create(timestamp: i64, account: &str) -> Command {
        Command::Create {
            event_type: EventType::Impression,
            ip: "10.0.0.1".into(),
            device: "android".into(),
            location: "DE".into(),
            timestamp: Some(timestamp),
            account: account.into(),
        }
    }

    #[tokio::test]
    async fn test_create_then_get_across_invocations() {
        let temp = TempDir::new().unwrap();

        let receipt = {
            let app = App::open(config(&temp)).await.unwrap();
            app.run(create(1_700_000_000, "acct-9")).await.unwrap()
        };
        assert_eq!(receipt["status"], "FINALIZED");
        let record_id = receipt["recordId"].as_str().unwrap().to_string();

        let app = App::open(config(&temp)).await.unwrap();
        let event = app.run(Command::Get { record_id: record_id.clone() }).await.unwrap();
        assert_eq!(event["recordId"], record_id.as_str());
        assert_eq!(event["account_id"], "acct-9");
        assert_eq!(event["eventType"], "IMPRESSION");
        assert_eq!(event["timestamp"], 1_700_000_000);
    }

    #[tokio::test]
    async fn test_list_warms_a_cold_cache() {
        let temp = TempDir::new().unwrap();
        {
            let app = App::open(config(&temp)).await.unwrap();
            for ts in [100, 300, 200] {
                app.run(create(ts, "acct-1")).await.unwrap();
            }
        }

        let app = App::open(config(&temp)).await.unwrap();
        let page = app
            .run(Command::List { skip: 0, limit: Some(2) })
            .await
            .unwrap();
        let timestamps: Vec<i64> = page
            .as_array()
            .unwrap()
            .iter()
            .map(|event| event["timestamp"].as_i64().unwrap())
            .collect();
        assert_eq!(timestamps, vec![300, 200]);
    }

    #[tokio::test]
    async fn test_get_unknown_record_fails() {
        let temp = TempDir::new().unwrap();
        let app = App::open(config(&temp)).await.unwrap();

        let result = app
            .run(Command::Get {
                record_id: "00000000000000ff-0000000000000000".into(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_resume_of_final_record_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let app = App::open(config(&temp)).await.unwrap();
        let receipt = app.run(create(42, "acct-2")).await.unwrap();

        let resumed = app
            .run(Command::Resume {
                record_id: receipt["recordId"].as_str().unwrap().into(),
                address: receipt["address"].as_str().unwrap().into(),
            })
            .await
            .unwrap();
        assert_eq!(resumed, receipt);
    }

    #[tokio::test]
    async fn test_rebuild_reports_scanned_records() {
        let temp = TempDir::new().unwrap();
        let app = App::open(config(&temp)).await.unwrap();
        for ts in 0..3 {
            app.run(create(ts, "acct-3")).await.unwrap();
        }

        let output = app.run(Command::RebuildIndex { max: Some(2) }).await.unwrap();
        assert_eq!(output["report"]["scanned"], 3);
        assert_eq!(output["report"]["indexed"], 2);
        assert_eq!(output["stats"]["events_created"], 3);
    }
}
