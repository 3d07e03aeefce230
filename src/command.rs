//! Typed command surface
//!
//! The request/response pairs the host (UI, capture layer, CLI) drives the
//! archive with. Every command yields a success flag and, on failure, an
//! error message; nothing errors or panics across this boundary.

use serde::{Deserialize, Serialize};

use crate::backup::BackupInfo;
use crate::lifecycle::LifecycleState;
use crate::migrate::MigrationStatus;
use crate::record::{CapturedQuery, QueryRecord};
use crate::QueryArchive;

/// Default page size for recent-query listings
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Default result cap for searches
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// A request from the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SaveQuery { data: CapturedQuery },
    GetCount,
    GetRecent { limit: Option<usize>, offset: Option<usize> },
    Search { term: String, limit: Option<usize> },
    Delete { id: i64 },
    UpdateDescription { id: i64, description: String },
    GetStatus,
    ExportDatabase,
    ListBackups,
    ExportBackup { key: String },
    ImportDatabase { data: Vec<u8> },
    VerifyCredentials,
}

/// Read-only view of the lifecycle surfaced to the host
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: LifecycleState,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub migration_status: MigrationStatus,
}

/// Command-specific payload of a successful response
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Count(i64),
    Queries(Vec<QueryRecord>),
    Status(StatusReport),
    Data(Vec<u8>),
    Backups(Vec<BackupInfo>),
}

/// Uniform reply shape for every command
#[derive(Debug, Serialize)]
pub struct Response {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Response {
    fn ok() -> Self {
        Self { success: true, error: None, payload: None }
    }

    fn flag(success: bool) -> Self {
        Self { success, error: None, payload: None }
    }

    fn with(payload: Payload) -> Self {
        Self { success: true, error: None, payload: Some(payload) }
    }

    fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            payload: None,
        }
    }
}

/// Execute one command against the archive.
///
/// Internal errors are converted into failure responses here; callers never
/// see an `Err`.
pub async fn dispatch(archive: &mut QueryArchive, command: Command) -> Response {
    match command {
        Command::SaveQuery { data } => match archive.save(&data).await {
            Ok(stored) => Response::flag(stored),
            Err(e) => Response::failure(e),
        },

        Command::GetCount => match archive.count() {
            Ok(count) => Response::with(Payload::Count(count)),
            Err(e) => Response::failure(e),
        },

        Command::GetRecent { limit, offset } => {
            let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
            let offset = offset.unwrap_or(0);
            match archive.recent(limit, offset) {
                Ok(queries) => Response::with(Payload::Queries(queries)),
                Err(e) => Response::failure(e),
            }
        }

        Command::Search { term, limit } => {
            let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
            match archive.search(&term, limit) {
                Ok(queries) => Response::with(Payload::Queries(queries)),
                Err(e) => Response::failure(e),
            }
        }

        Command::Delete { id } => match archive.delete(id).await {
            Ok(deleted) => Response::flag(deleted),
            Err(e) => Response::failure(e),
        },

        Command::UpdateDescription { id, description } => {
            match archive.update_description(id, &description).await {
                Ok(updated) => Response::flag(updated),
                Err(e) => Response::failure(e),
            }
        }

        Command::GetStatus => Response::with(Payload::Status(status_report(archive))),

        Command::ExportDatabase => match archive.export() {
            Ok(data) => Response::with(Payload::Data(data)),
            Err(e) => Response::failure(e),
        },

        Command::ListBackups => match archive.backups().list().await {
            Ok(backups) => Response::with(Payload::Backups(backups)),
            Err(e) => Response::failure(e),
        },

        Command::ExportBackup { key } => match archive.backups().export(&key).await {
            Ok(data) => Response::with(Payload::Data(data)),
            Err(e) => Response::failure(e),
        },

        Command::ImportDatabase { data } => match archive.import(&data).await {
            Ok(()) => Response::ok(),
            Err(e) => Response::failure(e),
        },

        Command::VerifyCredentials => match archive.summarizer().verify_credentials().await {
            Ok(()) => Response::ok(),
            Err(e) => Response::failure(e),
        },
    }
}

/// Snapshot the lifecycle into a host-facing status report
pub fn status_report(archive: &QueryArchive) -> StatusReport {
    StatusReport {
        state: archive.state(),
        available: archive.state() == LifecycleState::Ready,
        error: archive.init_error().map(str::to_string),
        migration_status: archive.migration_status().clone(),
    }
}
