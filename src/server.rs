//! The request/response/event surface exposed to client applications.
//!
//! Transport is out of scope; an embedder feeds [`Request`]s into the
//! engine's queue and forwards [`ClientEvent`]s to its subscribers. All
//! requests address windows by [`WindowId`]; unknown ids come back as a
//! structured error rather than a broken channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::model::ModelError;
use crate::model::save_restore::TabGroupBlob;
use crate::sys::runtime::{RuntimeError, WindowId};

#[non_exhaustive]
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    Undock { id: WindowId },
    ExplodeGroup { id: WindowId },
    GetTabs { id: WindowId },
    CreateTabGroup { ids: Vec<WindowId> },
    AddTab { group_id: u64, id: WindowId },
    RemoveTab { id: WindowId },
    SwitchTab { group_id: u64, id: WindowId },
    SetActiveTab { id: WindowId },
    GetSaveInfo,
    Restore { blob: Vec<TabGroupBlob> },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidScope,
    Disabled,
    RuntimeFailure,
    InvalidState,
    Timeout,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown window {0}")]
    NotFound(WindowId),
    #[error("unknown group {0}")]
    GroupNotFound(u64),
    #[error(transparent)]
    InvalidScope(#[from] ConfigError),
    #[error("window {0} is disabled by configuration")]
    Disabled(WindowId),
    #[error("runtime failure: {0}")]
    Runtime(RuntimeError),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("runtime command timed out")]
    Timeout,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) | EngineError::GroupNotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidScope(_) => ErrorKind::InvalidScope,
            EngineError::Disabled(_) => ErrorKind::Disabled,
            EngineError::Runtime(_) => ErrorKind::RuntimeFailure,
            EngineError::InvalidState(_) => ErrorKind::InvalidState,
            EngineError::Timeout => ErrorKind::Timeout,
        }
    }
}

impl From<RuntimeError> for EngineError {
    fn from(error: RuntimeError) -> Self {
        match error {
            RuntimeError::Timeout(_) => EngineError::Timeout,
            other => EngineError::Runtime(other),
        }
    }
}

impl From<ModelError> for EngineError {
    fn from(error: ModelError) -> Self {
        match error {
            ModelError::UnknownWindow(id) => EngineError::NotFound(id),
            ModelError::UnknownSnapGroup | ModelError::UnknownTabGroup => {
                EngineError::InvalidState("group no longer exists".into())
            }
            other => EngineError::InvalidState(other.to_string()),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Response {
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl Response {
    pub fn ok() -> Response { Response::Ok { data: None } }

    pub fn with_data(data: serde_json::Value) -> Response { Response::Ok { data: Some(data) } }

    pub fn is_ok(&self) -> bool { matches!(self, Response::Ok { .. }) }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Response::Error { kind, .. } => Some(*kind),
            Response::Ok { .. } => None,
        }
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        match self {
            Response::Ok { data } => data.as_ref(),
            Response::Error { .. } => None,
        }
    }
}

impl From<Result<Option<serde_json::Value>, EngineError>> for Response {
    fn from(result: Result<Option<serde_json::Value>, EngineError>) -> Response {
        match result {
            Ok(data) => Response::Ok { data },
            Err(error) => Response::Error { kind: error.kind(), message: error.to_string() },
        }
    }
}

/// Events pushed to subscribed clients, keyed by the affected window.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type", content = "window")]
pub enum ClientEvent {
    #[serde(rename = "join-snap-group")]
    JoinSnapGroup(WindowId),
    #[serde(rename = "leave-snap-group")]
    LeaveSnapGroup(WindowId),
    #[serde(rename = "join-tab-group")]
    JoinTabGroup(WindowId),
    #[serde(rename = "leave-tab-group")]
    LeaveTabGroup(WindowId),
    #[serde(rename = "tab-activated")]
    TabActivated(WindowId),
}

impl ClientEvent {
    pub fn window(&self) -> &WindowId {
        match self {
            ClientEvent::JoinSnapGroup(id)
            | ClientEvent::LeaveSnapGroup(id)
            | ClientEvent::JoinTabGroup(id)
            | ClientEvent::LeaveTabGroup(id)
            | ClientEvent::TabActivated(id) => id,
        }
    }
}

pub type ClientSender = tokio::sync::mpsc::UnboundedSender<ClientEvent>;
pub type ClientReceiver = tokio::sync::mpsc::UnboundedReceiver<ClientEvent>;

pub fn client_channel() -> (ClientSender, ClientReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}
