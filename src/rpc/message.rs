//! Request and reply bodies of the config handler.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::{LintError, PipelineError};
use crate::topology::service::ServiceError;

pub const SERVICE_BY_ID: &str = "service";
pub const SERVICE_BY_URL: &str = "service-by-url";
pub const SERVICE_EXIST: &str = "service-exist";
pub const SET_SERVICE: &str = "set-service";
pub const GENERATE_SERVICE: &str = "generate-service";
pub const GENERATE_HANDLER: &str = "generate-handler";
pub const PARAM_EXIST: &str = "param-exist";
pub const STRING_PARAM: &str = "string-param";
pub const UINT64_PARAM: &str = "uint64-param";
pub const BOOL_PARAM: &str = "bool-param";
pub const SET_DEFAULT_PARAM: &str = "set-default";
pub const SET_PROXY_CHAIN: &str = "set-proxy-chain";
pub const PROXY_CHAINS_BY_URL: &str = "proxy-chains-by-url";
pub const LINT_SERVICE: &str = "lint-service";
pub const CLOSE: &str = "close";

pub type Parameters = Map<String, Value>;

/// Errors turned into failed replies.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("missing '{0}' parameter")]
    MissingParameter(&'static str),

    #[error("invalid '{name}' parameter: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Lint(#[from] LintError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("config task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Incoming request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub parameters: Parameters,
}

impl Request {
    pub fn new(parameters: Parameters) -> Self {
        Self { parameters }
    }

    pub fn string(&self, name: &'static str) -> Result<String, RpcError> {
        match self.parameters.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(RpcError::InvalidParameter {
                name,
                reason: "expected a string".to_string(),
            }),
            None => Err(RpcError::MissingParameter(name)),
        }
    }

    pub fn bool(&self, name: &'static str) -> Result<bool, RpcError> {
        match self.parameters.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(RpcError::InvalidParameter {
                name,
                reason: "expected a boolean".to_string(),
            }),
            None => Err(RpcError::MissingParameter(name)),
        }
    }

    pub fn value(&self, name: &'static str) -> Result<Value, RpcError> {
        self.parameters
            .get(name)
            .cloned()
            .ok_or(RpcError::MissingParameter(name))
    }

    /// Deserializes a nested object parameter.
    pub fn nested<T: DeserializeOwned>(&self, name: &'static str) -> Result<T, RpcError> {
        serde_json::from_value(self.value(name)?).map_err(|e| RpcError::InvalidParameter {
            name,
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplyStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "fail")]
    Fail,
}

/// Reply body. A failed reply carries the message and no parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub parameters: Parameters,
}

impl Reply {
    pub fn ok(parameters: Parameters) -> Self {
        Self {
            status: ReplyStatus::Ok,
            message: String::new(),
            parameters,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Fail,
            message: message.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }
}

/// Builds a parameter map from one key and a serializable value.
pub fn single<T: Serialize>(name: &str, value: T) -> Parameters {
    let mut parameters = Parameters::new();
    let value = serde_json::to_value(value).unwrap_or(Value::Null);
    parameters.insert(name.to_string(), value);
    parameters
}
