//! Commands exposed to the front end
//!
//! Requests arrive loosely typed: an operation name, an argument array and a
//! callback id. They are parsed into [`ParsedCommand`] before anything
//! touches the store, and every request is answered with exactly one
//! [`CommandResponse`] on the callback id it carried.

mod bridge;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::KeychainError;

pub use bridge::{serve, CommandBridge, PendingCall};

/// Operations the bridge understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SavePassword,
    RenameAccount,
    GetPassword,
    UpdateKeychainConfiguration,
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::SavePassword,
        Operation::RenameAccount,
        Operation::GetPassword,
        Operation::UpdateKeychainConfiguration,
        Operation::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SavePassword => "savePassword",
            Operation::RenameAccount => "renameAccount",
            Operation::GetPassword => "getPassword",
            Operation::UpdateKeychainConfiguration => "updateKeychainConfiguration",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = KeychainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| KeychainError::invalid_input(format!("unknown operation '{}'", s)))
    }
}

/// One bridge invocation as sent by the front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(rename = "operationName", alias = "operation")]
    pub operation: String,
    #[serde(default)]
    pub arguments: Value,
    pub callback_id: String,
}

impl CommandRequest {
    /// Build a request in the wire shape: `arguments` is `[[arg, ...]]`
    pub fn new(operation: impl Into<String>, args: Vec<String>, callback_id: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            arguments: Value::Array(vec![Value::Array(
                args.into_iter().map(Value::String).collect(),
            )]),
            callback_id: callback_id.into(),
        }
    }

    /// Decode one host line; every line becomes a request so every line gets an answer.
    ///
    /// Lines that do not parse keep whatever operation and callback id they
    /// carry, with no arguments, so they fail validation inside the bridge.
    pub fn from_line(line: &str) -> Self {
        match serde_json::from_str::<CommandRequest>(line) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Malformed request line");
                Self::unparsed(line)
            }
        }
    }

    /// Like [`CommandRequest::from_line`] for raw bytes that may not be UTF-8
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(line) => Self::from_line(line),
            Err(e) => {
                tracing::warn!(error = %e, "Request line is not valid UTF-8");
                Self::unparsed(&String::from_utf8_lossy(bytes))
            }
        }
    }

    fn unparsed(line: &str) -> Self {
        let value: Value = serde_json::from_str(line).unwrap_or(Value::Null);
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            operation: field("operationName"),
            arguments: Value::Null,
            callback_id: field("callbackId"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// The single answer to a [`CommandRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub callback_id: String,
    pub status: ResponseStatus,
    pub payload: Map<String, Value>,
    /// The host may reuse the callback channel after this message
    pub keep_callback: bool,
}

impl CommandResponse {
    pub fn success(callback_id: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            callback_id: callback_id.into(),
            status: ResponseStatus::Success,
            payload,
            keep_callback: true,
        }
    }

    pub fn failure(callback_id: impl Into<String>, error: &KeychainError) -> Self {
        let mut payload = Map::new();
        payload.insert("error".to_string(), Value::String(error.to_string()));
        Self {
            callback_id: callback_id.into(),
            status: ResponseStatus::Failure,
            payload,
            keep_callback: true,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    pub fn password(&self) -> Option<&str> {
        self.payload.get("password").and_then(Value::as_str)
    }

    pub fn error(&self) -> Option<&str> {
        self.payload.get("error").and_then(Value::as_str)
    }
}

/// A validated request, ready for the store
#[derive(Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    SavePassword { account: String, password: String },
    RenameAccount { old_account: String, new_account: String },
    GetPassword { account: String },
    UpdateKeychainConfiguration { service: String, access_group: Option<String> },
    Delete { account: String },
}

// Manual impl keeps secrets out of logs
impl fmt::Debug for ParsedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedCommand::SavePassword { account, .. } => f
                .debug_struct("SavePassword")
                .field("account", account)
                .finish_non_exhaustive(),
            ParsedCommand::RenameAccount { old_account, new_account } => f
                .debug_struct("RenameAccount")
                .field("old_account", old_account)
                .field("new_account", new_account)
                .finish(),
            ParsedCommand::GetPassword { account } => {
                f.debug_struct("GetPassword").field("account", account).finish()
            }
            ParsedCommand::UpdateKeychainConfiguration { service, access_group } => f
                .debug_struct("UpdateKeychainConfiguration")
                .field("service", service)
                .field("access_group", access_group)
                .finish(),
            ParsedCommand::Delete { account } => {
                f.debug_struct("Delete").field("account", account).finish()
            }
        }
    }
}

impl ParsedCommand {
    pub fn operation(&self) -> Operation {
        match self {
            ParsedCommand::SavePassword { .. } => Operation::SavePassword,
            ParsedCommand::RenameAccount { .. } => Operation::RenameAccount,
            ParsedCommand::GetPassword { .. } => Operation::GetPassword,
            ParsedCommand::UpdateKeychainConfiguration { .. } => Operation::UpdateKeychainConfiguration,
            ParsedCommand::Delete { .. } => Operation::Delete,
        }
    }

    /// Check arity and shape of a raw request
    pub fn parse(request: &CommandRequest) -> Result<Self, KeychainError> {
        let operation: Operation = request.operation.parse()?;
        let args = positional_args(operation, &request.arguments)?;

        let command = match operation {
            Operation::SavePassword => {
                let [account, password] = exact::<2>(operation, args, "[account, password]")?;
                ParsedCommand::SavePassword { account, password }
            }
            Operation::RenameAccount => {
                let [old_account, new_account] = exact::<2>(operation, args, "[oldAccount, newAccount]")?;
                ParsedCommand::RenameAccount { old_account, new_account }
            }
            Operation::GetPassword => {
                let [account] = exact::<1>(operation, args, "[account]")?;
                ParsedCommand::GetPassword { account }
            }
            Operation::Delete => {
                let [account] = exact::<1>(operation, args, "[account]")?;
                ParsedCommand::Delete { account }
            }
            Operation::UpdateKeychainConfiguration => {
                let mut args = args.into_iter();
                match (args.next(), args.next(), args.next()) {
                    (Some(service), access_group, None) => {
                        ParsedCommand::UpdateKeychainConfiguration { service, access_group }
                    }
                    _ => {
                        return Err(KeychainError::invalid_input(format!(
                            "{} expects [service] or [service, accessGroup]",
                            operation
                        )))
                    }
                }
            }
        };
        Ok(command)
    }
}

/// The positional list is the first element of `arguments`
fn positional_args(operation: Operation, arguments: &Value) -> Result<Vec<String>, KeychainError> {
    let shape_error = || {
        KeychainError::invalid_input(format!(
            "{} expects its arguments as a list of strings",
            operation
        ))
    };

    let list = arguments
        .as_array()
        .and_then(|outer| outer.first())
        .and_then(Value::as_array)
        .ok_or_else(shape_error)?;

    list.iter()
        .map(|value| value.as_str().map(str::to_string).ok_or_else(shape_error))
        .collect()
}

fn exact<const N: usize>(
    operation: Operation,
    args: Vec<String>,
    expected: &str,
) -> Result<[String; N], KeychainError> {
    let got = args.len();
    args.try_into().map_err(|_| {
        KeychainError::invalid_input(format!(
            "{} expects {} argument(s) {}, got {}",
            operation, N, expected, got
        ))
    })
}
