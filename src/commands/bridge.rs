//! Request execution and response delivery

use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};

use super::{CommandRequest, CommandResponse, ParsedCommand};
use crate::config::KeychainConfig;
use crate::error::KeychainError;
use crate::store::KeychainStore;
use crate::traits::ResponseSink;

/// Turns raw requests into store calls and answers each exactly once
pub struct CommandBridge {
    store: KeychainStore,
    config: RwLock<Arc<KeychainConfig>>,
}

impl CommandBridge {
    pub fn new(store: KeychainStore, config: KeychainConfig) -> Self {
        Self {
            store,
            config: RwLock::new(Arc::new(config)),
        }
    }

    /// Snapshot of the configuration new requests will run under
    pub fn configuration(&self) -> Arc<KeychainConfig> {
        let guard = self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Replace the configuration; requests already running keep their snapshot
    pub fn update_configuration(&self, config: KeychainConfig) {
        tracing::info!(
            service = %config.service_name,
            access_group = ?config.access_group,
            "Updated keychain configuration"
        );
        let mut guard = self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(config);
    }

    /// Run one request to completion on the calling thread
    pub fn handle(&self, request: CommandRequest) -> CommandResponse {
        tracing::debug!(
            callback_id = %request.callback_id,
            operation = %request.operation,
            "Received command"
        );

        let result = ParsedCommand::parse(&request).and_then(|command| self.execute(command));

        match result {
            Ok(payload) => {
                tracing::debug!(callback_id = %request.callback_id, "Command succeeded");
                CommandResponse::success(request.callback_id, payload)
            }
            Err(e) => {
                tracing::warn!(
                    callback_id = %request.callback_id,
                    operation = %request.operation,
                    kind = e.kind(),
                    error = %e,
                    "Command failed"
                );
                CommandResponse::failure(request.callback_id, &e)
            }
        }
    }

    /// Run a validated command against the store
    pub fn execute(&self, command: ParsedCommand) -> Result<Map<String, Value>, KeychainError> {
        let config = self.configuration();
        let mut payload = Map::new();

        match command {
            ParsedCommand::SavePassword { account, password } => {
                let credential = self.store.save(&config, &account, &password)?;
                payload.insert("password".to_string(), Value::String(credential.secret));
            }
            ParsedCommand::GetPassword { account } => {
                let password = self.store.read(&config, &account)?;
                payload.insert("password".to_string(), Value::String(password));
            }
            ParsedCommand::RenameAccount { old_account, new_account } => {
                self.store.rename_account(&config, &old_account, &new_account)?;
            }
            ParsedCommand::Delete { account } => {
                self.store.delete(&config, &account)?;
            }
            ParsedCommand::UpdateKeychainConfiguration { service, access_group } => {
                if service.is_empty() {
                    return Err(KeychainError::invalid_input("service name must not be empty"));
                }
                let updated = KeychainConfig::new(service, access_group).with_idempotent(config.idempotent);
                self.update_configuration(updated);
            }
        }

        Ok(payload)
    }

    /// Run a request on its own blocking worker.
    ///
    /// A worker that panics still yields a failure response for its callback id.
    pub async fn dispatch(self: Arc<Self>, request: CommandRequest) -> CommandResponse {
        let callback_id = request.callback_id.clone();

        match tokio::task::spawn_blocking(move || self.handle(request)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(callback_id = %callback_id, error = %e, "Command worker did not finish");
                CommandResponse::failure(callback_id, &KeychainError::Unknown(e.to_string()))
            }
        }
    }

    /// Start a request under a fresh callback id and get a handle to its answer
    pub fn invoke(self: &Arc<Self>, operation: &str, args: Vec<String>) -> PendingCall {
        let callback_id = uuid::Uuid::new_v4().to_string();
        let request = CommandRequest::new(operation, args, callback_id.clone());
        let (tx, rx) = oneshot::channel();

        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            let response = bridge.dispatch(request).await;
            // Caller may have stopped waiting
            let _ = tx.send(response);
        });

        PendingCall { callback_id, rx }
    }
}

/// Handle to the one response of an [`CommandBridge::invoke`] call
#[derive(Debug)]
pub struct PendingCall {
    callback_id: String,
    rx: oneshot::Receiver<CommandResponse>,
}

impl PendingCall {
    pub fn callback_id(&self) -> &str {
        &self.callback_id
    }

    pub async fn response(self) -> CommandResponse {
        match self.rx.await {
            Ok(response) => response,
            Err(_) => CommandResponse::failure(
                self.callback_id,
                &KeychainError::Unknown("request was dropped before it completed".to_string()),
            ),
        }
    }
}

/// Serve requests in arrival order until the request channel closes.
///
/// Each request runs on its own blocking worker; responses are delivered from
/// this task. Returns how many requests were answered.
pub async fn serve(
    bridge: Arc<CommandBridge>,
    mut requests: mpsc::Receiver<CommandRequest>,
    sink: Arc<dyn ResponseSink>,
) -> usize {
    let mut served = 0;
    while let Some(request) = requests.recv().await {
        let response = Arc::clone(&bridge).dispatch(request).await;
        sink.deliver(response).await;
        served += 1;
    }
    tracing::info!(served, "Request channel closed");
    served
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::ResponseStatus;
    use crate::error::OsStatus;
    use crate::mocks::{BackendOp, InMemoryBackend, RecordingSink};
    use crate::error::BackendError;
    use crate::traits::{CredentialKey, MockResponseSink, SecureBackend};

    fn setup() -> (Arc<CommandBridge>, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let store = KeychainStore::new(Arc::new(backend.clone()));
        (Arc::new(CommandBridge::new(store, KeychainConfig::default())), backend)
    }

    fn call(bridge: &CommandBridge, operation: &str, args: &[&str]) -> CommandResponse {
        bridge.handle(CommandRequest::new(
            operation,
            args.iter().map(|a| a.to_string()).collect(),
            "cb",
        ))
    }

    #[test]
    fn test_save_and_get_payloads() {
        let (bridge, _) = setup();

        let saved = call(&bridge, "savePassword", &["alice", "pw1"]);
        assert!(saved.is_success());
        assert_eq!(saved.password(), Some("pw1"));
        assert_eq!(saved.payload.len(), 1);

        let read = call(&bridge, "getPassword", &["alice"]);
        assert_eq!(read.password(), Some("pw1"));
    }

    #[test]
    fn test_rename_delete_config_have_empty_payload() {
        let (bridge, _) = setup();
        call(&bridge, "savePassword", &["alice", "pw1"]);

        for (operation, args) in [
            ("renameAccount", vec!["alice", "bob"]),
            ("delete", vec!["bob"]),
            ("updateKeychainConfiguration", vec!["Other"]),
        ] {
            let response = call(&bridge, operation, &args);
            assert!(response.is_success(), "{} failed: {:?}", operation, response.error());
            assert!(response.payload.is_empty());
        }
    }

    #[test]
    fn test_invalid_arity_never_reaches_backend() {
        let (bridge, backend) = setup();

        let one = call(&bridge, "savePassword", &["alice"]);
        let three = call(&bridge, "savePassword", &["alice", "pw", "x"]);

        for response in [one, three] {
            assert_eq!(response.status, ResponseStatus::Failure);
            assert!(response.error().unwrap().starts_with("InvalidInput: "));
        }
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_unknown_operation_is_answered() {
        let (bridge, backend) = setup();

        let response = call(&bridge, "wipeEverything", &[]);

        assert_eq!(response.callback_id, "cb");
        assert_eq!(response.error(), Some("InvalidInput: unknown operation 'wipeEverything'"));
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_backend_status_reaches_payload() {
        let (bridge, backend) = setup();
        backend.fail_next(BackendOp::Query, OsStatus(-34018));

        let response = call(&bridge, "getPassword", &["alice"]);

        let error = response.error().unwrap();
        assert!(error.starts_with("Unhandled: "), "{}", error);
        assert!(error.contains("-34018"));
    }

    #[test]
    fn test_update_configuration_scopes_later_saves() {
        let (bridge, backend) = setup();
        call(&bridge, "savePassword", &["alice", "old-service-pw"]);

        let updated = call(&bridge, "updateKeychainConfiguration", &["New Service", "team.group"]);
        assert!(updated.is_success());
        let config = bridge.configuration();
        assert_eq!(config.service_name, "New Service");
        assert_eq!(config.access_group.as_deref(), Some("team.group"));

        let missing = call(&bridge, "getPassword", &["alice"]);
        assert!(missing.error().unwrap().starts_with("NotFound: "));

        call(&bridge, "savePassword", &["alice", "new-service-pw"]);
        assert_eq!(backend.len(), 2);
        assert!(backend
            .keys()
            .iter()
            .any(|k| k.service == "New Service" && k.access_group.as_deref() == Some("team.group")));
    }

    #[test]
    fn test_update_configuration_keeps_missing_entry_policy() {
        let backend = InMemoryBackend::new();
        let store = KeychainStore::new(Arc::new(backend));
        let bridge = CommandBridge::new(store, KeychainConfig::default().with_idempotent(false));

        call(&bridge, "updateKeychainConfiguration", &["Other"]);

        assert!(!bridge.configuration().idempotent);
        let response = call(&bridge, "delete", &["ghost"]);
        assert!(response.error().unwrap().starts_with("NotFound: "));
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_update() {
        let (bridge, _) = setup();
        let before = bridge.configuration();

        bridge.update_configuration(KeychainConfig::new("Later", None));

        assert_eq!(before.service_name, "KeychainPasswordPlugin");
        assert_eq!(bridge.configuration().service_name, "Later");
    }

    #[test]
    fn test_empty_service_rejected() {
        let (bridge, _) = setup();

        let response = call(&bridge, "updateKeychainConfiguration", &[""]);

        assert!(response.error().unwrap().starts_with("InvalidInput: "));
        assert_eq!(bridge.configuration().service_name, "KeychainPasswordPlugin");
    }

    #[tokio::test]
    async fn test_dispatch_keeps_callback_id() {
        let (bridge, _) = setup();

        let response = bridge
            .dispatch(CommandRequest::new("savePassword", vec!["alice".into(), "pw".into()], "cb-42"))
            .await;

        assert_eq!(response.callback_id, "cb-42");
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_invoke_resolves_once_with_generated_id() {
        let (bridge, _) = setup();

        let pending = bridge.invoke("savePassword", vec!["alice".into(), "pw1".into()]);
        let callback_id = pending.callback_id().to_string();
        let response = pending.response().await;

        assert_eq!(response.callback_id, callback_id);
        assert!(uuid::Uuid::parse_str(&callback_id).is_ok());
        assert_eq!(response.password(), Some("pw1"));
    }

    #[tokio::test]
    async fn test_serve_answers_every_request_in_order() {
        let (bridge, _) = setup();
        let sink = RecordingSink::new();
        let (tx, rx) = mpsc::channel(8);

        tx.send(CommandRequest::new("savePassword", vec!["alice".into(), "pw1".into()], "1")).await.unwrap();
        tx.send(CommandRequest::new("getPassword", vec!["alice".into()], "2")).await.unwrap();
        tx.send(CommandRequest::new("savePassword", vec!["alice".into()], "3")).await.unwrap();
        tx.send(CommandRequest::new("nope", vec![], "4")).await.unwrap();
        drop(tx);

        let served = serve(bridge, rx, Arc::new(sink.clone())).await;

        assert_eq!(served, 4);
        let ids: Vec<String> = sink.responses().into_iter().map(|r| r.callback_id).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(sink.for_callback("2")[0].password(), Some("pw1"));
        assert!(!sink.for_callback("3")[0].is_success());
    }

    #[tokio::test]
    async fn test_serve_delivers_exactly_once_per_request() {
        let (bridge, _) = setup();
        let mut sink = MockResponseSink::new();
        sink.expect_deliver().times(2).returning(|_| ());
        let (tx, rx) = mpsc::channel(4);

        tx.send(CommandRequest::new("delete", vec!["ghost".into()], "a")).await.unwrap();
        tx.send(CommandRequest::new("delete", vec![], "b")).await.unwrap();
        drop(tx);

        assert_eq!(serve(bridge, rx, Arc::new(sink)).await, 2);
    }

    /// Lookups blow up inside the worker; deletes succeed
    struct PanickingLookups;

    impl SecureBackend for PanickingLookups {
        fn query(&self, key: &CredentialKey) -> Result<Vec<u8>, BackendError> {
            panic!("lookup of {} crashed", key)
        }

        fn add(&self, _key: &CredentialKey, _data: &[u8]) -> Result<(), BackendError> {
            Ok(())
        }

        fn update_data(&self, _key: &CredentialKey, _data: &[u8]) -> Result<(), BackendError> {
            Ok(())
        }

        fn update_account(&self, _key: &CredentialKey, _new_account: &str) -> Result<(), BackendError> {
            Ok(())
        }

        fn delete(&self, _key: &CredentialKey) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_unknown_failure() {
        let store = KeychainStore::new(Arc::new(PanickingLookups));
        let bridge = Arc::new(CommandBridge::new(store, KeychainConfig::default()));

        let crashed = Arc::clone(&bridge)
            .dispatch(CommandRequest::new("getPassword", vec!["alice".into()], "cb-crash"))
            .await;

        assert_eq!(crashed.callback_id, "cb-crash");
        assert_eq!(crashed.status, ResponseStatus::Failure);
        assert!(crashed.error().unwrap().starts_with("Unknown: "), "{:?}", crashed.error());

        let next = bridge
            .dispatch(CommandRequest::new("delete", vec!["alice".into()], "cb-next"))
            .await;
        assert_eq!(next.callback_id, "cb-next");
        assert!(next.is_success());
    }

    #[tokio::test]
    async fn test_serve_answers_unparseable_host_lines() {
        let (bridge, backend) = setup();
        let sink = RecordingSink::new();
        let (tx, rx) = mpsc::channel(8);

        let lines: [&[u8]; 4] = [
            b"{not json",
            br#"{"operationName":"getPassword","arguments":[["alice"]]}"#,
            br#"{"operationName":42,"arguments":[["alice"]],"callbackId":"cb3"}"#,
            b"\xff\xfe\n",
        ];
        for line in lines {
            tx.send(CommandRequest::from_bytes(line)).await.unwrap();
        }
        tx.send(CommandRequest::new("savePassword", vec!["alice".into(), "pw".into()], "cb5"))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(serve(bridge, rx, Arc::new(sink.clone())).await, 5);

        let responses = sink.responses();
        let ids: Vec<&str> = responses.iter().map(|r| r.callback_id.as_str()).collect();
        assert_eq!(ids, vec!["", "", "cb3", "", "cb5"]);
        for response in &responses[..4] {
            assert!(response.error().unwrap().starts_with("InvalidInput: "));
        }
        assert!(responses[4].is_success());
        // Only the valid save touched the backend
        let ops: Vec<BackendOp> = backend.calls().into_iter().map(|call| call.op).collect();
        assert_eq!(ops, vec![BackendOp::Query, BackendOp::Add]);
    }
}
