//! Authenticated control session over one shared connection.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use cfms_connection::{ConnectOptions, ConnectionGuard, WsConnection, ensure_success, send_request};
use cfms_protocol::constants::{CODE_PASSWORD_CHANGE_REQUIRED, PROTOCOL_VERSION};
use cfms_protocol::{Action, FrameChannel, Response};

use crate::types::{DirectoryListing, DocumentInfo, LoginOutcome, ServerInfo, UserInfo};
use crate::ClientError;

#[derive(Deserialize)]
struct LoginData {
    token: String,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    exp: Option<f64>,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    groups: Vec<String>,
}

#[derive(Deserialize)]
struct CreatedDirectory {
    id: String,
}

/// A control connection plus the credentials of the logged-in user.
///
/// All requests are serialized through a [`ConnectionGuard`], so a session
/// can be shared (e.g. behind an `Arc`) by concurrent callers.
pub struct Session<C> {
    guard: ConnectionGuard<C>,
    user: Option<UserInfo>,
}

impl Session<WsConnection> {
    /// Connects to `url` and checks the server's protocol version.
    ///
    /// The connection is closed again if the check fails.
    pub async fn connect(url: &str, options: &ConnectOptions) -> Result<Self, ClientError> {
        let connection = WsConnection::connect(url, options).await?;
        let session = Session::new(connection);
        let info = session.check_server().await?;
        info!(url, server = info.display_name(), protocol = info.protocol_version, "session established");
        Ok(session)
    }
}

impl<C: FrameChannel> Session<C> {
    /// Wraps an already-open connection. No requests are sent.
    pub fn new(connection: C) -> Self {
        Self {
            guard: ConnectionGuard::new(connection),
            user: None,
        }
    }

    /// The logged-in user, if any.
    pub fn user(&self) -> Option<&UserInfo> {
        self.user.as_ref()
    }

    pub async fn server_info(&self) -> Result<ServerInfo, ClientError> {
        let response = ensure_success(self.send(Action::ServerInfo, json!({}), false).await?)?;
        response
            .parse_data()
            .map_err(|e| ClientError::UnexpectedResponse(format!("server_info: {e}")))
    }

    /// Fetches server info and rejects servers newer than this client.
    pub async fn check_server(&self) -> Result<ServerInfo, ClientError> {
        let info = match self.server_info().await {
            Ok(info) => info,
            Err(e) => {
                self.close_quietly().await;
                return Err(e);
            }
        };

        if info.protocol_version > PROTOCOL_VERSION {
            warn!(
                server = info.protocol_version,
                client = PROTOCOL_VERSION,
                "server protocol is newer than supported"
            );
            self.close_quietly().await;
            return Err(ClientError::ProtocolTooNew {
                server: info.protocol_version,
                client: PROTOCOL_VERSION,
            });
        }
        Ok(info)
    }

    /// Logs in and keeps the returned token for later requests.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginOutcome, ClientError> {
        let response = self
            .send(Action::Login, json!({"username": username, "password": password}), false)
            .await?;

        if response.code == CODE_PASSWORD_CHANGE_REQUIRED {
            info!(username, "password change required");
            return Ok(LoginOutcome::PasswordChangeRequired);
        }
        let response = ensure_success(response)?;

        let data: LoginData = response
            .parse_data()
            .map_err(|e| ClientError::UnexpectedResponse(format!("login: {e}")))?;
        let user = UserInfo {
            username: username.to_string(),
            token: data.token,
            nickname: data.nickname,
            exp: data.exp,
            permissions: data.permissions,
            groups: data.groups,
        };
        info!(username, "logged in");
        self.user = Some(user.clone());
        Ok(LoginOutcome::LoggedIn(user))
    }

    /// Sends an authenticated request and requires a success code.
    pub async fn request(&self, action: Action, data: Value) -> Result<Response, ClientError> {
        Ok(ensure_success(self.send(action, data, true).await?)?)
    }

    /// Creates a directory and returns its id.
    pub async fn create_directory(
        &self,
        parent_id: Option<&str>,
        name: &str,
        exists_ok: bool,
    ) -> Result<String, ClientError> {
        let response = self
            .send(
                Action::CreateDirectory,
                json!({"parent_id": parent_id, "name": name, "exists_ok": exists_ok}),
                true,
            )
            .await?;
        if !response.is_success() {
            return Err(ClientError::CreateDirectoryFailed {
                name: name.to_string(),
                message: response.message,
            });
        }
        let created: CreatedDirectory = response
            .parse_data()
            .map_err(|e| ClientError::UnexpectedResponse(format!("create_directory: {e}")))?;
        debug!(name, id = %created.id, "directory created");
        Ok(created.id)
    }

    /// Creates a document and returns the upload task id for its content.
    pub async fn create_document(&self, title: &str, folder_id: Option<&str>) -> Result<String, ClientError> {
        let response = self
            .request(
                Action::CreateDocument,
                json!({"title": title, "folder_id": folder_id, "access_rules": {}}),
            )
            .await?;
        task_id_of(Action::CreateDocument, &response)
    }

    /// Requests a download task for a document.
    pub async fn get_document(&self, document_id: &str) -> Result<String, ClientError> {
        let response = self
            .request(Action::GetDocument, json!({"document_id": document_id}))
            .await?;
        task_id_of(Action::GetDocument, &response)
    }

    /// Lists a folder; `None` lists the root.
    pub async fn list_directory(&self, folder_id: Option<&str>) -> Result<DirectoryListing, ClientError> {
        let response = self
            .request(Action::ListDirectory, json!({"folder_id": folder_id}))
            .await?;
        response
            .parse_data()
            .map_err(|e| ClientError::UnexpectedResponse(format!("list_directory: {e}")))
    }

    pub async fn get_document_info(&self, document_id: &str) -> Result<DocumentInfo, ClientError> {
        let response = self
            .request(Action::GetDocumentInfo, json!({"document_id": document_id}))
            .await?;
        response
            .parse_data()
            .map_err(|e| ClientError::UnexpectedResponse(format!("get_document_info: {e}")))
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<(), ClientError> {
        self.request(Action::DeleteDocument, json!({"document_id": document_id}))
            .await?;
        info!(document_id, "document deleted");
        Ok(())
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        self.guard
            .close()
            .await
            .map_err(|e| ClientError::Rpc(e.into()))
    }

    async fn close_quietly(&self) {
        if let Err(e) = self.guard.close().await {
            debug!(error = %e, "close after failed check");
        }
    }

    async fn send(&self, action: Action, data: Value, authenticated: bool) -> Result<Response, ClientError> {
        let (username, token) = match (&self.user, authenticated) {
            (Some(user), true) => (Some(user.username.as_str()), Some(user.token.as_str())),
            _ => (None, None),
        };
        Ok(send_request(&self.guard, action, data, username, token).await?)
    }
}

fn task_id_of(action: Action, response: &Response) -> Result<String, ClientError> {
    response
        .task_id()
        .map(str::to_string)
        .ok_or_else(|| ClientError::UnexpectedResponse(format!("{action}: reply carries no task id")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfms_protocol::{Frame, MemoryChannel, TransportError, memory_pair};
    use tokio::task::JoinHandle;

    /// Answers requests in order with `replies`, returning what was received.
    fn scripted(replies: Vec<Value>) -> (Session<MemoryChannel>, JoinHandle<Vec<Value>>) {
        let (client, mut server) = memory_pair(8);
        let handle = tokio::spawn(async move {
            let mut requests = Vec::new();
            for reply in replies {
                let Ok(frame) = server.recv().await else { break };
                requests.push(serde_json::from_str(&frame.into_text().unwrap()).unwrap());
                server.send(Frame::Text(reply.to_string())).await.unwrap();
            }
            // Report whether the client closed the connection.
            if matches!(server.recv().await, Err(TransportError::Closed)) {
                requests.push(json!("closed"));
            }
            requests
        });
        (Session::new(client), handle)
    }

    fn ok(data: Value) -> Value {
        json!({"code": 200, "message": "OK", "data": data})
    }

    fn login_reply() -> Value {
        ok(json!({
            "token": "tok-1",
            "nickname": "Alice",
            "exp": 1_900_000_000.0,
            "permissions": ["upload"],
            "groups": ["staff"],
        }))
    }

    #[tokio::test]
    async fn check_server_accepts_current_protocol() {
        let (session, server) = scripted(vec![ok(json!({
            "protocol_version": PROTOCOL_VERSION,
            "server_name": "Archive",
        }))]);

        let info = session.check_server().await.unwrap();
        assert_eq!(info.display_name(), "Archive");
        session.close().await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests[0]["action"], "server_info");
        assert!(requests[0]["token"].is_null());
    }

    #[tokio::test]
    async fn newer_protocol_is_rejected_and_closed() {
        let (session, server) = scripted(vec![ok(json!({"protocol_version": PROTOCOL_VERSION + 1}))]);

        let err = session.check_server().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::ProtocolTooNew { server, client } if server == PROTOCOL_VERSION + 1 && client == PROTOCOL_VERSION
        ));

        let requests = server.await.unwrap();
        assert_eq!(requests.last().unwrap(), &json!("closed"));
    }

    #[tokio::test]
    async fn login_stores_credentials_for_later_requests() {
        let (mut session, server) = scripted(vec![
            login_reply(),
            ok(json!({"task_data": {"task_id": "up-1"}})),
        ]);

        let outcome = session.login("alice", "secret").await.unwrap();
        let LoginOutcome::LoggedIn(user) = outcome else {
            panic!("expected login");
        };
        assert_eq!(user.token, "tok-1");
        assert_eq!(user.nickname.as_deref(), Some("Alice"));
        assert_eq!(user.groups, vec!["staff"]);
        assert_eq!(session.user(), Some(&user));

        let task = session.create_document("report.pdf", Some("f-1")).await.unwrap();
        assert_eq!(task, "up-1");
        session.close().await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests[0]["action"], "login");
        assert_eq!(requests[0]["data"]["password"], "secret");
        assert!(requests[0]["username"].is_null());
        assert_eq!(requests[1]["action"], "create_document");
        assert_eq!(requests[1]["username"], "alice");
        assert_eq!(requests[1]["token"], "tok-1");
        assert_eq!(requests[1]["data"]["title"], "report.pdf");
        assert_eq!(requests[1]["data"]["folder_id"], "f-1");
        assert!(requests[1]["data"]["access_rules"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_password_change_required() {
        let (mut session, _server) =
            scripted(vec![json!({"code": 403, "message": "change password"})]);

        let outcome = session.login("alice", "old").await.unwrap();
        assert_eq!(outcome, LoginOutcome::PasswordChangeRequired);
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn login_failure_carries_response() {
        let (mut session, _server) = scripted(vec![json!({"code": 401, "message": "bad credentials"})]);

        let err = session.login("alice", "wrong").await.unwrap_err();
        let ClientError::Rpc(rpc) = err else {
            panic!("expected rpc error, got {err:?}");
        };
        assert_eq!(rpc.response().unwrap().code, 401);
    }

    #[tokio::test]
    async fn create_directory_returns_id() {
        let (session, server) = scripted(vec![ok(json!({"id": "dir-9"}))]);

        let id = session.create_directory(None, "docs", true).await.unwrap();
        assert_eq!(id, "dir-9");
        session.close().await.unwrap();

        let requests = server.await.unwrap();
        assert!(requests[0]["data"]["parent_id"].is_null());
        assert_eq!(requests[0]["data"]["exists_ok"], true);
    }

    #[tokio::test]
    async fn create_directory_failure_names_directory() {
        let (session, _server) = scripted(vec![json!({"code": 409, "message": "already exists"})]);

        let err = session.create_directory(Some("p"), "docs", false).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::CreateDirectoryFailed { ref name, ref message } if name == "docs" && message == "already exists"
        ));
    }

    #[tokio::test]
    async fn get_document_without_task_is_unexpected() {
        let (session, _server) = scripted(vec![ok(json!({}))]);

        let err = session.get_document("doc-1").await.unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn list_directory_returns_entries() {
        let (session, server) = scripted(vec![ok(json!({
            "folders": [{"id": "f-2", "name": "Invoices", "created_time": 1_700_000_000.0}],
            "documents": [{"id": "d-5", "title": "plan.txt", "size": 0, "last_modified": 1_700_000_500.0}],
            "parent_id": "f-1",
        }))]);

        let listing = session.list_directory(Some("f-9")).await.unwrap();
        assert_eq!(listing.folders[0].id, "f-2");
        assert_eq!(listing.documents[0].title, "plan.txt");
        assert_eq!(listing.parent_id.as_deref(), Some("f-1"));
        session.close().await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests[0]["action"], "list_directory");
        assert_eq!(requests[0]["data"]["folder_id"], "f-9");
    }

    #[tokio::test]
    async fn list_directory_failure_is_request_failure() {
        let (session, _server) = scripted(vec![json!({"code": 404, "message": "no such folder"})]);

        let err = session.list_directory(None).await.unwrap_err();
        let ClientError::Rpc(rpc) = err else {
            panic!("expected rpc error, got {err:?}");
        };
        assert_eq!(rpc.response().unwrap().message, "no such folder");
    }

    #[tokio::test]
    async fn document_info_and_delete() {
        let (session, server) = scripted(vec![
            ok(json!({
                "document_id": "d-5",
                "title": "plan.txt",
                "size": 12,
                "created_time": 1_700_000_000.0,
                "last_modified": 1_700_000_500.0,
                "parent_id": null,
                "access_rules": {"read": []},
                "info_code": 0,
            })),
            ok(json!({})),
        ]);

        let info = session.get_document_info("d-5").await.unwrap();
        assert_eq!(info.size, 12);
        assert!(info.access_rules().is_some());
        session.delete_document("d-5").await.unwrap();
        session.close().await.unwrap();

        let requests = server.await.unwrap();
        assert_eq!(requests[0]["action"], "get_document_info");
        assert_eq!(requests[1]["action"], "delete_document");
        assert_eq!(requests[1]["data"]["document_id"], "d-5");
    }

    #[tokio::test]
    async fn denied_request_is_request_failure() {
        let (session, _server) = scripted(vec![json!({"code": 403, "message": "no permission"})]);

        let err = session.create_document("a.txt", None).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(err, ClientError::Rpc(_)));
    }
}
