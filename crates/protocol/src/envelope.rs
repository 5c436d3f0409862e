use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::CODE_SUCCESS;

/// Outbound control request.
///
/// `username` and `token` are serialized as `null` for unauthenticated
/// actions such as the initial `login`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub action: String,
    pub data: serde_json::Value,
    pub username: Option<String>,
    pub token: Option<String>,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

impl Request {
    /// Creates a request stamped with the current wall-clock time.
    pub fn new(
        action: impl Into<String>,
        data: serde_json::Value,
        username: Option<&str>,
        token: Option<&str>,
    ) -> Self {
        Self {
            action: action.into(),
            data: normalize_data(data),
            username: username.map(str::to_string),
            token: token.map(str::to_string),
            timestamp: unix_timestamp(),
        }
    }
}

/// Inbound control response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default = "empty_object")]
    pub data: serde_json::Value,
}

impl Response {
    /// Returns `true` when `code` is 200.
    pub fn is_success(&self) -> bool {
        self.code == CODE_SUCCESS
    }

    /// Deserializes `data` into the given type.
    pub fn parse_data<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }

    /// Extracts `data.task_data.task_id`, if present.
    pub fn task_id(&self) -> Option<&str> {
        self.data
            .get("task_data")
            .and_then(|t| t.get("task_id"))
            .and_then(|id| id.as_str())
    }
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// `data` is always a mapping on the wire; `null` becomes `{}`.
fn normalize_data(data: serde_json::Value) -> serde_json::Value {
    if data.is_null() { empty_object() } else { data }
}

fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_keeps_null_credentials() {
        let req = Request::new(
            "login",
            serde_json::json!({"username": "alice", "password": "pw"}),
            None,
            None,
        );
        let json: serde_json::Value = serde_json::to_value(&req).unwrap();
        assert_eq!(json["action"], "login");
        assert!(json["username"].is_null());
        assert!(json["token"].is_null());
        assert!(json.as_object().unwrap().contains_key("username"));
        assert!(json["timestamp"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn request_with_credentials() {
        let req = Request::new("list_directory", serde_json::json!({}), Some("bob"), Some("t0k"));
        assert_eq!(req.username.as_deref(), Some("bob"));
        assert_eq!(req.token.as_deref(), Some("t0k"));
    }

    #[test]
    fn request_null_data_becomes_object() {
        let req = Request::new("server_info", serde_json::Value::Null, None, None);
        assert!(req.data.is_object());
    }

    #[test]
    fn response_defaults_missing_fields() {
        let resp: Response = serde_json::from_str(r#"{"code": 500}"#).unwrap();
        assert!(!resp.is_success());
        assert!(resp.message.is_empty());
        assert!(resp.data.is_object());
    }

    #[test]
    fn response_task_id() {
        let resp: Response = serde_json::from_str(
            r#"{"code": 200, "message": "OK", "data": {"task_data": {"task_id": "t-1"}}}"#,
        )
        .unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.task_id(), Some("t-1"));
    }

    #[test]
    fn response_without_task_id() {
        let resp: Response =
            serde_json::from_str(r#"{"code": 200, "message": "OK", "data": {}}"#).unwrap();
        assert_eq!(resp.task_id(), None);
    }

    #[test]
    fn response_parse_data() {
        #[derive(Deserialize)]
        struct Created {
            id: String,
        }
        let resp: Response =
            serde_json::from_str(r#"{"code": 200, "message": "", "data": {"id": "d1"}}"#).unwrap();
        let created: Created = resp.parse_data().unwrap();
        assert_eq!(created.id, "d1");
    }

    #[test]
    fn response_rejects_missing_code() {
        let result: Result<Response, _> = serde_json::from_str(r#"{"message": "hi"}"#);
        assert!(result.is_err());
    }
}
