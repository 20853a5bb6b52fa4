//! Vendor request surface
//!
//! A vendor is a named set of request types, each answered by a handler
//! taking and returning JSON. The source requests are `spawn`,
//! `reload_files` and `status`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use super::InstanceRegistry;
use crate::source::SourceStatus;
use crate::spawn::SpawnOutcome;

pub const SPAWN_REQUEST: &str = "spawn";
pub const RELOAD_FILES_REQUEST: &str = "reload_files";
pub const STATUS_REQUEST: &str = "status";

/// Handler for one request type
pub type RequestHandler = Box<dyn Fn(&Value) -> Value + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum VendorError {
    #[error("request type '{0}' is already registered")]
    DuplicateRequest(String),

    #[error("unknown request type '{0}'")]
    UnknownRequest(String),

    #[error("request addressed to vendor '{0}'")]
    UnknownVendor(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// A request as it arrives over a control channel
#[derive(Debug, Clone, Deserialize)]
pub struct VendorRequest {
    #[serde(default)]
    pub vendor_name: Option<String>,
    pub request_type: String,
    #[serde(default)]
    pub request_data: Value,
}

/// The answer sent back over a control channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VendorResponse {
    pub vendor_name: String,
    pub request_type: String,
    /// Whether the request was dispatched to a handler
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub response_data: Value,
}

/// Named collection of request handlers
pub struct VendorApi {
    name: String,
    requests: BTreeMap<String, RequestHandler>,
}

impl VendorApi {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requests: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn register_request(
        &mut self,
        request_type: impl Into<String>,
        handler: RequestHandler,
    ) -> Result<(), VendorError> {
        let request_type = request_type.into();
        if self.requests.contains_key(&request_type) {
            return Err(VendorError::DuplicateRequest(request_type));
        }
        self.requests.insert(request_type, handler);
        Ok(())
    }

    /// Registered request types, sorted
    pub fn request_types(&self) -> Vec<&str> {
        self.requests.keys().map(String::as_str).collect()
    }

    /// Run the handler for `request_type`
    pub fn call(&self, request_type: &str, request_data: &Value) -> Result<Value, VendorError> {
        let handler = self
            .requests
            .get(request_type)
            .ok_or_else(|| VendorError::UnknownRequest(request_type.to_string()))?;
        Ok(handler(request_data))
    }

    /// Check the addressing of `request`, run it and wrap the answer
    pub fn handle(&self, request: &VendorRequest) -> VendorResponse {
        let outcome = match request.vendor_name.as_deref() {
            Some(vendor) if vendor != self.name => {
                Err(VendorError::UnknownVendor(vendor.to_string()))
            }
            _ => self.call(&request.request_type, &request.request_data),
        };

        match outcome {
            Ok(response_data) => VendorResponse {
                vendor_name: self.name.clone(),
                request_type: request.request_type.clone(),
                result: true,
                comment: None,
                response_data,
            },
            Err(e) => self.failure(&request.request_type, &e),
        }
    }

    /// Response for a request that never reached a handler
    pub fn failure(&self, request_type: &str, error: &VendorError) -> VendorResponse {
        VendorResponse {
            vendor_name: self.name.clone(),
            request_type: request_type.to_string(),
            result: false,
            comment: Some(error.to_string()),
            response_data: Value::Null,
        }
    }
}

#[derive(Debug, Serialize)]
struct SpawnResponse {
    status: &'static str,
    active_count: usize,
    spawned: usize,
    outcome: SpawnOutcome,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    status: &'static str,
    #[serde(flatten)]
    source: SourceStatus,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    status: &'static str,
    file_count: usize,
}

fn not_initialized() -> Value {
    json!({ "status": "error", "message": "plugin not initialized" })
}

fn to_response(response: impl Serialize) -> Value {
    serde_json::to_value(response).unwrap_or_else(|e| {
        json!({ "status": "error", "message": format!("failed to encode response: {}", e) })
    })
}

/// Optional `request_data.source` naming the target instance
fn target(request_data: &Value) -> Option<&str> {
    request_data.get("source").and_then(Value::as_str)
}

/// Register `spawn`, `reload_files` and `status`, routed through `instances`.
///
/// A request type that fails to register is logged and skipped so the
/// others stay available.
pub fn register_source_requests(api: &mut VendorApi, instances: Arc<InstanceRegistry>) {
    let spawn_instances = instances.clone();
    let spawn: RequestHandler = Box::new(move |request_data| {
        let Some(source) = spawn_instances.resolve(target(request_data)) else {
            return not_initialized();
        };
        let result = source.spawn();
        info!(
            "Vendor '{}' called - active: {}",
            SPAWN_REQUEST, result.active_count_after
        );
        to_response(SpawnResponse {
            status: "ok",
            active_count: result.active_count_after,
            spawned: result.succeeded,
            outcome: result.outcome,
        })
    });

    let reload_instances = instances.clone();
    let reload: RequestHandler = Box::new(move |request_data| {
        let Some(source) = reload_instances.resolve(target(request_data)) else {
            return not_initialized();
        };
        let file_count = source.reload_files();
        info!("Vendor '{}' called - {} files", RELOAD_FILES_REQUEST, file_count);
        to_response(ReloadResponse {
            status: "ok",
            file_count,
        })
    });

    let status: RequestHandler = Box::new(move |request_data| {
        let Some(source) = instances.resolve(target(request_data)) else {
            return not_initialized();
        };
        to_response(StatusResponse {
            status: "ok",
            source: source.status(),
        })
    });

    for (request_type, handler) in [
        (SPAWN_REQUEST, spawn),
        (RELOAD_FILES_REQUEST, reload),
        (STATUS_REQUEST, status),
    ] {
        if let Err(e) = api.register_request(request_type, handler) {
            error!("Failed to register '{}' request: {}", request_type, e);
        }
    }

    info!(
        "Vendor '{}' registered, available requests: {:?}",
        api.name(),
        api.request_types()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceSettings;
    use crate::host::{Host, SimulatedHost};
    use crate::source::RandomMediaSource;
    use std::fs;

    fn api_with(instances: Arc<InstanceRegistry>) -> VendorApi {
        let mut api = VendorApi::new("random_media_source");
        register_source_requests(&mut api, instances);
        api
    }

    #[test]
    fn test_requests_without_instance_report_error() {
        let api = api_with(Arc::new(InstanceRegistry::new()));

        for request_type in [SPAWN_REQUEST, RELOAD_FILES_REQUEST, STATUS_REQUEST] {
            let response = api.call(request_type, &json!({})).unwrap();
            assert_eq!(response["status"], "error");
            assert_eq!(response["message"], "plugin not initialized");
        }
    }

    #[test]
    fn test_spawn_and_reload_reach_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.mp4"), b"").unwrap();

        let host: Arc<dyn Host> = Arc::new(SimulatedHost::new(1920, 1080));
        let settings = SourceSettings {
            folder: dir.path().to_path_buf(),
            ..SourceSettings::default()
        };
        let source = Arc::new(RandomMediaSource::new("main", host, settings));
        let instances = Arc::new(InstanceRegistry::new());
        instances.register(&source);
        let api = api_with(instances);

        let response = api.call(SPAWN_REQUEST, &Value::Null).unwrap();
        assert_eq!(response["status"], "ok");
        assert_eq!(response["active_count"], 1);
        assert_eq!(response["spawned"], 1);
        assert_eq!(response["outcome"], "spawned");

        fs::write(dir.path().join("b.png"), b"").unwrap();
        let response = api
            .call(RELOAD_FILES_REQUEST, &json!({ "source": "main" }))
            .unwrap();
        assert_eq!(response, json!({ "status": "ok", "file_count": 2 }));

        let response = api.call(STATUS_REQUEST, &Value::Null).unwrap();
        assert_eq!(response["status"], "ok");
        assert_eq!(response["name"], "main");
        assert_eq!(response["file_count"], 2);
        assert_eq!(response["active_count"], 1);
        assert!(response["oldest_active_since"].is_string());

        let response = api.call(SPAWN_REQUEST, &json!({ "source": "other" })).unwrap();
        assert_eq!(response["status"], "error");
    }

    #[test]
    fn test_duplicate_and_unknown_requests() {
        let mut api = api_with(Arc::new(InstanceRegistry::new()));
        assert_eq!(
            api.request_types(),
            vec![RELOAD_FILES_REQUEST, SPAWN_REQUEST, STATUS_REQUEST]
        );

        let err = api
            .register_request(SPAWN_REQUEST, Box::new(|_| Value::Null))
            .unwrap_err();
        assert!(matches!(err, VendorError::DuplicateRequest(_)));

        let err = api.call("get_status", &Value::Null).unwrap_err();
        assert!(matches!(err, VendorError::UnknownRequest(_)));
    }

    #[test]
    fn test_handle_checks_vendor_name() {
        let api = api_with(Arc::new(InstanceRegistry::new()));
        let request = VendorRequest {
            vendor_name: Some("someone_else".to_string()),
            request_type: SPAWN_REQUEST.to_string(),
            request_data: Value::Null,
        };

        let response = api.handle(&request);
        assert!(!response.result);
        assert!(response.comment.unwrap().contains("someone_else"));

        let request = VendorRequest {
            vendor_name: None,
            ..request
        };
        let response = api.handle(&request);
        assert!(response.result);
        assert_eq!(response.response_data["status"], "error");
    }
}
