use crate::db::StoreError;
use crate::ipc::error::err;
use crate::ipc::types::Request;
use crate::model::ResultRecord;
use serde::de::DeserializeOwned;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn store(e: StoreError, op: &'static str) -> Self {
        let details = match &e {
            StoreError::NotFound(id) => Some(json!({ "resultId": id })),
            _ => Some(json!({ "table": "results" })),
        };
        Self {
            code: e.code(op),
            message: e.to_string(),
            details,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn required_str(req: &Request, key: &str) -> Result<String, HandlerErr> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(HandlerErr::bad_params(format!("missing {key}"))),
    }
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_param<T: DeserializeOwned>(req: &Request, key: &str) -> Result<T, HandlerErr> {
    let Some(raw) = req.params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {key}")));
    };
    serde_json::from_value(raw.clone()).map_err(|e| {
        HandlerErr::bad_params(format!("invalid {key}: {e}")).with_details(json!({ "param": key }))
    })
}

pub fn required_record(req: &Request) -> Result<ResultRecord, HandlerErr> {
    required_param(req, "record")
}
