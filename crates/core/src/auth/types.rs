use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Authenticated caller, recorded as the actor of audit events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub actor: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            actor: "anonymous".to_string(),
            method: "none".to_string(),
        }
    }

    /// Identity of a counter terminal holding the shared API key.
    pub fn cashier_terminal() -> Self {
        Self {
            actor: "kasir".to_string(),
            method: "api_key".to_string(),
        }
    }
}
