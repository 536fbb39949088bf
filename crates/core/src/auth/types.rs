use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

use crate::tenant::Tenant;

/// Request information for authentication
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// Header names are lowercase.
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
    /// Tenant the request addresses.
    pub tenant: Tenant,
}

/// Authenticated identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub method: String,
    pub tenant: Tenant,
}

impl Identity {
    pub fn anonymous(tenant: Tenant) -> Self {
        Self {
            user_id: "anonymous".to_string(),
            method: "none".to_string(),
            tenant,
        }
    }
}
