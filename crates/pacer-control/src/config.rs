//! Control surface configuration.

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Control server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum concurrent event stream connections.
    #[serde(default = "default_max_event_connections")]
    pub max_event_connections: usize,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_event_connections() -> usize {
    16
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_event_connections: default_max_event_connections(),
        }
    }
}

impl ControlConfig {
    /// Socket address to listen on.
    pub fn socket_addr(&self) -> ControlResult<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| ControlError::InvalidBind(self.bind.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
