//! Host port allocation
//!
//! Ports come from the configured range and are handed out behind a mutex;
//! a candidate must also bind successfully on localhost before it is
//! considered free (another process may own it).

use std::collections::HashSet;
use std::net::TcpListener;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::PreviewError;

pub struct PortAllocator {
    start: u16,
    end: u16,
    in_use: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            start,
            end,
            in_use: Mutex::new(HashSet::new()),
        }
    }

    /// Claim a free port in the range
    pub async fn allocate(&self) -> Result<u16, PreviewError> {
        let mut in_use = self.in_use.lock().await;

        for port in self.start..=self.end {
            if in_use.contains(&port) {
                continue;
            }
            if TcpListener::bind(("127.0.0.1", port)).is_ok() {
                in_use.insert(port);
                debug!(port, "Allocated preview port");
                return Ok(port);
            }
        }

        Err(PreviewError::PortsExhausted)
    }

    /// Release a previously claimed port
    pub async fn release(&self, port: u16) {
        self.in_use.lock().await.remove(&port);
        debug!(port, "Released preview port");
    }
}
