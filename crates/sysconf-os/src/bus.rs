// # System Bus Connection
//
// One process-wide connection to the D-Bus system bus, shared by every
// systemd adapter.
//
// ## Lifecycle
//
// - Connected lazily on first use, then reused for every call
// - Connecting is retried a bounded number of times with a fixed delay
// - A transport failure on any call drops the cached connection; the next
//   call reconnects
// - `close()` tears the connection down at shutdown
//
// Method calls themselves are never retried here. A failed mutation is
// reported to the pipeline, which decides what to do with it.

use std::sync::Arc;
use std::time::Duration;

use sysconf_core::{BusConfig, Error, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zbus::Connection;

/// Shared system bus handle
pub struct SystemBus {
    connection: Mutex<Option<Connection>>,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
}

impl SystemBus {
    pub fn new(config: &BusConfig) -> Arc<Self> {
        Arc::new(Self {
            connection: Mutex::new(None),
            reconnect_attempts: config.reconnect_attempts.max(1),
            reconnect_delay: config.reconnect_delay(),
        })
    }

    /// The live connection, connecting first if there is none
    ///
    /// # Errors
    ///
    /// `ServiceUnavailable` if every connection attempt failed.
    pub async fn connection(&self, service: &str) -> Result<Connection> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        for attempt in 1..=self.reconnect_attempts {
            match Connection::system().await {
                Ok(conn) => {
                    info!("Connected to the system bus (attempt {})", attempt);
                    *guard = Some(conn.clone());
                    return Ok(conn);
                }
                Err(e) => {
                    warn!(
                        "System bus connection attempt {}/{} failed: {}",
                        attempt, self.reconnect_attempts, e
                    );
                    if attempt < self.reconnect_attempts {
                        tokio::time::sleep(self.reconnect_delay).await;
                    }
                }
            }
        }

        Err(Error::service_unavailable(service))
    }

    /// Translate a failed call, dropping the connection on transport errors
    pub async fn call_failed(&self, service: &'static str, err: zbus::Error) -> Error {
        if is_transport_failure(&err) {
            warn!("System bus transport failure ({}): {}", service, err);
            self.invalidate().await;
        }
        map_error(service, err)
    }

    /// Forget the cached connection
    pub async fn invalidate(&self) {
        if self.connection.lock().await.take().is_some() {
            debug!("Dropped system bus connection");
        }
    }

    /// Close the connection, if one is open
    pub async fn close(&self) -> Result<()> {
        let Some(conn) = self.connection.lock().await.take() else {
            return Ok(());
        };

        conn.close()
            .await
            .map_err(|e| Error::service("system-bus", format!("Failed to close connection: {e}")))?;
        info!("System bus connection closed");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }
}

const ACCESS_DENIED: &str = "org.freedesktop.DBus.Error.AccessDenied";
const INTERACTIVE_AUTH_REQUIRED: &str = "org.freedesktop.DBus.Error.InteractiveAuthorizationRequired";
const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
const NAME_HAS_NO_OWNER: &str = "org.freedesktop.DBus.Error.NameHasNoOwner";
const NO_REPLY: &str = "org.freedesktop.DBus.Error.NoReply";
const TIMEOUT: &str = "org.freedesktop.DBus.Error.Timeout";

/// Map a zbus error onto the daemon's error taxonomy
pub fn map_error(service: &'static str, err: zbus::Error) -> Error {
    match &err {
        zbus::Error::MethodError(name, detail, _) => {
            map_error_name(service, name.as_str(), detail.as_deref().unwrap_or_default())
        }
        zbus::Error::FDO(fdo) => match fdo.as_ref() {
            zbus::fdo::Error::AccessDenied(_)
            | zbus::fdo::Error::InteractiveAuthorizationRequired(_) => {
                Error::permission_denied(service)
            }
            zbus::fdo::Error::ServiceUnknown(_) | zbus::fdo::Error::NameHasNoOwner(_) => {
                Error::service_unavailable(service)
            }
            zbus::fdo::Error::NoReply(_) | zbus::fdo::Error::Timeout(_) => {
                Error::timeout(service, "method call")
            }
            other => Error::service(service, other.to_string()),
        },
        _ if is_transport_failure(&err) => Error::service_unavailable(service),
        _ => Error::service(service, err.to_string()),
    }
}

fn map_error_name(service: &'static str, name: &str, detail: &str) -> Error {
    match name {
        ACCESS_DENIED | INTERACTIVE_AUTH_REQUIRED => Error::permission_denied(service),
        SERVICE_UNKNOWN | NAME_HAS_NO_OWNER => Error::service_unavailable(service),
        NO_REPLY | TIMEOUT => Error::timeout(service, "method call"),
        _ => Error::service(service, format!("{name}: {detail}")),
    }
}

/// Errors after which the cached connection cannot be trusted
fn is_transport_failure(err: &zbus::Error) -> bool {
    matches!(
        err,
        zbus::Error::InputOutput(_) | zbus::Error::Handshake(_) | zbus::Error::Address(_)
    )
}
