//! Bounded external calls
//!
//! Every adapter call is a blocking request/response from the pipeline's
//! point of view. A call that exceeds its bound is a hard failure of that
//! operation and is never retried here.
//!
//! Expiry drops the pending call future. The request may already be on the
//! wire, so the service can still carry it out after the caller has seen
//! [`Error::Timeout`]; the pipeline reports such a subtree as failed and a
//! later read of operational state shows what actually landed.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound for a single external call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `call` for at most `limit`, mapping expiry to [`Error::Timeout`]
///
/// On expiry `call` is dropped without being polled again.
pub async fn bounded<T, F>(service: &str, operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    debug!("Calling {} {} (timeout {:?})", service, operation, limit);
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{} {} did not answer within {:?}", service, operation, limit);
            Err(Error::timeout(service, operation))
        }
    }
}
