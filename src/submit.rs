use crate::error::{Error, Result};
use crate::results::ResultRecord;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends finished results somewhere other than local storage.
///
/// Dispatch must not block the caller; the returned handle only exists so
/// tests and shutdown code can wait for the attempt.
pub trait ResultSubmitter {
    fn dispatch(&self, record: &ResultRecord) -> Option<JoinHandle<()>>;
}

/// Used when no endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSubmitter;

impl ResultSubmitter for NoopSubmitter {
    fn dispatch(&self, _record: &ResultRecord) -> Option<JoinHandle<()>> {
        None
    }
}

/// POSTs each result as JSON to a fixed endpoint on a background thread
#[derive(Debug, Clone)]
pub struct HttpSubmitter {
    endpoint: String,
    online: bool,
}

impl HttpSubmitter {
    pub fn new(endpoint: impl Into<String>, online: bool) -> Self {
        Self {
            endpoint: endpoint.into(),
            online,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Blocking submission of a single record
    pub fn post(endpoint: &str, record: &ResultRecord) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(SUBMIT_TIMEOUT)
            .build()?;
        let response = client.post(endpoint).json(record).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

impl ResultSubmitter for HttpSubmitter {
    fn dispatch(&self, record: &ResultRecord) -> Option<JoinHandle<()>> {
        if !self.online {
            debug!("offline, skipping result submission");
            return None;
        }

        let endpoint = self.endpoint.clone();
        let record = record.clone();
        let spawned = thread::Builder::new()
            .name("result-submit".to_string())
            .spawn(move || match HttpSubmitter::post(&endpoint, &record) {
                Ok(()) => debug!(%endpoint, "submitted result"),
                Err(e) => warn!(%endpoint, error = %e, "failed to submit result"),
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "could not spawn submission thread");
                None
            }
        }
    }
}
