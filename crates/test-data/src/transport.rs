//! In-process wind transport with scripted per-provider behaviour.

use std::sync::{Mutex, PoisonError};

use apparent_wind::{
    errors::ProviderError,
    wind::{HourlyResponse, Provider, WindQuery, WindTransport},
};
use async_trait::async_trait;

use crate::weather::WindField;

/// What a provider does when asked for data.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Answers from a generated wind field.
    Serve(WindField),
    /// Answers with a fixed payload.
    Payload(HourlyResponse),
    /// Non-2xx response.
    Status(u16),
    /// Connection failure or timeout.
    Unreachable,
}

/// A [`WindTransport`] that never touches the network and records every call.
#[derive(Debug)]
pub struct ScriptedTransport {
    reanalysis: Scripted,
    forecast: Scripted,
    calls: Mutex<Vec<(Provider, WindQuery)>>,
}

impl ScriptedTransport {
    pub fn new(reanalysis: Scripted, forecast: Scripted) -> Self {
        Self {
            reanalysis,
            forecast,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Both providers serve the same field.
    pub fn serving(field: WindField) -> Self {
        Self::new(Scripted::Serve(field.clone()), Scripted::Serve(field))
    }

    pub fn calls(&self) -> Vec<(Provider, WindQuery)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn providers_called(&self) -> Vec<Provider> {
        self.calls().into_iter().map(|(p, _)| p).collect()
    }
}

#[async_trait]
impl WindTransport for ScriptedTransport {
    async fn hourly(
        &self,
        provider: Provider,
        query: &WindQuery,
    ) -> Result<HourlyResponse, ProviderError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((provider, *query));

        let script = match provider {
            Provider::Reanalysis => &self.reanalysis,
            Provider::Forecast => &self.forecast,
        };
        match script {
            Scripted::Serve(field) => Ok(field.hourly_response(query)),
            Scripted::Payload(payload) => Ok(payload.clone()),
            Scripted::Status(status) => Err(ProviderError::Status {
                provider,
                status: *status,
            }),
            Scripted::Unreachable => Err(ProviderError::Transport {
                provider,
                message: "connection refused".to_string(),
            }),
        }
    }
}
