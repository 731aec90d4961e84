//! Calendar Reader: stored refresh credential to normalized events.

use std::sync::Arc;

use calassist_core::{NormalizedEvent, TimeWindow};
use calassist_providers::{CalendarSource, normalize_events};
use calassist_store::Store;
use tracing::debug;

use crate::error::ApiError;

pub struct CalendarReader {
    store: Arc<Store>,
    source: Arc<dyn CalendarSource>,
}

impl CalendarReader {
    pub fn new(store: Arc<Store>, source: Arc<dyn CalendarSource>) -> Self {
        Self { store, source }
    }

    /// Lists the identity's primary-calendar events inside `window`.
    ///
    /// Authorizes with the stored refresh credential only. Provider failures
    /// surface as [`ApiError::CalendarFetchFailed`] without retry.
    pub async fn list_events(
        &self,
        identity_id: &str,
        window: TimeWindow,
    ) -> Result<Vec<NormalizedEvent>, ApiError> {
        let credential = self
            .store
            .find_active_credential(identity_id)?
            .ok_or(ApiError::NoCredential)?;

        let raw = self
            .source
            .list_primary_events(&credential.refresh_secret, window)
            .await
            .map_err(|e| ApiError::CalendarFetchFailed(e.to_string()))?;

        let events = normalize_events(&raw);
        debug!(identity_id, events = events.len(), "listed calendar events");
        Ok(events)
    }
}
