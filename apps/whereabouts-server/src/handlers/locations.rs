//! Location reporting over the device credential channel

use chrono::{SubsecRound, Utc};
use serde::Deserialize;
use tracing::info;
use whereabouts_storage::{LocationReport, StoreError};

use crate::error::ServiceError;
use crate::request::Request;
use crate::server::WhereaboutsServer;
use crate::view::{location_view, LocationView};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportLocationRequest {
    pub world_id: Option<String>,
    pub world_name: Option<String>,
    pub instance_id: Option<String>,
    pub display_name: Option<String>,
}

/// Authenticated by API key only; the principal is never consulted.
/// Returns the stored location as the reporting user sees it.
pub async fn report_location(
    server: &WhereaboutsServer,
    request: Request<ReportLocationRequest>,
) -> Result<LocationView, ServiceError> {
    let user = server.authenticate_api_key(request.api_key()).await?;
    let req = request.into_inner();

    // Stored with millisecond precision
    let location = LocationReport {
        world_id: req.world_id,
        world_name: req.world_name,
        instance_id: req.instance_id,
    }
    .normalize(Utc::now().trunc_subsecs(3));

    let display_name = req
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    server
        .store
        .update_user_location(&user.id, &location, display_name)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => ServiceError::unauthorized("invalid api key"),
            _ => ServiceError::internal(format!("failed to store location: {}", e)),
        })?;

    info!(user_id = %user.id, "location reported");

    location_view(Some(&location), true)
        .ok_or_else(|| ServiceError::internal("location projection failed"))
}
