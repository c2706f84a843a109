//! Host-info route.

use axum::response::Json;

use crate::services::hostinfo::{self, HostInfo};

/// `GET /api/hostinfo`: ranked local addresses for building a join URL.
pub async fn get_hostinfo() -> Json<HostInfo> {
    Json(hostinfo::host_info())
}
