//! Badge catalog listing

use axum::{extract::State, Json};
use serde::Serialize;

use crate::catalog::{BadgeDefinition, CategoryDisplay};
use crate::AppState;

/// A catalog entry with its category's display descriptor
#[derive(Debug, Serialize)]
pub struct BadgeListing {
    #[serde(flatten)]
    pub badge: BadgeDefinition,
    pub display: CategoryDisplay,
}

/// GET /api/badges
pub async fn list_badges(State(state): State<AppState>) -> Json<Vec<BadgeListing>> {
    let listings = state
        .catalog
        .list()
        .iter()
        .map(|badge| BadgeListing {
            badge: badge.clone(),
            display: *badge.category.display(),
        })
        .collect();

    Json(listings)
}
