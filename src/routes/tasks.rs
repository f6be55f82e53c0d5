// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! Each call fires one scan trigger. The worker picks it up on its next
//! poll; a trigger fired while another is still pending is absorbed by it.

use crate::services::TriggerSender;
use crate::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks/full-scan", post(trigger_full_scan))
        .route("/tasks/star-scan", post(trigger_star_scan))
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub queued: bool,
}

async fn trigger_full_scan(State(state): State<Arc<AppState>>) -> (StatusCode, Json<TriggerResponse>) {
    fire("full_scan", &state.triggers.full_scan)
}

async fn trigger_star_scan(State(state): State<Arc<AppState>>) -> (StatusCode, Json<TriggerResponse>) {
    fire("star_scan", &state.triggers.star_scan)
}

fn fire(scan: &'static str, sender: &TriggerSender) -> (StatusCode, Json<TriggerResponse>) {
    if sender.fire() {
        tracing::info!(scan, "Scan trigger queued");
        (StatusCode::ACCEPTED, Json(TriggerResponse { queued: true }))
    } else {
        tracing::info!(scan, "Scan trigger already pending, coalesced");
        (StatusCode::OK, Json(TriggerResponse { queued: false }))
    }
}
