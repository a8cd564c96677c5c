//! Mock committee members
//!
//! Each member is a real axum server on `127.0.0.1:0` exposing the committee
//! HTTP surface. Behavior is fixed at spawn time; every request is recorded.

use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tqv_common::CommitteeMember;

/// How a member answers proof writes and status reads
#[derive(Debug, Clone)]
pub enum MemberBehavior {
    /// 202 on writes, 200 with a status body on reads
    Accept,
    /// Fixed status code on every request
    Reject(u16),
    /// Never answers in time
    Hang,
    /// Fails with 503 for the first `n` writes, then accepts
    FailThenAccept(usize),
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Clone)]
struct MemberState {
    id: String,
    behavior: MemberBehavior,
    writes: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct MockMember {
    pub id: String,
    pub address: String,
    pub leader: bool,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockMember {
    pub async fn spawn(id: &str, leader: bool, behavior: MemberBehavior) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MemberState {
            id: id.to_string(),
            behavior,
            writes: Arc::new(AtomicUsize::new(0)),
            requests: Arc::clone(&requests),
        };

        let app = Router::new()
            .route("/proof", post(write_proof))
            .route("/proof/:task_id/supplementary", post(write_proof))
            .route("/proofs/batch", post(write_proof))
            .route("/proof/:task_id/status", get(read_status))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            id: id.to_string(),
            address,
            leader,
            requests,
        }
    }

    pub fn descriptor(&self) -> CommitteeMember {
        CommitteeMember::new(self.id.clone(), self.address.clone(), self.leader)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

async fn write_proof(State(state): State<MemberState>, uri: Uri, Json(body): Json<Value>) -> StatusCode {
    state.requests.lock().unwrap().push(RecordedRequest {
        method: "POST".to_string(),
        path: uri.path().to_string(),
        body: Some(body),
    });
    let seen = state.writes.fetch_add(1, Ordering::SeqCst);

    match state.behavior {
        MemberBehavior::Accept => StatusCode::ACCEPTED,
        MemberBehavior::Reject(code) => {
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        MemberBehavior::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::ACCEPTED
        }
        MemberBehavior::FailThenAccept(n) if seen < n => StatusCode::SERVICE_UNAVAILABLE,
        MemberBehavior::FailThenAccept(_) => StatusCode::ACCEPTED,
    }
}

async fn read_status(
    State(state): State<MemberState>,
    Path(task_id): Path<String>,
    uri: Uri,
) -> Result<Json<Value>, StatusCode> {
    state.requests.lock().unwrap().push(RecordedRequest {
        method: "GET".to_string(),
        path: uri.path().to_string(),
        body: None,
    });

    match state.behavior {
        MemberBehavior::Accept | MemberBehavior::FailThenAccept(_) => Ok(Json(json!({
            "taskId": task_id,
            "servedBy": state.id,
            "verified": true,
        }))),
        MemberBehavior::Reject(code) => {
            Err(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
        }
        MemberBehavior::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(StatusCode::GATEWAY_TIMEOUT)
        }
    }
}
