//! In-process fake of the remote annotation API.
//!
//! Serves `/pdf-annotations` from memory on an ephemeral port and records
//! what each request looked like, so tests can assert on the wire.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use marginalia_client::{AnnotationApi, StaticToken};
use marginalia_core::annotation::{Annotation, AnnotationBody, NewAnnotation};

pub const TOKEN: &str = "test-token";

type Reply = Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)>;

#[derive(Default)]
pub struct FakeApi {
    pub rows: Mutex<Vec<Annotation>>,
    pub hits: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
    pub auth_headers: Mutex<Vec<String>>,
    pub last_body: Mutex<Option<Value>>,
    /// Page size cap applied regardless of the requested `per_page`.
    pub max_per_page: Mutex<Option<usize>>,
    next_id: AtomicUsize,
}

impl FakeApi {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn seed(&self, rows: Vec<Annotation>) {
        self.rows.lock().unwrap().extend(rows);
    }

    pub fn row_ids(&self) -> Vec<String> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.annotation_id.clone())
            .collect()
    }

    fn record(&self, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.auth_headers.lock().unwrap().push(auth.clone());

        if auth != format!("Bearer {TOKEN}") {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid or missing token", "code": "UNAUTHORIZED"})),
            ));
        }
        Ok(())
    }

    fn insert(&self, new: NewAnnotation) -> Annotation {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = Annotation {
            annotation_id: format!("row-{n}"),
            course_section_id: new.course_section_id,
            summary_id: new.summary_id,
            is_summary: new.is_summary,
            annotation: new.annotation,
            created_at: None,
            updated_at: None,
        };
        self.rows.lock().unwrap().push(row.clone());
        row
    }
}

fn not_found(id: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("Annotation with id {id} not found"), "code": "NOT_FOUND"})),
    )
}

async fn create(State(api): State<Arc<FakeApi>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    api.record(&headers)?;
    *api.last_body.lock().unwrap() = Some(body.clone());
    let new: NewAnnotation = serde_json::from_value(body).map_err(|e| {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"message": e.to_string()})))
    })?;
    let row = api.insert(new);
    Ok((StatusCode::CREATED, Json(json!({ "data": row }))))
}

async fn list(State(api): State<Arc<FakeApi>>, headers: HeaderMap, RawQuery(query): RawQuery) -> Reply {
    api.record(&headers)?;
    let query = query.unwrap_or_default();
    api.queries.lock().unwrap().push(query.clone());

    let params: Vec<(String, String)> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .filter_map(|p| p.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let param = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };

    let rows: Vec<Annotation> = api
        .rows
        .lock()
        .unwrap()
        .iter()
        .filter(|r| {
            param("course_section_id").map_or(true, |id| r.course_section_id.as_deref() == Some(id.as_str()))
                && param("summary_id").map_or(true, |id| r.summary_id.as_deref() == Some(id.as_str()))
        })
        .cloned()
        .collect();

    let page: usize = param("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let requested: usize = param("per_page").and_then(|p| p.parse().ok()).unwrap_or(50);
    let per_page = match *api.max_per_page.lock().unwrap() {
        Some(cap) => requested.min(cap),
        None => requested,
    };
    let data: Vec<Annotation> = rows
        .iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .cloned()
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({"data": data, "total": rows.len(), "page": page, "per_page": per_page})),
    ))
}

async fn get_one(State(api): State<Arc<FakeApi>>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    api.record(&headers)?;
    let rows = api.rows.lock().unwrap();
    let row = rows
        .iter()
        .find(|r| r.annotation_id == id)
        .ok_or_else(|| not_found(&id))?;
    Ok((StatusCode::OK, Json(json!(row))))
}

async fn update_one(
    State(api): State<Arc<FakeApi>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    api.record(&headers)?;
    *api.last_body.lock().unwrap() = Some(body.clone());
    let annotation: AnnotationBody = serde_json::from_value(body["annotation"].clone())
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"message": e.to_string()}))))?;

    let mut rows = api.rows.lock().unwrap();
    let row = rows
        .iter_mut()
        .find(|r| r.annotation_id == id)
        .ok_or_else(|| not_found(&id))?;
    row.annotation = annotation;
    Ok((StatusCode::OK, Json(json!(row))))
}

async fn delete_one(State(api): State<Arc<FakeApi>>, headers: HeaderMap, Path(id): Path<String>) -> Reply {
    api.record(&headers)?;
    let mut rows = api.rows.lock().unwrap();
    let before = rows.len();
    rows.retain(|r| r.annotation_id != id);
    if rows.len() == before {
        return Err(not_found(&id));
    }
    Ok((StatusCode::NO_CONTENT, Json(Value::Null)))
}

async fn bulk_create(State(api): State<Arc<FakeApi>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    api.record(&headers)?;
    let batch: Vec<NewAnnotation> = serde_json::from_value(body["annotations"].clone())
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({"message": e.to_string()}))))?;
    let created: Vec<Annotation> = batch.into_iter().map(|n| api.insert(n)).collect();
    Ok((StatusCode::CREATED, Json(json!(created))))
}

async fn bulk_update(State(api): State<Arc<FakeApi>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    api.record(&headers)?;
    let patches = body["annotations"].as_array().cloned().unwrap_or_default();
    let mut rows = api.rows.lock().unwrap();
    let mut updated = Vec::new();
    for patch in patches {
        let id = patch["annotation_id"].as_str().unwrap_or_default();
        if let Some(row) = rows.iter_mut().find(|r| r.annotation_id == id) {
            row.annotation = serde_json::from_value(patch["annotation"].clone()).unwrap();
            updated.push(row.clone());
        }
    }
    Ok((StatusCode::OK, Json(json!({"data": updated}))))
}

async fn bulk_delete(State(api): State<Arc<FakeApi>>, headers: HeaderMap, Json(body): Json<Value>) -> Reply {
    api.record(&headers)?;
    *api.last_body.lock().unwrap() = Some(body.clone());
    let ids: Vec<String> = serde_json::from_value(body["annotation_ids"].clone()).unwrap_or_default();
    api.rows.lock().unwrap().retain(|r| !ids.contains(&r.annotation_id));
    Ok((StatusCode::OK, Json(json!({"deleted": ids.len()}))))
}

/// Start the fake on an ephemeral port. Returns its shared state and the
/// base URL to point a client at.
pub async fn spawn_fake_api() -> (Arc<FakeApi>, String) {
    let state = Arc::new(FakeApi::default());

    let app = Router::new()
        .route("/pdf-annotations", get(list).post(create))
        .route(
            "/pdf-annotations/bulk",
            axum::routing::post(bulk_create).put(bulk_update).delete(bulk_delete),
        )
        .route(
            "/pdf-annotations/{id}",
            get(get_one).put(update_one).delete(delete_one),
        )
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, format!("http://{addr}"))
}

/// A client authenticated with [`TOKEN`].
pub fn client(base_url: &str) -> AnnotationApi {
    AnnotationApi::new(base_url, Arc::new(StaticToken::new(TOKEN)))
}

/// A store row for seeding the fake.
pub fn row(id: &str, section: &str, reply_to: Option<&str>) -> Annotation {
    let mut body = AnnotationBody::new(format!("v-{id}"));
    body.page_number = Some(1);
    match reply_to {
        Some(parent) => {
            body.motivation = Some(marginalia_core::annotation::Motivation::Replying);
            body.target.source = parent.to_string();
        }
        None => body.target.source = "document".to_string(),
    }
    Annotation {
        annotation_id: id.to_string(),
        course_section_id: Some(section.to_string()),
        summary_id: None,
        is_summary: false,
        annotation: body,
        created_at: None,
        updated_at: None,
    }
}
