use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use circdesk::{api, db};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::{Value, json};
use tower::util::ServiceExt; // for `oneshot`

async fn setup_test_app() -> (Router, DatabaseConnection) {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    (api::api_router(db.clone()), db)
}

async fn create_test_user(db: &DatabaseConnection, username: &str, role: &str) -> i32 {
    let now = chrono::Utc::now();
    let user = circdesk::models::user::ActiveModel {
        username: Set(username.to_string()),
        role: Set(role.to_string()),
        is_staff: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    user.insert(db).await.expect("Failed to create user").id
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("Failed to build request")
}

async fn read_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&body).expect("Body is not JSON")
}

#[tokio::test]
async fn test_checkout_and_return_via_api() {
    let (app, db) = setup_test_app().await;
    let alice = create_test_user(&db, "alice", "member").await;

    // Create a book
    let response = app
        .clone()
        .oneshot(post_json(
            "/books",
            json!({ "isbn13": "9780441013593", "title": "Dune" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let book_id = read_json(response).await["book"]["id"].as_i64().unwrap();

    // Accession a copy with an explicit barcode
    let response = app
        .clone()
        .oneshot(post_json(
            "/copies",
            json!({ "book_id": book_id, "barcode": "BC-1001" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let copy = read_json(response).await;
    assert_eq!(copy["copy"]["status"], "AVAILABLE");

    // Checkout by barcode
    let response = app
        .clone()
        .oneshot(post_json(
            "/loans",
            json!({ "borrower_id": alice, "barcode": "BC-1001" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan_id = read_json(response).await["loan"]["id"].as_i64().unwrap();

    // A second checkout of the same copy conflicts
    let response = app
        .clone()
        .oneshot(post_json(
            "/loans",
            json!({ "borrower_id": alice, "barcode": "BC-1001" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Return on time: no fine, copy back on shelf
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/loans/{}/return", loan_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert!(body["fine"].is_null());
    assert!(body["loan"]["returned_at"].is_string());

    // Returning again is a conflict
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/loans/{}/return", loan_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_not_found_and_validation_mapping() {
    let (app, _db) = setup_test_app().await;

    // Missing book is a 404
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/books/999")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Bad ISBN is a 400 with an error message
    let response = app
        .clone()
        .oneshot(post_json(
            "/books",
            json!({ "isbn13": "not-an-isbn", "title": "Bad" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("isbn13"));

    // Checkout without copy_id or barcode is a 400
    let response = app
        .clone()
        .oneshot(post_json("/loans", json!({ "borrower_id": 1 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_hold_blocks_rival_checkout() {
    let (app, db) = setup_test_app().await;
    let alice = create_test_user(&db, "alice", "member").await;
    let bob = create_test_user(&db, "bob", "member").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/books",
            json!({ "isbn13": "9780553293357", "title": "Foundation" }),
        ))
        .await
        .unwrap();
    let book_id = read_json(response).await["book"]["id"].as_i64().unwrap();

    app.clone()
        .oneshot(post_json(
            "/copies",
            json!({ "book_id": book_id, "barcode": "BC-2001" }),
        ))
        .await
        .unwrap();

    // Alice holds the title
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/books/{}/holds", book_id),
            json!({ "user_id": alice }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let hold = read_json(response).await;
    assert_eq!(hold["hold"]["queue_position"], 1);

    // Bob cannot jump the queue
    let response = app
        .clone()
        .oneshot(post_json(
            "/loans",
            json!({ "borrower_id": bob, "barcode": "BC-2001" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Alice can
    let response = app
        .clone()
        .oneshot(post_json(
            "/loans",
            json!({ "borrower_id": alice, "barcode": "BC-2001" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_pickup_request_flow_via_api() {
    let (app, db) = setup_test_app().await;
    let alice = create_test_user(&db, "alice", "member").await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/books",
            json!({ "isbn13": "9780261102385", "title": "The Fellowship of the Ring" }),
        ))
        .await
        .unwrap();
    let book_id = read_json(response).await["book"]["id"].as_i64().unwrap();

    app.clone()
        .oneshot(post_json(
            "/copies",
            json!({ "book_id": book_id, "barcode": "BC-3001" }),
        ))
        .await
        .unwrap();

    // Place a one-item request
    let response = app
        .clone()
        .oneshot(post_json(
            "/requests",
            json!({
                "requester_id": alice,
                "items": [{ "book_id": book_id }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    let request_id = body["request"]["id"].as_i64().unwrap();
    let item_id = body["request"]["items"][0]["id"].as_i64().unwrap();
    assert_eq!(body["request"]["status"], "PENDING");

    // Confirming before assignment fails, all-or-nothing
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/requests/{}/confirm", request_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Staff assigns the scanned copy, marks ready, confirms
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/requests/{}/items/{}/assign", request_id, item_id),
            json!({ "barcode": "BC-3001" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/requests/{}/ready", request_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/requests/{}/confirm", request_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["loans"].as_array().unwrap().len(), 1);

    // The request left the staff queue
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/requests")
                .method("GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["requests"].as_array().unwrap().len(), 0);
}
