use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{get, setup};

#[tokio::test]
async fn scope_returns_matching_rows() {
    let t = setup();
    let (status, body) = get(&t.app, "/players/returnsOne").await;
    assert_eq!(status, StatusCode::OK);
    let players = body.as_array().unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0]["id"], json!(1));
}

#[tokio::test]
async fn scope_with_no_matches_is_not_found() {
    let t = setup();
    let (status, _) = get(&t.app, "/players/returnsNone").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn scope_returning_everything() {
    let t = setup();
    let (status, body) = get(&t.app, "/players/returnsAll").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn undeclared_scope_is_bad_request_not_404_or_500() {
    let t = setup();
    let (status, body) = get(&t.app, "/players/invalid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("bad_request"));
}

#[tokio::test]
async fn scope_composes_with_filters_and_pagination() {
    let t = setup();
    let (status, body) = get(&t.app, "/players/returnsAll?name=Syrah&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    let players = body.as_array().unwrap();
    assert_eq!(players.len(), 1);
    assert_eq!(players[0]["id"], json!(2));
}
