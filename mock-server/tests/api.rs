use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::app;
use serde_json::{json, Value};
use tower::ServiceExt;

const API_KEY: &str = "test-api-key";

async fn body_json(response: axum::response::Response) -> Value {
    let bytes: bytes::Bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn form_request(uri: &str, api_key: &str, operation: &str, query: Option<Value>) -> Request<String> {
    let body = match query {
        Some(query) => url::form_urlencoded::Serializer::new(String::new())
            .append_pair(&format!("sf_{operation}"), &json!({ "query": query }).to_string())
            .finish(),
        None => String::new(),
    };
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::AUTHORIZATION, api_key)
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body)
        .unwrap()
}

fn order_request(operation: &str, query: Option<Value>) -> Request<String> {
    form_request(
        &format!("/api/1.2/{operation}/true/json/json/1234"),
        API_KEY,
        operation,
        query,
    )
}

fn user_request(operation: &str, email: &str) -> Request<String> {
    form_request(
        &format!("/api/1.2/{operation}/true/json/json"),
        API_KEY,
        operation,
        Some(json!({"user": {"email": email, "eshop_name": "Example Store"}})),
    )
}

fn price_query() -> Value {
    json!({
        "order": {
            "language": "FI",
            "monetary": {"currency": "EUR"},
            "products": [{"amount": 1.0, "code": "P1", "name": "P1", "weight": {"amount": 1.0, "unit": "kg"}}]
        },
        "customer": {"postal_code": "30100", "country": "FI"}
    })
}

// --- authorization ---

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let resp = app(API_KEY)
        .oneshot(form_request(
            "/api/1.2/get_price/true/json/json/1234",
            "wrong",
            "get_price",
            Some(price_query()),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["Error"]["Message"], "Invalid API key");
}

// --- order operations ---

#[tokio::test]
async fn get_price_wraps_response() {
    let resp = app(API_KEY)
        .oneshot(order_request("get_price", Some(price_query())))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body, json!({"response": {"min_price": "5.90", "max_price": "13.50"}}));
}

#[tokio::test]
async fn get_price_without_products_returns_400() {
    let resp = app(API_KEY)
        .oneshot(order_request("get_price", Some(json!({"order": {"products": []}}))))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["Error"]["Message"], "No product lines found");
}

#[tokio::test]
async fn malformed_form_field_returns_400() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/1.2/get_price/true/json/json/1234")
        .header(http::header::AUTHORIZATION, API_KEY)
        .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body("sf_get_price=%7Bnot-json".to_string())
        .unwrap();
    let resp = app(API_KEY).oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_operation_returns_404() {
    let resp = app(API_KEY)
        .oneshot(order_request("get_weather", None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pickups_answer_with_a_list() {
    let query = json!({
        "order": {"carriercode": "02000201", "language": "FI", "return_count": 2},
        "customer": {"postal_code": "30100", "country": "FI"}
    });
    let resp = app(API_KEY)
        .oneshot(order_request("get_pickups", Some(query)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["response"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn wrong_order_status_returns_400() {
    let query = json!({"order": {"status": "lost", "final_orderid": "1234"}});
    let resp = app(API_KEY)
        .oneshot(order_request("set_order_status", Some(query)))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn package_cards_need_selected_delivery() {
    let resp = app(API_KEY)
        .oneshot(order_request(
            "create_new_package_cards",
            Some(json!({"order": {"return_cards": 1}})),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- full order lifecycle ---

#[tokio::test]
async fn order_lifecycle() {
    use tower::Service;

    let mut app = app(API_KEY).into_service();

    // order id is unused
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "/api/1.2/test_order_id/true/rest/json/1234",
            API_KEY,
            "test_order_id",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["response"]["Code"], 0);

    // select delivery
    let selected = json!({"order": {"selected_option": {
        "carriercode": "02000201", "calculated_price": 5.55, "customer_price": 6.9, "return_prices": 0
    }}});
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(order_request("selected_delivery", Some(selected)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // create two parcels
    let cards = json!({
        "order": {
            "return_cards": 1,
            "sendmail": 0,
            "send_edi": 1,
            "parcels": [{"weight": {"amount": 0.1, "unit": "kg"}}, {"code": "P2"}]
        },
        "customer": {"postal_code": "20100", "country": "FI"}
    });
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(order_request("create_new_package_cards", Some(cards)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let parcels = body["response"]["parcels"].as_array().unwrap().clone();
    assert_eq!(parcels.len(), 2);
    assert_eq!(parcels[1]["code"], "P2");
    let first_id = parcels[0]["id"].as_str().unwrap().to_string();

    // order id is now in use
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            "/api/1.2/test_order_id/true/rest/json/1234",
            API_KEY,
            "test_order_id",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["response"]["Code"], 1);

    // edit the first parcel
    let edit = json!({"order": {"parcels": [{"id": first_id, "contents": "Clothing"}], "return_parcels": 1}});
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(order_request("edit_parcels", Some(edit)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["response"]["parcels"][0]["contents"], "Clothing");

    // delete by parcel code
    let delete = json!({"order": {"parcels": [{"parcel_code": "P2"}], "return_parcels": 1}});
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(order_request("delete_parcels", Some(delete)))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["response"]["deleted"], 1);

    // one parcel left
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(order_request("get_parcels", None))
        .await
        .unwrap();
    let body = body_json(resp).await;
    let left = body["response"]["parcels"].as_array().unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0]["id"], first_id.as_str());
}

// --- users ---

#[tokio::test]
async fn user_lifecycle() {
    use tower::Service;

    let mut app = app(API_KEY).into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(user_request("create_user", "shop@example.com"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["response"]["user"]["locale"], "fi");

    // second create conflicts
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(user_request("create_user", "shop@example.com"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(user_request("get_user", "shop@example.com"))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["response"]["user"]["eshop_name"], "Example Store");

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(user_request("delete_user", "shop@example.com"))
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["response"]["Message"], "User detached");

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(user_request("get_user", "shop@example.com"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
