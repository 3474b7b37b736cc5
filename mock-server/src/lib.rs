use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{rejection::FormRejection, Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything Shipfunk remembers about one order.
#[derive(Clone, Debug, Default)]
pub struct OrderState {
    pub selected_option: Option<Value>,
    pub status: Option<String>,
    pub customer: Option<Value>,
    pub parcels: Vec<Value>,
}

pub struct AppState {
    api_key: String,
    orders: RwLock<HashMap<String, OrderState>>,
    users: RwLock<HashMap<String, Value>>,
}

pub type SharedState = Arc<AppState>;

type Reply = Result<Value, Failure>;

/// An error reply in Shipfunk's `{"Error": {...}}` shape.
#[derive(Debug)]
struct Failure {
    status: StatusCode,
    code: u32,
    message: String,
}

impl Failure {
    fn new(status: StatusCode, code: u32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, 2, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, 3, message)
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let body = json!({"Error": {"Code": self.code, "Message": self.message}});
        (self.status, Json(body)).into_response()
    }
}

fn ok_message(message: &str) -> Value {
    json!({"Code": 1, "Message": message})
}

pub fn app(api_key: impl Into<String>) -> Router {
    let state = Arc::new(AppState {
        api_key: api_key.into(),
        orders: RwLock::new(HashMap::new()),
        users: RwLock::new(HashMap::new()),
    });
    Router::new()
        .route(
            "/api/1.2/{operation}/true/{request_type}/{return_type}",
            post(dispatch),
        )
        .route(
            "/api/1.2/{operation}/true/{request_type}/{return_type}/{order_id}",
            post(dispatch),
        )
        .with_state(state)
}

pub async fn run(listener: TcpListener, api_key: impl Into<String>) -> Result<(), std::io::Error> {
    axum::serve(listener, app(api_key)).await
}

async fn dispatch(
    State(state): State<SharedState>,
    Path(params): Path<HashMap<String, String>>,
    headers: HeaderMap,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    let operation = params.get("operation").map(String::as_str).unwrap_or_default();

    let authorized = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|key| key == state.api_key);
    if !authorized {
        warn!(operation, "rejected request with a wrong API key");
        return Failure::new(StatusCode::UNAUTHORIZED, 1, "Invalid API key").into_response();
    }

    let fields = match form {
        Ok(Form(fields)) => fields,
        Err(rejection) => return Failure::bad_request(rejection.body_text()).into_response(),
    };
    let query = match parse_query(operation, &fields) {
        Ok(query) => query,
        Err(failure) => return failure.into_response(),
    };
    let order_id = params.get("order_id").map(String::as_str);
    debug!(operation, order_id, "handling request");

    let reply = match (operation, order_id) {
        ("create_user", None) => create_user(&state, &query).await,
        ("get_user", None) => get_user(&state, &query).await,
        ("edit_user", None) => edit_user(&state, &query).await,
        ("delete_user", None) => delete_user(&state, &query).await,
        ("create_invitation", None) => create_invitation(&state, &query).await,
        (op, Some(order_id)) => order_operation(&state, op, order_id, &query).await,
        (op, None) => Err(Failure::not_found(format!("unknown operation {op}"))),
    };

    match reply {
        Ok(response) => {
            info!(operation, "ok");
            Json(json!({ "response": response })).into_response()
        }
        Err(failure) => {
            info!(operation, status = %failure.status, message = %failure.message, "failed");
            failure.into_response()
        }
    }
}

/// The `query` object of the `sf_<operation>` field; `Null` when the request
/// has no body.
fn parse_query(operation: &str, fields: &HashMap<String, String>) -> Result<Value, Failure> {
    let Some(raw) = fields.get(&format!("sf_{operation}")) else {
        return Ok(Value::Null);
    };
    let mut content: Value = serde_json::from_str(raw)
        .map_err(|e| Failure::bad_request(format!("sf_{operation} is not valid JSON: {e}")))?;
    match content.get_mut("query").map(Value::take) {
        Some(query) => Ok(query),
        None => Err(Failure::bad_request(format!("sf_{operation} has no query"))),
    }
}

fn require_query(query: &Value) -> Result<(), Failure> {
    if query.is_null() {
        Err(Failure::bad_request("request has no content"))
    } else {
        Ok(())
    }
}

async fn order_operation(state: &AppState, operation: &str, order_id: &str, query: &Value) -> Reply {
    let order = &query["order"];
    match operation {
        "get_price" => get_price(order),
        "get_delivery_options" => get_delivery_options(order),
        "get_pickups" => get_pickups(order, &query["customer"]),
        "selected_delivery" => {
            require_query(query)?;
            let option = order
                .get("selected_option")
                .filter(|o| o["carriercode"].is_string())
                .ok_or_else(|| Failure::bad_request("selected_option.carriercode is required"))?;
            state.orders.write().await.entry(order_id.to_string()).or_default().selected_option =
                Some(option.clone());
            Ok(ok_message("Delivery option saved"))
        }
        "set_order_status" => {
            let status = order["status"].as_str().unwrap_or_default();
            if status != "placed" && status != "cancelled" {
                return Err(Failure::bad_request(format!("wrong status: {status}")));
            }
            let mut orders = state.orders.write().await;
            let mut current = orders.remove(order_id).unwrap_or_default();
            current.status = Some(status.to_string());
            let final_id = order["final_orderid"].as_str().unwrap_or(order_id);
            orders.insert(final_id.to_string(), current);
            Ok(ok_message("Order status updated"))
        }
        "set_customer_details" => {
            let customer = query
                .get("customer")
                .filter(|c| c.as_object().is_some_and(|c| !c.is_empty()))
                .ok_or_else(|| Failure::bad_request("customer is required"))?;
            let mut orders = state.orders.write().await;
            let current = orders.entry(order_id.to_string()).or_default();
            current.customer = Some(customer.clone());
            if order["return_cards"] == 1 {
                Ok(json!({ "customer": customer }))
            } else {
                Ok(ok_message("Customer details updated"))
            }
        }
        "create_new_package_cards" => create_package_cards(state, order_id, query).await,
        "create_new_tracking_codes" => {
            let amount = order["code_amount"].as_u64().unwrap_or(0);
            if amount == 0 {
                return Err(Failure::bad_request("code_amount has to be bigger than 0"));
            }
            let codes: Vec<Value> = (0..amount).map(|_| json!(tracking_code())).collect();
            Ok(json!({ "tracking_codes": codes }))
        }
        "get_package_cards" | "get_tracking_codes" => {
            let direction = order["package_card"]["card_direction"].as_str().unwrap_or("both");
            if !["send", "return", "both"].contains(&direction) {
                return Err(Failure::bad_request(format!("wrong card_direction: {direction}")));
            }
            let orders = state.orders.read().await;
            let parcels = orders.get(order_id).map(|o| o.parcels.as_slice()).unwrap_or_default();
            let wanted = order["tracking_code"].as_str();
            let cards: Vec<Value> = parcels
                .iter()
                .filter(|p| wanted.map_or(true, |code| p["tracking_code"] == code))
                .map(|p| {
                    json!({
                        "parcel_code": p["code"],
                        "tracking_code": p["tracking_code"],
                        "direction": direction,
                    })
                })
                .collect();
            if cards.is_empty() {
                return Err(Failure::not_found("no package cards for the order"));
            }
            Ok(json!({ "parcels": cards }))
        }
        "get_tracking_events" => {
            let code = order["tracking_code"].as_str().unwrap_or_default();
            if code.is_empty() {
                return Err(Failure::bad_request("tracking_code is required"));
            }
            Ok(json!({
                "tracking_code": code,
                "events": [
                    {"code": "11", "description": "Shipment registered", "language": order["language"]}
                ]
            }))
        }
        "get_parcels" => {
            let orders = state.orders.read().await;
            let parcels = orders.get(order_id).map(|o| o.parcels.clone()).unwrap_or_default();
            Ok(json!({ "parcels": parcels }))
        }
        "edit_parcels" => edit_parcels(state, order_id, order).await,
        "delete_parcels" => delete_parcels(state, order_id, order).await,
        "test_order_id" => {
            let orders = state.orders.read().await;
            if orders.contains_key(order_id) {
                Ok(json!({"Code": 1, "Message": "Order id is already in use"}))
            } else {
                Ok(json!({"Code": 0, "Message": "Order id is not in use"}))
            }
        }
        other => Err(Failure::not_found(format!("unknown operation {other}"))),
    }
}

fn products(order: &Value) -> Result<&Vec<Value>, Failure> {
    order["products"]
        .as_array()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Failure::bad_request("No product lines found"))
}

/// Total weight in kilograms of the order's products.
fn total_weight(products: &[Value]) -> f64 {
    products
        .iter()
        .map(|p| p["amount"].as_f64().unwrap_or(1.0) * p["weight"]["amount"].as_f64().unwrap_or(0.0))
        .sum()
}

fn get_price(order: &Value) -> Reply {
    let weight = total_weight(products(order)?);
    let min = 4.9 + weight;
    Ok(json!({
        "min_price": format!("{min:.2}"),
        "max_price": format!("{:.2}", min + 7.6),
    }))
}

fn get_delivery_options(order: &Value) -> Reply {
    let weight = total_weight(products(order)?);
    let options: Vec<Value> = [("02000201", "Posti", 4.9), ("90080", "Matkahuolto", 6.5)]
        .iter()
        .map(|(code, company, base)| {
            json!({
                "carriercode": code,
                "transport_company": company,
                "calculated_price": base + weight,
                "customer_price": base + weight,
                "currency": order["monetary"]["currency"],
            })
        })
        .collect();
    Ok(json!({ "options": options }))
}

fn get_pickups(order: &Value, customer: &Value) -> Reply {
    let carrier = order["carriercode"].as_str().unwrap_or_default();
    let postal_code = customer["postal_code"].as_str().unwrap_or_default();
    if carrier.is_empty() || postal_code.is_empty() {
        return Err(Failure::bad_request("carriercode and postal_code are required"));
    }
    let count = order["return_count"].as_u64().unwrap_or(20).min(3);
    let pickups: Vec<Value> = (1..=count)
        .map(|n| {
            json!({
                "pickup_id": format!("{carrier}{n:03}"),
                "pickup_name": format!("Pickup point {n}"),
                "pickup_postal": postal_code,
                "pickup_country": customer["country"],
            })
        })
        .collect();
    Ok(json!(pickups))
}

fn tracking_code() -> String {
    let digits: String = Uuid::new_v4()
        .as_u128()
        .to_string()
        .chars()
        .take(17)
        .collect();
    format!("JJFI{digits}")
}

async fn create_package_cards(state: &AppState, order_id: &str, query: &Value) -> Reply {
    let order = &query["order"];
    let mut orders = state.orders.write().await;
    let current = orders.entry(order_id.to_string()).or_default();
    if current.selected_option.is_none() {
        return Err(Failure::bad_request("no delivery option selected for the order"));
    }
    let requested = order["parcels"].as_array().cloned().unwrap_or_default();
    let requested = if requested.is_empty() {
        vec![json!({})]
    } else {
        requested
    };
    let created: Vec<Value> = requested
        .into_iter()
        .map(|mut parcel| {
            let id = Uuid::new_v4();
            if let Some(fields) = parcel.as_object_mut() {
                fields.insert("id".to_string(), json!(id.to_string()));
                fields
                    .entry("code")
                    .or_insert_with(|| json!(format!("P-{}", &id.simple().to_string()[..8])));
                fields.insert("tracking_code".to_string(), json!(tracking_code()));
            }
            parcel
        })
        .collect();
    current.parcels.extend(created.iter().cloned());
    if order["return_cards"] == 1 {
        Ok(json!({ "parcels": created }))
    } else {
        Ok(ok_message("Package cards created"))
    }
}

fn parcel_matches(parcel: &Value, reference: &Value) -> bool {
    [("id", "id"), ("parcel_code", "code"), ("tracking_code", "tracking_code")]
        .iter()
        .any(|(key, field)| {
            reference[*key]
                .as_str()
                .is_some_and(|wanted| parcel[*field] == wanted)
        })
}

async fn edit_parcels(state: &AppState, order_id: &str, order: &Value) -> Reply {
    let edits = order["parcels"]
        .as_array()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Failure::bad_request("parcels are required"))?;
    let mut orders = state.orders.write().await;
    let parcels = &mut orders.entry(order_id.to_string()).or_default().parcels;
    for edit in edits {
        let id = edit["id"].as_str().unwrap_or_default();
        let parcel = parcels
            .iter_mut()
            .find(|p| p["id"] == id)
            .ok_or_else(|| Failure::not_found(format!("parcel {id} not found")))?;
        if let (Some(target), Some(changes)) = (parcel.as_object_mut(), edit.as_object()) {
            merge(target, changes);
        }
    }
    if order["return_parcels"] == 1 {
        Ok(json!({ "parcels": parcels }))
    } else {
        Ok(ok_message("Parcels updated"))
    }
}

fn merge(target: &mut Map<String, Value>, changes: &Map<String, Value>) {
    for (key, value) in changes {
        if *value == "NULL" || *value == -1 {
            target.remove(key);
        } else {
            target.insert(key.clone(), value.clone());
        }
    }
}

async fn delete_parcels(state: &AppState, order_id: &str, order: &Value) -> Reply {
    let mut orders = state.orders.write().await;
    let parcels = &mut orders.entry(order_id.to_string()).or_default().parcels;
    let before = parcels.len();
    if order["remove_all_parcels"] == 1 {
        parcels.clear();
    } else {
        let refs = order["parcels"]
            .as_array()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Failure::bad_request("parcels or remove_all_parcels is required"))?;
        parcels.retain(|p| !refs.iter().any(|r| parcel_matches(p, r)));
    }
    let deleted = before - parcels.len();
    if order["return_parcels"] == 1 {
        Ok(json!({ "deleted": deleted, "parcels": parcels }))
    } else {
        Ok(ok_message(&format!("{deleted} parcels deleted")))
    }
}

fn user_email(query: &Value) -> Result<String, Failure> {
    query["user"]["email"]
        .as_str()
        .filter(|e| e.contains('@'))
        .map(str::to_string)
        .ok_or_else(|| Failure::bad_request("user.email is required"))
}

async fn create_user(state: &AppState, query: &Value) -> Reply {
    let email = user_email(query)?;
    let mut users = state.users.write().await;
    if users.contains_key(&email) {
        return Err(Failure::new(StatusCode::CONFLICT, 4, "User already exists"));
    }
    let mut user = query["user"].clone();
    if let Some(fields) = user.as_object_mut() {
        fields
            .entry("locale")
            .or_insert_with(|| json!("fi"));
        fields.insert("apikey".to_string(), json!(Uuid::new_v4().simple().to_string()));
    }
    users.insert(email, user.clone());
    Ok(json!({ "user": user }))
}

async fn get_user(state: &AppState, query: &Value) -> Reply {
    let email = user_email(query)?;
    let users = state.users.read().await;
    users
        .get(&email)
        .map(|user| json!({ "user": user }))
        .ok_or_else(|| Failure::not_found(format!("user {email} not found")))
}

async fn edit_user(state: &AppState, query: &Value) -> Reply {
    let email = user_email(query)?;
    let mut users = state.users.write().await;
    let user = users
        .get_mut(&email)
        .ok_or_else(|| Failure::not_found(format!("user {email} not found")))?;
    if let (Some(target), Some(changes)) = (user.as_object_mut(), query["user"].as_object()) {
        merge(target, changes);
    }
    Ok(json!({ "user": user }))
}

async fn delete_user(state: &AppState, query: &Value) -> Reply {
    let email = user_email(query)?;
    match state.users.write().await.remove(&email) {
        Some(_) => Ok(ok_message("User detached")),
        None => Err(Failure::not_found(format!("user {email} not found"))),
    }
}

async fn create_invitation(state: &AppState, query: &Value) -> Reply {
    let email = user_email(query)?;
    if state.users.read().await.contains_key(&email) {
        return Err(Failure::bad_request("User is already attached"));
    }
    Ok(ok_message("Invitation sent"))
}
