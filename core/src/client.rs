//! Order-scoped Shipfunk operations.
//!
//! # Design
//! `ShipfunkClient` holds its credentials, language and currency and never
//! changes after construction. Each operation is split into a `build_*`
//! method that validates the parameters and produces an `HttpRequest`, and a
//! calling method that runs the request through the client's `Transport` and
//! unwraps the reply. Validation happens in `build_*`, so a rejected call
//! never reaches the network.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::{ClientConfig, Credentials};
use crate::envelope::{exchange, Endpoint, RequestType};
use crate::error::ApiError;
use crate::http::HttpRequest;
use crate::requests::{
    require, CardDirection, DeliveryQuery, OrderStatus, PackageCardQuery, PackageCardRequest,
    Parcel, ParcelDeletion, ParcelRef, PickupQuery, SelectedOption, TrackingEventsQuery,
};
use crate::transport::{Transport, UreqTransport};
use crate::types::{Cart, Currency, Customer, Language, PriceRange, Product, StatusMessage};

const CARD_FORMATS: [&str; 3] = ["pdf", "zpl", "html"];
const RESERVED_ORDER_KEYS: [&str; 3] = ["language", "monetary", "products"];

fn as_flag(value: bool) -> u8 {
    u8::from(value)
}

#[derive(Serialize)]
struct OrderOnly<O> {
    order: O,
}

#[derive(Serialize)]
struct OrderWithCustomer<O> {
    order: O,
    customer: Customer,
}

#[derive(Serialize)]
struct Monetary<'a> {
    currency: &'a Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

#[derive(Serialize)]
struct BasketOrder<'a> {
    language: &'a Language,
    monetary: Monetary<'a>,
    products: &'a [Product],
    #[serde(flatten)]
    extra: &'a Map<String, Value>,
}

#[derive(Serialize)]
struct PickupOrder<'a> {
    carriercode: &'a str,
    language: &'a Language,
    return_count: u32,
}

#[derive(Serialize)]
struct SelectedDelivery<'a> {
    selected_option: &'a SelectedOption,
}

#[derive(Serialize)]
struct StatusOrder<'a> {
    status: OrderStatus,
    final_orderid: &'a str,
}

#[derive(Serialize)]
struct ReturnCards {
    return_cards: u8,
}

#[derive(Serialize)]
struct TrackingCodeOrder<'a> {
    code_amount: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    carriercode: Option<&'a str>,
}

#[derive(Serialize)]
struct CardSelector {
    card_direction: CardDirection,
}

#[derive(Serialize)]
struct PackageCardLookup<'a> {
    package_card: CardSelector,
    #[serde(skip_serializing_if = "Option::is_none")]
    sendmail: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tracking_code: Option<&'a str>,
}

#[derive(Serialize)]
struct TrackingEventOrder<'a> {
    tracking_code: &'a str,
    language: &'a Language,
}

#[derive(Serialize)]
struct Carrier<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    transport_company: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    carriercode: Option<&'a str>,
}

#[derive(Serialize)]
struct TrackingEvents<'a> {
    order: TrackingEventOrder<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    carrier: Option<Carrier<'a>>,
}

#[derive(Serialize)]
struct ParcelEdit<'a> {
    parcels: &'a [Parcel],
    #[serde(skip_serializing_if = "Option::is_none")]
    return_parcels: Option<u8>,
}

#[derive(Serialize)]
struct ParcelRemoval<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    parcels: Option<&'a [ParcelRef]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_parcels: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remove_all_parcels: Option<u8>,
}

/// Client for the order-scoped part of the Shipfunk API.
///
/// Every request carries the order id in its URL. The client is immutable, so
/// a shared reference can be used from several threads at once.
#[derive(Debug, Clone)]
pub struct ShipfunkClient<T = UreqTransport> {
    endpoint: Endpoint,
    order_id: String,
    language: Language,
    currency: Currency,
    transport: T,
}

impl ShipfunkClient<UreqTransport> {
    /// Client talking to `config.endpoint` over a blocking ureq agent.
    pub fn new(credentials: Credentials, config: ClientConfig) -> Result<Self, ApiError> {
        let transport = config.ureq_transport()?;
        Self::with_transport(credentials, config, transport)
    }
}

impl<T: Transport> ShipfunkClient<T> {
    pub fn with_transport(
        credentials: Credentials,
        config: ClientConfig,
        transport: T,
    ) -> Result<Self, ApiError> {
        require(&credentials.order_id, "order id")?;
        let endpoint = Endpoint::new(&config.endpoint, &credentials.api_key)?;
        Ok(Self {
            endpoint,
            order_id: credentials.order_id,
            language: config.language,
            currency: config.currency,
            transport,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.base()
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn order_request<Q: Serialize>(&self, operation: &str, query: &Q) -> Result<HttpRequest, ApiError> {
        self.endpoint
            .post(operation, RequestType::Json, Some(self.order_id.as_str()), query)
    }

    fn call<R: DeserializeOwned>(&self, request: HttpRequest) -> Result<R, ApiError> {
        exchange(&self.transport, request)
    }

    fn basket_order<'a>(
        &'a self,
        products: &'a [Product],
        value: Option<f64>,
        extra: &'a Map<String, Value>,
    ) -> Result<BasketOrder<'a>, ApiError> {
        if products.is_empty() {
            debug!(order_id = %self.order_id, "no product lines");
            return Err(ApiError::validation("No product lines found"));
        }
        Ok(BasketOrder {
            language: &self.language,
            monetary: Monetary {
                currency: &self.currency,
                value,
            },
            products,
            extra,
        })
    }

    // ------------------------------------------------------------------
    // Prices and delivery options
    // ------------------------------------------------------------------

    /// Minimum and maximum delivery price for the cart's products, sent with
    /// only the customer's country and postal code.
    pub fn build_get_price(&self, cart: &Cart) -> Result<HttpRequest, ApiError> {
        let no_extra = Map::new();
        let query = OrderWithCustomer {
            order: self.basket_order(&cart.products, None, &no_extra)?,
            customer: cart.customer.location(),
        };
        self.order_request("get_price", &query)
    }

    pub fn get_price(&self, cart: &Cart) -> Result<PriceRange, ApiError> {
        self.call(self.build_get_price(cart)?)
    }

    /// Delivery options for the cart and the full customer address.
    pub fn build_get_delivery_options(
        &self,
        cart: &Cart,
        query: &DeliveryQuery,
    ) -> Result<HttpRequest, ApiError> {
        if let Some(key) = RESERVED_ORDER_KEYS
            .iter()
            .find(|key| query.extra.contains_key(**key))
        {
            return Err(ApiError::validation(format!(
                "{key} is set by the client and can not be passed as an extra order key"
            )));
        }
        let payload = OrderWithCustomer {
            order: self.basket_order(&cart.products, query.order_value, &query.extra)?,
            customer: cart.customer.normalized(),
        };
        self.order_request("get_delivery_options", &payload)
    }

    pub fn get_delivery_options(&self, cart: &Cart, query: &DeliveryQuery) -> Result<Value, ApiError> {
        self.call(self.build_get_delivery_options(cart, query)?)
    }

    // ------------------------------------------------------------------
    // Pickup points and selected delivery
    // ------------------------------------------------------------------

    pub fn build_search_pickup_points(&self, query: &PickupQuery) -> Result<HttpRequest, ApiError> {
        query.validate()?;
        let payload = OrderWithCustomer {
            order: PickupOrder {
                carriercode: query.carrier_code.trim(),
                language: &self.language,
                return_count: query.return_count,
            },
            customer: Customer::at(query.postal_code.as_str(), query.country.as_str()).location(),
        };
        self.order_request("get_pickups", &payload)
    }

    /// Pickup points of one carrier option near a postal code.
    pub fn search_pickup_points(&self, query: &PickupQuery) -> Result<Value, ApiError> {
        self.call(self.build_search_pickup_points(query)?)
    }

    pub fn build_send_selected_delivery(&self, option: &SelectedOption) -> Result<HttpRequest, ApiError> {
        option.validate()?;
        let payload = OrderOnly {
            order: SelectedDelivery {
                selected_option: option,
            },
        };
        self.order_request("selected_delivery", &payload)
    }

    /// Tell Shipfunk which delivery the customer chose; needed before package
    /// cards can be created.
    pub fn send_selected_delivery(&self, option: &SelectedOption) -> Result<Value, ApiError> {
        self.call(self.build_send_selected_delivery(option)?)
    }

    // ------------------------------------------------------------------
    // Order state
    // ------------------------------------------------------------------

    /// `final_order_id` replaces a temporary order id used before payment;
    /// `None` sends the client's own order id.
    pub fn build_set_order_status(
        &self,
        status: OrderStatus,
        final_order_id: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        let final_orderid = match final_order_id {
            Some(id) => {
                require(id, "final_orderid")?;
                id
            }
            None => self.order_id.as_str(),
        };
        let payload = OrderOnly {
            order: StatusOrder {
                status,
                final_orderid,
            },
        };
        self.order_request("set_order_status", &payload)
    }

    pub fn set_order_status(
        &self,
        status: OrderStatus,
        final_order_id: Option<&str>,
    ) -> Result<StatusMessage, ApiError> {
        self.call(self.build_set_order_status(status, final_order_id)?)
    }

    /// Only the fields that are set get updated on Shipfunk's side.
    pub fn build_set_customer_details(
        &self,
        customer: &Customer,
        return_cards: bool,
    ) -> Result<HttpRequest, ApiError> {
        if customer.is_empty() {
            return Err(ApiError::validation("no customer details to update"));
        }
        let payload = OrderWithCustomer {
            order: ReturnCards {
                return_cards: as_flag(return_cards),
            },
            customer: customer.normalized(),
        };
        self.order_request("set_customer_details", &payload)
    }

    pub fn set_customer_details(&self, customer: &Customer, return_cards: bool) -> Result<Value, ApiError> {
        self.call(self.build_set_customer_details(customer, return_cards)?)
    }

    // ------------------------------------------------------------------
    // Package cards and tracking codes
    // ------------------------------------------------------------------

    pub fn build_create_package(&self, request: &PackageCardRequest) -> Result<HttpRequest, ApiError> {
        if let Some(format) = request
            .order
            .package_card
            .as_ref()
            .and_then(|card| card.format.as_deref())
        {
            if !CARD_FORMATS.contains(&format.to_ascii_lowercase().as_str()) {
                return Err(ApiError::validation(format!(
                    "unknown package card format: {format}"
                )));
            }
        }
        let payload = OrderWithCustomer {
            order: &request.order,
            customer: request.customer.normalized(),
        };
        self.order_request("create_new_package_cards", &payload)
    }

    /// Create package cards and tracking codes for the order, using the
    /// delivery previously sent with `send_selected_delivery`.
    pub fn create_package(&self, request: &PackageCardRequest) -> Result<Value, ApiError> {
        self.call(self.build_create_package(request)?)
    }

    pub fn build_create_new_tracking_codes(
        &self,
        code_amount: u32,
        carrier_code: Option<&str>,
    ) -> Result<HttpRequest, ApiError> {
        if code_amount == 0 {
            return Err(ApiError::validation("code_amount has to be bigger than 0"));
        }
        let payload = OrderOnly {
            order: TrackingCodeOrder {
                code_amount,
                carriercode: carrier_code.map(str::trim).filter(|c| !c.is_empty()),
            },
        };
        self.order_request("create_new_tracking_codes", &payload)
    }

    /// Reserve tracking codes ahead of package-card creation. Shipfunk creates
    /// codes on its own, so this is rarely needed.
    pub fn create_new_tracking_codes(
        &self,
        code_amount: u32,
        carrier_code: Option<&str>,
    ) -> Result<Value, ApiError> {
        self.call(self.build_create_new_tracking_codes(code_amount, carrier_code)?)
    }

    pub fn build_get_package_cards(&self, query: &PackageCardQuery) -> Result<HttpRequest, ApiError> {
        if let Some(code) = &query.tracking_code {
            require(code, "tracking_code")?;
        }
        let payload = OrderOnly {
            order: PackageCardLookup {
                package_card: CardSelector {
                    card_direction: query.direction,
                },
                sendmail: query.sendmail.map(as_flag),
                tracking_code: query.tracking_code.as_deref(),
            },
        };
        self.order_request("get_package_cards", &payload)
    }

    /// Already created package cards; nothing is created.
    pub fn get_package_cards(&self, query: &PackageCardQuery) -> Result<Value, ApiError> {
        self.call(self.build_get_package_cards(query)?)
    }

    pub fn build_get_tracking_codes(&self, direction: CardDirection) -> Result<HttpRequest, ApiError> {
        let payload = OrderOnly {
            order: PackageCardLookup {
                package_card: CardSelector {
                    card_direction: direction,
                },
                sendmail: None,
                tracking_code: None,
            },
        };
        self.order_request("get_tracking_codes", &payload)
    }

    pub fn get_tracking_codes(&self, direction: CardDirection) -> Result<Value, ApiError> {
        self.call(self.build_get_tracking_codes(direction)?)
    }

    pub fn build_get_tracking_events(&self, query: &TrackingEventsQuery) -> Result<HttpRequest, ApiError> {
        require(&query.tracking_code, "tracking_code")?;
        let carrier = Carrier {
            transport_company: query.transport_company.as_deref(),
            carriercode: query.carrier_code.as_deref(),
        };
        let has_carrier = carrier.transport_company.is_some() || carrier.carriercode.is_some();
        let payload = TrackingEvents {
            order: TrackingEventOrder {
                tracking_code: query.tracking_code.trim(),
                language: &self.language,
            },
            carrier: has_carrier.then_some(carrier),
        };
        self.order_request("get_tracking_events", &payload)
    }

    pub fn get_tracking_events(&self, query: &TrackingEventsQuery) -> Result<Value, ApiError> {
        self.call(self.build_get_tracking_events(query)?)
    }

    // ------------------------------------------------------------------
    // Parcels
    // ------------------------------------------------------------------

    pub fn build_get_parcels(&self) -> Result<HttpRequest, ApiError> {
        self.endpoint
            .post_empty("get_parcels", RequestType::Json, Some(self.order_id.as_str()))
    }

    pub fn get_parcels(&self) -> Result<Value, ApiError> {
        self.call(self.build_get_parcels()?)
    }

    /// To empty a field on Shipfunk's side send `"NULL"` for strings and `-1`
    /// for numbers through `Parcel::extra`.
    pub fn build_edit_parcels(
        &self,
        parcels: &[Parcel],
        return_parcels: Option<bool>,
    ) -> Result<HttpRequest, ApiError> {
        if parcels.is_empty() {
            return Err(ApiError::validation("no parcels to edit"));
        }
        if parcels
            .iter()
            .any(|p| p.id.as_deref().map_or(true, |id| id.trim().is_empty()))
        {
            return Err(ApiError::validation("every edited parcel needs its Shipfunk id"));
        }
        let payload = OrderOnly {
            order: ParcelEdit {
                parcels,
                return_parcels: return_parcels.map(as_flag),
            },
        };
        self.order_request("edit_parcels", &payload)
    }

    pub fn edit_parcels(&self, parcels: &[Parcel], return_parcels: Option<bool>) -> Result<Value, ApiError> {
        self.call(self.build_edit_parcels(parcels, return_parcels)?)
    }

    pub fn build_delete_parcels(
        &self,
        deletion: &ParcelDeletion,
        return_parcels: Option<bool>,
    ) -> Result<HttpRequest, ApiError> {
        deletion.validate()?;
        let order = match deletion {
            ParcelDeletion::All => ParcelRemoval {
                parcels: None,
                return_parcels: return_parcels.map(as_flag),
                remove_all_parcels: Some(1),
            },
            ParcelDeletion::Parcels(parcels) => ParcelRemoval {
                parcels: Some(parcels),
                return_parcels: return_parcels.map(as_flag),
                remove_all_parcels: None,
            },
        };
        self.order_request("delete_parcels", &OrderOnly { order })
    }

    /// Removing a parcel also removes its package card and tracking code.
    pub fn delete_parcels(
        &self,
        deletion: &ParcelDeletion,
        return_parcels: Option<bool>,
    ) -> Result<Value, ApiError> {
        self.call(self.build_delete_parcels(deletion, return_parcels)?)
    }

    // ------------------------------------------------------------------
    // Order id
    // ------------------------------------------------------------------

    pub fn build_test_order_id(&self) -> Result<HttpRequest, ApiError> {
        self.endpoint
            .post_empty("test_order_id", RequestType::Rest, Some(self.order_id.as_str()))
    }

    /// Whether the order id is already used by another of the merchant's
    /// orders.
    pub fn test_order_id(&self) -> Result<StatusMessage, ApiError> {
        self.call(self.build_test_order_id()?)
    }
}
