//! Parameter blocks for the order-scoped Shipfunk operations.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::types::{AdditionalService, Customer, Dimensions, Weight};

/// Shipfunk encodes booleans as `1` / `0`.
fn flag<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

fn optional_flag<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => flag(v, serializer),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn require(value: &str, what: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::validation(format!("{what} is required")))
    } else {
        Ok(())
    }
}

/// Which package cards an operation refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CardDirection {
    Send,
    Return,
    #[default]
    Both,
}

impl FromStr for CardDirection {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send" => Ok(CardDirection::Send),
            "return" => Ok(CardDirection::Return),
            "both" => Ok(CardDirection::Both),
            other => Err(ApiError::validation(format!("wrong card_direction: {other}"))),
        }
    }
}

impl fmt::Display for CardDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CardDirection::Send => "send",
            CardDirection::Return => "return",
            CardDirection::Both => "both",
        })
    }
}

/// Final state of an order. `Placed` should be sent once the customer has
/// finished checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Cancelled,
}

impl FromStr for OrderStatus {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ApiError::validation(format!("wrong status: {other}"))),
        }
    }
}

/// Pickup-point search around a postal code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickupQuery {
    pub carrier_code: String,
    pub postal_code: String,
    pub country: String,
    /// Shipfunk returns the 20 nearest points unless told otherwise.
    pub return_count: u32,
}

impl PickupQuery {
    pub const DEFAULT_RETURN_COUNT: u32 = 20;

    pub fn new(
        carrier_code: impl Into<String>,
        postal_code: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            carrier_code: carrier_code.into(),
            postal_code: postal_code.into(),
            country: country.into(),
            return_count: Self::DEFAULT_RETURN_COUNT,
        }
    }

    /// Take postal code and country from a saved customer address.
    pub fn from_customer(carrier_code: impl Into<String>, customer: &Customer) -> Result<Self, ApiError> {
        let location = customer.location();
        let postal_code = location
            .postal_code
            .ok_or_else(|| ApiError::validation("postal_code is required"))?;
        let country = location
            .country
            .ok_or_else(|| ApiError::validation("country is required"))?;
        Ok(Self::new(carrier_code, postal_code, country))
    }

    pub fn with_return_count(mut self, return_count: u32) -> Self {
        self.return_count = return_count;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        require(&self.carrier_code, "carriercode")?;
        require(&self.postal_code, "postal_code")?;
        require(&self.country, "country")?;
        if self.return_count == 0 {
            return Err(ApiError::validation("return_count has to be bigger than 0"));
        }
        Ok(())
    }
}

/// Extra order keys for a delivery-option lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryQuery {
    /// Total value of the order, sent as `monetary.value`.
    pub order_value: Option<f64>,
    /// Passed through into the order block (`discounts`, `additions`,
    /// `get_pickups`, `tags`, `parcels`, ...).
    pub extra: Map<String, Value>,
}

impl DeliveryQuery {
    pub fn with_value(mut self, value: f64) -> Self {
        self.order_value = Some(value);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// The delivery method the customer picked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectedOption {
    #[serde(rename = "carriercode")]
    pub carrier_code: String,
    pub calculated_price: f64,
    pub customer_price: f64,
    #[serde(rename = "pickupid", skip_serializing_if = "Option::is_none")]
    pub pickup_id: Option<String>,
    /// Ask Shipfunk to echo back the calculated and customer price.
    #[serde(serialize_with = "flag")]
    pub return_prices: bool,
}

impl SelectedOption {
    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        require(&self.carrier_code, "carriercode")?;
        if let Some(pickup_id) = &self.pickup_id {
            require(pickup_id, "pickupid")?;
        }
        Ok(())
    }
}

/// Tracking codes pre-assigned to a parcel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackingCodes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send: Option<String>,
    #[serde(rename = "return", skip_serializing_if = "Option::is_none")]
    pub return_code: Option<String>,
}

/// A parcel of an order. Only the fields that are set are sent, so the
/// same type serves creation (weight, product codes) and edits (id plus the
/// changed fields).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parcel {
    /// Shipfunk's own parcel id; identifies the parcel on edit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<Weight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monetary_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(serialize_with = "optional_flag", skip_serializing_if = "Option::is_none")]
    pub fragile: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub product_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_codes: Option<TrackingCodes>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Layout of the printed package card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageCardOptions {
    pub direction: CardDirection,
    /// `pdf`, `zpl` or `html`; Shipfunk defaults to `pdf`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dpi: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(serialize_with = "optional_flag", skip_serializing_if = "Option::is_none")]
    pub reversed: Option<bool>,
}

/// Order block for package-card creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageCardOrder {
    /// Return tracking codes and cards in the reply.
    #[serde(serialize_with = "flag")]
    pub return_cards: bool,
    /// Let Shipfunk email the customer.
    #[serde(serialize_with = "flag")]
    pub sendmail: bool,
    #[serde(serialize_with = "flag")]
    pub send_edi: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_card: Option<PackageCardOptions>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_services: Vec<AdditionalService>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parcels: Vec<Parcel>,
}

impl Default for PackageCardOrder {
    fn default() -> Self {
        Self {
            return_cards: false,
            sendmail: false,
            send_edi: true,
            package_card: None,
            additional_services: Vec::new(),
            parcels: Vec::new(),
        }
    }
}

/// Parameters for creating package cards and tracking codes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageCardRequest {
    pub order: PackageCardOrder,
    pub customer: Customer,
}

/// Lookup of already created package cards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageCardQuery {
    pub direction: CardDirection,
    pub sendmail: Option<bool>,
    /// Restrict the reply to one parcel.
    pub tracking_code: Option<String>,
}

/// Tracking-event lookup for one parcel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackingEventsQuery {
    pub tracking_code: String,
    pub transport_company: Option<String>,
    pub carrier_code: Option<String>,
}

impl TrackingEventsQuery {
    pub fn new(tracking_code: impl Into<String>) -> Self {
        Self {
            tracking_code: tracking_code.into(),
            ..Default::default()
        }
    }
}

/// Reference to a parcel to delete, by any of its identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParcelRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parcel_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_code: Option<String>,
}

impl ParcelRef {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_tracking_code(tracking_code: impl Into<String>) -> Self {
        Self {
            tracking_code: Some(tracking_code.into()),
            ..Default::default()
        }
    }

    fn is_empty(&self) -> bool {
        [&self.id, &self.parcel_code, &self.tracking_code]
            .iter()
            .all(|v| v.as_deref().map_or(true, |s| s.trim().is_empty()))
    }
}

/// Which parcels to delete. Deleting a parcel also drops its package card
/// and tracking code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParcelDeletion {
    All,
    Parcels(Vec<ParcelRef>),
}

impl ParcelDeletion {
    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        match self {
            ParcelDeletion::All => Ok(()),
            ParcelDeletion::Parcels(parcels) if parcels.is_empty() => {
                Err(ApiError::validation("no parcels to delete"))
            }
            ParcelDeletion::Parcels(parcels) => {
                if parcels.iter().any(ParcelRef::is_empty) {
                    Err(ApiError::validation(
                        "parcel needs an id, parcel_code or tracking_code",
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn card_direction_parsing() {
        assert_eq!("send".parse::<CardDirection>().unwrap(), CardDirection::Send);
        assert_eq!("both".parse::<CardDirection>().unwrap(), CardDirection::Both);
        let err = "palautus".parse::<CardDirection>().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(CardDirection::Return.to_string(), "return");
    }

    #[test]
    fn order_status_parsing() {
        assert_eq!("placed".parse::<OrderStatus>().unwrap(), OrderStatus::Placed);
        assert!("test_status".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_value(OrderStatus::Cancelled).unwrap(), "cancelled");
    }

    #[test]
    fn pickup_query_from_customer() {
        let query = PickupQuery::from_customer("02000201", &Customer::at("30100", "fi")).unwrap();
        assert_eq!(query.country, "FI");
        assert_eq!(query.return_count, 20);

        let err = PickupQuery::from_customer("02000201", &Customer::default()).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn pickup_query_validation() {
        assert!(PickupQuery::new("02000201", "30100", "FI").validate().is_ok());
        assert!(PickupQuery::new("", "30100", "FI").validate().is_err());
        assert!(PickupQuery::new("02000201", "30100", "FI")
            .with_return_count(0)
            .validate()
            .is_err());
    }

    #[test]
    fn selected_option_uses_wire_names() {
        let option = SelectedOption {
            carrier_code: "02000201".to_string(),
            calculated_price: 5.55,
            customer_price: 6.9,
            pickup_id: Some("701003200".to_string()),
            return_prices: true,
        };
        assert_eq!(
            serde_json::to_value(&option).unwrap(),
            json!({
                "carriercode": "02000201",
                "calculated_price": 5.55,
                "customer_price": 6.9,
                "pickupid": "701003200",
                "return_prices": 1
            })
        );
    }

    #[test]
    fn package_card_order_defaults() {
        let order = PackageCardOrder {
            package_card: Some(PackageCardOptions {
                format: Some("pdf".to_string()),
                reversed: Some(false),
                ..Default::default()
            }),
            parcels: vec![Parcel {
                weight: Some(Weight::kg(0.1).unwrap()),
                tracking_codes: Some(TrackingCodes {
                    send: Some("JJFI12340000000000004".to_string()),
                    return_code: Some("JJFI12340000000000005".to_string()),
                }),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&order).unwrap(),
            json!({
                "return_cards": 0,
                "sendmail": 0,
                "send_edi": 1,
                "package_card": {"direction": "both", "format": "pdf", "reversed": 0},
                "parcels": [{
                    "weight": {"amount": 0.1, "unit": "kg"},
                    "tracking_codes": {
                        "send": "JJFI12340000000000004",
                        "return": "JJFI12340000000000005"
                    }
                }]
            })
        );
    }

    #[test]
    fn parcel_deletion_validation() {
        assert!(ParcelDeletion::All.validate().is_ok());
        assert!(ParcelDeletion::Parcels(Vec::new()).validate().is_err());
        assert!(ParcelDeletion::Parcels(vec![ParcelRef::default()]).validate().is_err());
        assert!(ParcelDeletion::Parcels(vec![ParcelRef::by_id("791281665")])
            .validate()
            .is_ok());
    }
}
