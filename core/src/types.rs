//! Domain DTOs shared by the shipping and user clients.
//!
//! # Design
//! Values that Shipfunk would reject anyway (non-positive weights, a three
//! letter language code) are refused at construction, so a `Product` or
//! `Language` that exists is always sendable. Plain address and account blocks
//! keep public fields; they are checked when a request is built.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ApiError;

const DEFAULT_LANGUAGE: &str = "FI";
const DEFAULT_CURRENCY: &str = "EUR";
const DEFAULT_WEIGHT_UNIT: &str = "kg";

/// Upper-case an alphabetic code of exactly `len` letters.
fn check_code(code: &str, len: usize, what: &str) -> Result<String, ApiError> {
    if code.is_empty() {
        return Err(ApiError::validation(format!("{what} can not be empty")));
    }
    if code.chars().count() != len {
        return Err(ApiError::validation(format!(
            "the length of the {what} code is not {len}"
        )));
    }
    if !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::validation(format!(
            "only letters are allowed in the {what} code"
        )));
    }
    Ok(code.to_ascii_uppercase())
}

/// Two-letter ISO 639-1 language code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    pub fn parse(code: &str) -> Result<Self, ApiError> {
        check_code(code, 2, "language").map(Language)
    }

    /// Like `parse`, but falls back to `FI` instead of failing.
    pub fn lenient(code: &str) -> Self {
        Self::parse(code).unwrap_or_else(|_| {
            debug!(code, "invalid language code, using default");
            Self::default()
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Language {
    fn default() -> Self {
        Language(DEFAULT_LANGUAGE.to_string())
    }
}

impl FromStr for Language {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Three-letter currency code, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> Result<Self, ApiError> {
        check_code(code, 3, "currency").map(Currency)
    }

    /// Like `parse`, but falls back to `EUR` instead of failing.
    pub fn lenient(code: &str) -> Self {
        Self::parse(code).unwrap_or_else(|_| {
            debug!(code, "invalid currency code, using default");
            Self::default()
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency(DEFAULT_CURRENCY.to_string())
    }
}

impl FromStr for Currency {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_positive(value: f64, what: &str) -> Result<f64, ApiError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ApiError::validation(format!(
            "{what} has to be bigger than 0, got {value}"
        )))
    }
}

/// Weight of a product or parcel. Always positive with a non-empty unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weight {
    amount: f64,
    unit: String,
}

impl Weight {
    pub fn new(amount: f64, unit: impl Into<String>) -> Result<Self, ApiError> {
        let unit = unit.into();
        if unit.trim().is_empty() {
            return Err(ApiError::validation("weight unit can not be empty"));
        }
        Ok(Self {
            amount: check_positive(amount, "weight")?,
            unit,
        })
    }

    pub fn kg(amount: f64) -> Result<Self, ApiError> {
        Self::new(amount, DEFAULT_WEIGHT_UNIT)
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

/// Package dimensions. Every side must be positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimensions {
    unit: String,
    width: f64,
    depth: f64,
    height: f64,
}

impl Dimensions {
    pub fn new(unit: impl Into<String>, width: f64, depth: f64, height: f64) -> Result<Self, ApiError> {
        Ok(Self {
            unit: unit.into(),
            width: check_positive(width, "width")?,
            depth: check_positive(depth, "depth")?,
            height: check_positive(height, "height")?,
        })
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn depth(&self) -> f64 {
        self.depth
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

/// Additional service attached to a product or an order, e.g. dangerous
/// goods (10028) or cash on delivery (10001).
///
/// Keys Shipfunk accepts beyond the dangerous-goods set go in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalService {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packing_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_restriction_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub un_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_label_numbers: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AdditionalService {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// One product line of a basket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    amount: f64,
    code: String,
    name: String,
    weight: Weight,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warehouse: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    additional_services: Vec<AdditionalService>,
}

impl Product {
    /// A single item weighing `weight` kilograms, named after its code.
    pub fn new(code: impl Into<String>, weight: f64) -> Result<Self, ApiError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(ApiError::validation("product number can not be empty"));
        }
        Ok(Self {
            amount: 1.0,
            name: code.clone(),
            code,
            weight: Weight::kg(weight)?,
            dimensions: None,
            warehouse: None,
            additional_services: Vec::new(),
        })
    }

    pub fn with_amount(mut self, amount: f64) -> Result<Self, ApiError> {
        self.amount = check_positive(amount, "amount")?;
        Ok(self)
    }

    /// An empty name keeps the product code as name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.is_empty() {
            self.name = name;
        }
        self
    }

    pub fn with_weight(mut self, weight: Weight) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    pub fn with_additional_service(mut self, service: AdditionalService) -> Self {
        self.additional_services.push(service);
        self
    }

    /// Replaces every additional service.
    pub fn with_additional_services(mut self, services: Vec<AdditionalService>) -> Self {
        self.additional_services = services;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn weight(&self) -> &Weight {
        &self.weight
    }

    pub fn dimensions(&self) -> Option<&Dimensions> {
        self.dimensions.as_ref()
    }

    pub fn warehouse(&self) -> Option<&str> {
        self.warehouse.as_deref()
    }

    pub fn additional_services(&self) -> &[AdditionalService] {
        &self.additional_services
    }
}

/// End-customer address and contact block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_box: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl Customer {
    /// Customer known only by postal code and country.
    pub fn at(postal_code: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            postal_code: Some(postal_code.into()),
            country: Some(country.into()),
            ..Default::default()
        }
    }

    /// Copy with blank fields dropped and the country code upper-cased.
    pub fn normalized(&self) -> Self {
        Self {
            first_name: non_blank(&self.first_name),
            last_name: non_blank(&self.last_name),
            street_address: non_blank(&self.street_address),
            postal_code: non_blank(&self.postal_code),
            city: non_blank(&self.city),
            country: non_blank(&self.country).map(|c| c.to_uppercase()),
            postal_box: non_blank(&self.postal_box),
            company: non_blank(&self.company),
            phone: non_blank(&self.phone),
            email: non_blank(&self.email),
        }
    }

    /// Normalized copy holding only postal code and country.
    pub fn location(&self) -> Self {
        let normalized = self.normalized();
        Self {
            postal_code: normalized.postal_code,
            country: normalized.country,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized() == Self::default()
    }
}

/// Products and customer for price and delivery-option lookups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    pub products: Vec<Product>,
    pub customer: Customer,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }

    pub fn with_customer(mut self, customer: Customer) -> Self {
        self.customer = customer;
        self
    }

    pub fn add_product(&mut self, product: Product) {
        self.products.push(product);
    }
}

/// Merchant account created under the caller's own Shipfunk account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub eshop_name: String,
    pub business_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customs_id: Option<String>,
    pub contact_person_name: String,
    pub contact_person_phone: String,
    pub contact_person_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_address: Option<String>,
    /// Appended to Shipfunk's delivery emails; may contain HTML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_contact_info: Option<String>,
}

pub(crate) fn check_email(email: &str, what: &str) -> Result<(), ApiError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ApiError::validation(format!("{what} can not be empty")));
    }
    if !email.contains('@') {
        return Err(ApiError::validation(format!("{what} is not an email address: {email}")));
    }
    Ok(())
}

impl UserAccount {
    /// Check the fields transport companies require.
    pub fn validate(&self) -> Result<(), ApiError> {
        check_email(&self.email, "email")?;
        check_email(&self.contact_person_email, "contact_person_email")?;
        for (value, what) in [
            (&self.eshop_name, "eshop_name"),
            (&self.business_id, "business_id"),
            (&self.contact_person_name, "contact_person_name"),
            (&self.contact_person_phone, "contact_person_phone"),
        ] {
            if value.trim().is_empty() {
                return Err(ApiError::validation(format!("{what} can not be empty")));
            }
        }
        if let Some(locale) = &self.locale {
            check_code(locale, 2, "locale")?;
        }
        Ok(())
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
    }
}

/// Cheapest and most expensive delivery for a basket. Shipfunk sends the
/// prices either as numbers or as decimal strings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceRange {
    #[serde(deserialize_with = "lenient_f64")]
    pub min_price: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub max_price: f64,
}

/// `Code`/`Message` pair returned by status-style operations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusMessage {
    #[serde(rename = "Code", deserialize_with = "lenient_i64")]
    pub code: i64,
    #[serde(rename = "Message")]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_is_upper_cased() {
        assert_eq!(Language::parse("en").unwrap().as_str(), "EN");
        assert_eq!(Language::default().as_str(), "FI");
    }

    #[test]
    fn language_rejects_bad_codes() {
        assert!(Language::parse("").is_err());
        assert!(Language::parse("English").is_err());
        assert!(Language::parse("f3").is_err());
    }

    #[test]
    fn language_lenient_falls_back() {
        assert_eq!(Language::lenient("suomi").as_str(), "FI");
        assert_eq!(Language::lenient("f4").as_str(), "FI");
        assert_eq!(Language::lenient("sv").as_str(), "SV");
    }

    #[test]
    fn currency_rules() {
        assert_eq!("sek".parse::<Currency>().unwrap().as_str(), "SEK");
        assert!(Currency::parse("Euro").is_err());
        assert!(Currency::parse("kr3").is_err());
        assert_eq!(Currency::lenient("eurot").as_str(), "EUR");
        assert_eq!(Currency::lenient("er5").as_str(), "EUR");
    }

    #[test]
    fn product_defaults() {
        let product = Product::new("Product1", 2.3).unwrap();
        assert_eq!(product.code(), "Product1");
        assert_eq!(product.name(), "Product1");
        assert_eq!(product.amount(), 1.0);
        assert_eq!(product.weight().amount(), 2.3);
        assert_eq!(product.weight().unit(), "kg");
        assert!(product.additional_services().is_empty());
    }

    #[test]
    fn product_rejects_non_positive_values() {
        assert!(Product::new("P", -6.0).is_err());
        assert!(Product::new("P", 0.0).is_err());
        assert!(Product::new("P", f64::NAN).is_err());
        assert!(Product::new("", 1.0).is_err());
        assert!(Product::new("P", 1.0).unwrap().with_amount(0.0).is_err());
        assert!(Product::new("P", 1.0).unwrap().with_amount(-3.0).is_err());
    }

    #[test]
    fn weight_must_be_positive_with_a_unit() {
        assert!(Weight::new(-5.0, "kg").unwrap_err().is_validation());
        assert!(Weight::kg(0.0).is_err());
        assert!(Weight::kg(f64::INFINITY).is_err());
        assert!(Weight::new(1.0, "").unwrap_err().is_validation());
        assert!(Weight::new(1.0, "  ").is_err());

        let weight = Weight::new(250.0, "g").unwrap();
        assert_eq!(weight.amount(), 250.0);
        assert_eq!(weight.unit(), "g");
    }

    #[test]
    fn dimensions_must_be_positive() {
        assert!(Dimensions::new("cm", -25.0, -15.0, -3.0).is_err());
        assert!(Dimensions::new("cm", 25.0, 0.0, 3.0).is_err());
        let dims = Dimensions::new("cm", 25.0, 23.8, 4.0).unwrap();
        assert_eq!(dims.unit(), "cm");
        assert_eq!(dims.depth(), 23.8);
    }

    #[test]
    fn product_serializes_only_present_parts() {
        let product = Product::new("P1", 1.5).unwrap().with_name("");
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "amount": 1.0,
                "code": "P1",
                "name": "P1",
                "weight": {"amount": 1.5, "unit": "kg"}
            })
        );

        let product = product
            .with_dimensions(Dimensions::new("cm", 30.0, 5.0, 5.0).unwrap())
            .with_warehouse("Warehouse 100")
            .with_additional_service(AdditionalService {
                quantity: Some(0.04),
                quantity_unit: Some("kg".to_string()),
                ..AdditionalService::new("10028")
            });
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["dimensions"]["width"], 30.0);
        assert_eq!(json["warehouse"], "Warehouse 100");
        assert_eq!(json["additional_services"][0]["code"], "10028");
        assert_eq!(json["additional_services"][0]["quantity"], 0.04);
        assert!(json["additional_services"][0].get("un_code").is_none());
    }

    #[test]
    fn additional_services_are_replaced() {
        let product = Product::new("P", 1.0)
            .unwrap()
            .with_additional_service(AdditionalService::new("10028"))
            .with_additional_service(AdditionalService::new("22334"));
        assert_eq!(product.additional_services().len(), 2);

        let product = product.with_additional_services(vec![AdditionalService::new("44")]);
        assert_eq!(product.additional_services().len(), 1);
        assert_eq!(product.additional_services()[0].code, "44");
    }

    #[test]
    fn additional_service_extra_keys_are_flattened() {
        let service = AdditionalService::new("10001")
            .with_extra("bic", "OKOYFIHH")
            .with_extra("monetary_value", 4);
        let json = serde_json::to_value(&service).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"code": "10001", "bic": "OKOYFIHH", "monetary_value": 4})
        );
    }

    #[test]
    fn customer_normalization() {
        let customer = Customer {
            first_name: Some("Test".to_string()),
            postal_box: Some(String::new()),
            company: Some("  ".to_string()),
            country: Some("fi".to_string()),
            postal_code: Some("30100".to_string()),
            ..Default::default()
        };
        let normalized = customer.normalized();
        assert_eq!(normalized.country.as_deref(), Some("FI"));
        assert!(normalized.postal_box.is_none());
        assert!(normalized.company.is_none());

        let location = customer.location();
        assert!(location.first_name.is_none());
        assert_eq!(location, Customer::at("30100", "FI"));
    }

    #[test]
    fn blank_customer_is_empty() {
        let customer = Customer {
            phone: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(customer.is_empty());
        assert!(!Customer::at("20100", "fi").is_empty());
    }

    #[test]
    fn user_account_validation() {
        let mut account = UserAccount {
            email: "shop@example.com".to_string(),
            locale: Some("fi".to_string()),
            eshop_name: "Example Store".to_string(),
            business_id: "12312345".to_string(),
            contact_person_name: "Test Tester".to_string(),
            contact_person_phone: "040 1231234".to_string(),
            contact_person_email: "shop@example.com".to_string(),
            ..Default::default()
        };
        assert!(account.validate().is_ok());

        account.locale = Some("fin".to_string());
        assert!(account.validate().is_err());

        account.locale = None;
        account.business_id = String::new();
        assert!(account.validate().is_err());

        account.business_id = "12312345".to_string();
        account.email = "not-an-email".to_string();
        assert!(account.validate().is_err());
    }

    #[test]
    fn price_range_accepts_strings_and_numbers() {
        let prices: PriceRange =
            serde_json::from_str(r#"{"min_price":"4.90","max_price":12.5}"#).unwrap();
        assert_eq!(prices.min_price, 4.9);
        assert_eq!(prices.max_price, 12.5);

        assert!(serde_json::from_str::<PriceRange>(r#"{"min_price":"n/a","max_price":1}"#).is_err());
    }

    #[test]
    fn status_message_accepts_string_code() {
        let status: StatusMessage =
            serde_json::from_str(r#"{"Code":"1","Message":"OK"}"#).unwrap();
        assert_eq!(status.code, 1);
        assert_eq!(status.message, "OK");
    }
}
