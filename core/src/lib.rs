//! Synchronous client for the Shipfunk shipping API.
//!
//! # Overview
//! Two clients cover the API: `ShipfunkClient` for everything tied to one web
//! shop order (prices, delivery options, pickup points, package cards,
//! tracking, parcels) and `UserClient` for merchant accounts. Every operation
//! also exists as a `build_*` method that returns the request as plain data,
//! so a host with its own HTTP stack can execute the round-trip and feed the
//! reply to `parse_response`.
//!
//! # Design
//! - Clients are immutable after construction and generic over `Transport`;
//!   the default `UreqTransport` is blocking.
//! - Parameters are typed and validated before a request is built, so an
//!   invalid call never reaches the network.
//! - Replies that Shipfunk documents loosely stay `serde_json::Value`; prices
//!   and status messages are typed.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod requests;
pub mod transport;
pub mod types;
pub mod user;

pub use client::ShipfunkClient;
pub use config::{ClientConfig, Credentials, DEFAULT_ENDPOINT};
pub use envelope::{parse_response, FORM_CONTENT_TYPE};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use requests::{
    CardDirection, DeliveryQuery, OrderStatus, PackageCardOptions, PackageCardOrder, PackageCardQuery,
    PackageCardRequest, Parcel, ParcelDeletion, ParcelRef, PickupQuery, SelectedOption, TrackingCodes,
    TrackingEventsQuery,
};
pub use transport::{Transport, UreqTransport};
pub use types::{
    AdditionalService, Cart, Currency, Customer, Dimensions, Language, PriceRange, Product,
    StatusMessage, UserAccount, Weight,
};
pub use user::UserClient;
