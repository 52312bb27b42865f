// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reference catalogs pulled from the server and their typed records.
//!
//! A full sync walks a list of [`CatalogKind`]s. Every page of a catalog is a
//! heterogeneous list of raw JSON records, each carrying a `type` field that
//! names its [`RecordKind`]. [`build_record`] turns one raw record into a
//! validated [`CatalogRecord`] whose [`natural key`](CatalogRecord::natural_key)
//! identifies it across syncs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::account::AccountFlags;
use crate::error::{Error, Result};

/// A server endpoint that serves one catalog, page by page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    Clients,
    Debts,
    Goods,
    PaymentTypes,
    Companies,
    Stores,
    Rests,
    ClientLocations,
    ClientDirections,
    ClientProducts,
    Images,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 11] = [
        CatalogKind::Clients,
        CatalogKind::Debts,
        CatalogKind::Goods,
        CatalogKind::PaymentTypes,
        CatalogKind::Companies,
        CatalogKind::Stores,
        CatalogKind::Rests,
        CatalogKind::ClientLocations,
        CatalogKind::ClientDirections,
        CatalogKind::ClientProducts,
        CatalogKind::Images,
    ];

    /// Returns the string representation used in URLs and progress lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::Clients => "clients",
            CatalogKind::Debts => "debts",
            CatalogKind::Goods => "goods",
            CatalogKind::PaymentTypes => "payment_types",
            CatalogKind::Companies => "companies",
            CatalogKind::Stores => "stores",
            CatalogKind::Rests => "rests",
            CatalogKind::ClientLocations => "client_locations",
            CatalogKind::ClientDirections => "client_directions",
            CatalogKind::ClientProducts => "client_products",
            CatalogKind::Images => "images",
        }
    }

    /// The catalogs a full sync downloads for an account, in download order.
    ///
    /// Clients, debts, goods and payment types are always loaded; the rest
    /// depend on the account's flags.
    pub fn sync_order(flags: &AccountFlags) -> Vec<CatalogKind> {
        let optional = [
            (flags.load_companies, CatalogKind::Companies),
            (flags.use_stores, CatalogKind::Stores),
            (flags.load_rests, CatalogKind::Rests),
            (flags.load_client_locations, CatalogKind::ClientLocations),
            (flags.load_client_directions, CatalogKind::ClientDirections),
            (flags.load_client_products, CatalogKind::ClientProducts),
            (flags.load_images, CatalogKind::Images),
        ];

        let mut kinds = vec![
            CatalogKind::Clients,
            CatalogKind::Debts,
            CatalogKind::Goods,
            CatalogKind::PaymentTypes,
        ];
        kinds.extend(
            optional
                .into_iter()
                .filter(|(enabled, _)| *enabled)
                .map(|(_, kind)| kind),
        );
        kinds
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CatalogKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CatalogKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.to_lowercase())
            .ok_or_else(|| Error::UnknownCatalog(s.to_string()))
    }
}

/// The discriminator carried in each raw record's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Client,
    Debt,
    Good,
    Price,
    PriceType,
    PaymentType,
    Company,
    Store,
    Rest,
    ClientLocation,
    ClientDirection,
    ClientProduct,
    Image,
}

impl RecordKind {
    pub const ALL: [RecordKind; 13] = [
        RecordKind::Client,
        RecordKind::Debt,
        RecordKind::Good,
        RecordKind::Price,
        RecordKind::PriceType,
        RecordKind::PaymentType,
        RecordKind::Company,
        RecordKind::Store,
        RecordKind::Rest,
        RecordKind::ClientLocation,
        RecordKind::ClientDirection,
        RecordKind::ClientProduct,
        RecordKind::Image,
    ];

    /// Returns the string representation used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Client => "client",
            RecordKind::Debt => "debt",
            RecordKind::Good => "good",
            RecordKind::Price => "price",
            RecordKind::PriceType => "price_type",
            RecordKind::PaymentType => "payment_type",
            RecordKind::Company => "company",
            RecordKind::Store => "store",
            RecordKind::Rest => "rest",
            RecordKind::ClientLocation => "client_location",
            RecordKind::ClientDirection => "client_direction",
            RecordKind::ClientProduct => "client_product",
            RecordKind::Image => "image",
        }
    }

    /// Fields whose values, joined with `/`, form the natural key.
    pub fn key_fields(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Client
            | RecordKind::Good
            | RecordKind::Company
            | RecordKind::Store
            | RecordKind::Image => &["guid"],
            RecordKind::PriceType | RecordKind::PaymentType => &["code"],
            RecordKind::Debt => &["client_guid", "doc_guid"],
            RecordKind::Price => &["good_guid", "price_type"],
            RecordKind::Rest => &["good_guid", "store_guid"],
            RecordKind::ClientLocation => &["client_guid"],
            RecordKind::ClientDirection => &["client_guid", "direction_guid"],
            RecordKind::ClientProduct => &["client_guid", "good_guid"],
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.to_lowercase())
            .ok_or_else(|| Error::UnknownRecordKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub guid: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub tax_id: Option<String>,
    /// Percentage in `0..=100`.
    pub discount: f64,
    pub price_type: Option<String>,
    pub is_banned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Debt {
    pub client_guid: String,
    pub doc_guid: String,
    pub doc_number: Option<String>,
    pub doc_type: Option<String>,
    pub sum: f64,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Good {
    pub guid: String,
    pub description: String,
    pub code: Option<String>,
    pub vendor_code: Option<String>,
    pub unit: Option<String>,
    pub group_guid: Option<String>,
    pub is_group: bool,
    pub quantity: f64,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub good_guid: String,
    pub price_type: String,
    pub price_type_name: Option<String>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceType {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentType {
    pub code: String,
    pub description: String,
    pub is_fiscal: bool,
    pub is_default: bool,
}

/// A named entity with a default marker; companies and stores share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub guid: String,
    pub description: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub good_guid: String,
    pub store_guid: String,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientLocation {
    pub client_guid: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDirection {
    pub client_guid: String,
    pub direction_guid: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientProduct {
    pub client_guid: String,
    pub good_guid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub guid: String,
    pub good_guid: String,
    pub url: String,
    pub is_default: bool,
}

/// A validated catalog record.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRecord {
    Client(Client),
    Debt(Debt),
    Good(Good),
    Price(Price),
    PriceType(PriceType),
    PaymentType(PaymentType),
    Company(Directory),
    Store(Directory),
    Rest(Rest),
    ClientLocation(ClientLocation),
    ClientDirection(ClientDirection),
    ClientProduct(ClientProduct),
    Image(Image),
}

impl CatalogRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            CatalogRecord::Client(_) => RecordKind::Client,
            CatalogRecord::Debt(_) => RecordKind::Debt,
            CatalogRecord::Good(_) => RecordKind::Good,
            CatalogRecord::Price(_) => RecordKind::Price,
            CatalogRecord::PriceType(_) => RecordKind::PriceType,
            CatalogRecord::PaymentType(_) => RecordKind::PaymentType,
            CatalogRecord::Company(_) => RecordKind::Company,
            CatalogRecord::Store(_) => RecordKind::Store,
            CatalogRecord::Rest(_) => RecordKind::Rest,
            CatalogRecord::ClientLocation(_) => RecordKind::ClientLocation,
            CatalogRecord::ClientDirection(_) => RecordKind::ClientDirection,
            CatalogRecord::ClientProduct(_) => RecordKind::ClientProduct,
            CatalogRecord::Image(_) => RecordKind::Image,
        }
    }

    /// Identity of the record within its kind, stable across syncs.
    pub fn natural_key(&self) -> String {
        match self {
            CatalogRecord::Client(r) => r.guid.clone(),
            CatalogRecord::Debt(r) => format!("{}/{}", r.client_guid, r.doc_guid),
            CatalogRecord::Good(r) => r.guid.clone(),
            CatalogRecord::Price(r) => format!("{}/{}", r.good_guid, r.price_type),
            CatalogRecord::PriceType(r) => r.code.clone(),
            CatalogRecord::PaymentType(r) => r.code.clone(),
            CatalogRecord::Company(r) | CatalogRecord::Store(r) => r.guid.clone(),
            CatalogRecord::Rest(r) => format!("{}/{}", r.good_guid, r.store_guid),
            CatalogRecord::ClientLocation(r) => r.client_guid.clone(),
            CatalogRecord::ClientDirection(r) => {
                format!("{}/{}", r.client_guid, r.direction_guid)
            }
            CatalogRecord::ClientProduct(r) => format!("{}/{}", r.client_guid, r.good_guid),
            CatalogRecord::Image(r) => r.guid.clone(),
        }
    }

    /// Serializes the record body for storage.
    pub fn to_payload(&self) -> Result<Value> {
        let value = match self {
            CatalogRecord::Client(r) => serde_json::to_value(r)?,
            CatalogRecord::Debt(r) => serde_json::to_value(r)?,
            CatalogRecord::Good(r) => serde_json::to_value(r)?,
            CatalogRecord::Price(r) => serde_json::to_value(r)?,
            CatalogRecord::PriceType(r) => serde_json::to_value(r)?,
            CatalogRecord::PaymentType(r) => serde_json::to_value(r)?,
            CatalogRecord::Company(r) | CatalogRecord::Store(r) => serde_json::to_value(r)?,
            CatalogRecord::Rest(r) => serde_json::to_value(r)?,
            CatalogRecord::ClientLocation(r) => serde_json::to_value(r)?,
            CatalogRecord::ClientDirection(r) => serde_json::to_value(r)?,
            CatalogRecord::ClientProduct(r) => serde_json::to_value(r)?,
            CatalogRecord::Image(r) => serde_json::to_value(r)?,
        };
        Ok(value)
    }
}

/// Best-effort natural key of a raw record, for logging records that fail to build.
pub fn raw_key(kind: RecordKind, raw: &Value) -> String {
    kind.key_fields()
        .iter()
        .map(|field| raw.get(field).map(scalar_text).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds and validates a typed record from one raw server record.
pub fn build_record(kind: RecordKind, raw: &Value) -> Result<CatalogRecord> {
    let f = Fields::new(kind, raw)?;
    let record = match kind {
        RecordKind::Client => {
            let discount = f.number_or("discount", 0.0)?;
            if !(0.0..=100.0).contains(&discount) {
                return Err(f.invalid(format!("discount {discount} is outside 0..=100")));
            }
            CatalogRecord::Client(Client {
                guid: f.text("guid")?,
                name: f.text("name")?,
                address: f.opt_text("address"),
                phone: f.opt_text("phone"),
                tax_id: f.opt_text("tax_id"),
                discount,
                price_type: f.opt_text("price_type"),
                is_banned: f.flag("is_banned"),
            })
        }
        RecordKind::Debt => CatalogRecord::Debt(Debt {
            client_guid: f.text("client_guid")?,
            doc_guid: f.text("doc_guid")?,
            doc_number: f.opt_text("doc_number"),
            doc_type: f.opt_text("doc_type"),
            sum: f.number("sum")?,
            is_overdue: f.flag("is_overdue"),
        }),
        RecordKind::Good => CatalogRecord::Good(Good {
            guid: f.text("guid")?,
            description: f.text("description")?,
            code: f.opt_text("code"),
            vendor_code: f.opt_text("vendor_code"),
            unit: f.opt_text("unit"),
            group_guid: f.opt_text("group_guid"),
            is_group: f.flag("is_group"),
            quantity: f.non_negative("quantity", 0.0)?,
            price: f.non_negative("price", 0.0)?,
        }),
        RecordKind::Price => {
            let price = f.number("price")?;
            if price < 0.0 {
                return Err(f.invalid(format!("price {price} is negative")));
            }
            CatalogRecord::Price(Price {
                good_guid: f.text("good_guid")?,
                price_type: f.text("price_type")?,
                price_type_name: f.opt_text("price_type_name"),
                price,
            })
        }
        RecordKind::PriceType => {
            let code = f.text("code")?;
            CatalogRecord::PriceType(PriceType {
                description: f.opt_text("description").unwrap_or_else(|| code.clone()),
                code,
            })
        }
        RecordKind::PaymentType => CatalogRecord::PaymentType(PaymentType {
            code: f.text("code")?,
            description: f.text("description")?,
            is_fiscal: f.flag("is_fiscal"),
            is_default: f.flag("is_default"),
        }),
        RecordKind::Company => CatalogRecord::Company(f.directory()?),
        RecordKind::Store => CatalogRecord::Store(f.directory()?),
        RecordKind::Rest => CatalogRecord::Rest(Rest {
            good_guid: f.text("good_guid")?,
            store_guid: f.text("store_guid")?,
            quantity: f.number("quantity")?,
        }),
        RecordKind::ClientLocation => {
            let latitude = f.number("latitude")?;
            let longitude = f.number("longitude")?;
            if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                return Err(f.invalid(format!(
                    "coordinates ({latitude}, {longitude}) are out of range"
                )));
            }
            CatalogRecord::ClientLocation(ClientLocation {
                client_guid: f.text("client_guid")?,
                latitude,
                longitude,
                address: f.opt_text("address"),
            })
        }
        RecordKind::ClientDirection => CatalogRecord::ClientDirection(ClientDirection {
            client_guid: f.text("client_guid")?,
            direction_guid: f.text("direction_guid")?,
            description: f.opt_text("description"),
        }),
        RecordKind::ClientProduct => CatalogRecord::ClientProduct(ClientProduct {
            client_guid: f.text("client_guid")?,
            good_guid: f.text("good_guid")?,
        }),
        RecordKind::Image => CatalogRecord::Image(Image {
            guid: f.text("guid")?,
            good_guid: f.text("good_guid")?,
            url: f.text("url")?,
            is_default: f.flag("is_default"),
        }),
    };
    Ok(record)
}

/// Renders a scalar JSON value as text; numbers keep their JSON spelling.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Typed field access over a raw record object.
struct Fields<'a> {
    kind: RecordKind,
    key: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn new(kind: RecordKind, raw: &'a Value) -> Result<Self> {
        let key = raw_key(kind, raw);
        match raw.as_object() {
            Some(map) => Ok(Fields { kind, key, map }),
            None => Err(Error::InvalidRecord {
                kind: kind.to_string(),
                key,
                reason: "record is not an object".into(),
            }),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> Error {
        Error::InvalidRecord {
            kind: self.kind.to_string(),
            key: self.key.clone(),
            reason: reason.into(),
        }
    }

    fn text(&self, name: &str) -> Result<String> {
        self.opt_text(name)
            .ok_or_else(|| self.invalid(format!("missing {name}")))
    }

    fn opt_text(&self, name: &str) -> Option<String> {
        self.map
            .get(name)
            .map(scalar_text)
            .filter(|s| !s.is_empty())
    }

    fn number(&self, name: &str) -> Result<f64> {
        let value = match self.map.get(name) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            None | Some(Value::Null) => return Err(self.invalid(format!("missing {name}"))),
            _ => None,
        };
        match value {
            Some(n) if n.is_finite() => Ok(n),
            _ => Err(self.invalid(format!("{name} is not a number"))),
        }
    }

    fn number_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.map.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => self.number(name),
        }
    }

    fn non_negative(&self, name: &str, default: f64) -> Result<f64> {
        let n = self.number_or(name, default)?;
        if n < 0.0 {
            return Err(self.invalid(format!("{name} {n} is negative")));
        }
        Ok(n)
    }

    fn flag(&self, name: &str) -> bool {
        match self.map.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
            Some(Value::String(s)) => matches!(s.trim(), "true" | "1" | "yes"),
            _ => false,
        }
    }

    fn directory(&self) -> Result<Directory> {
        Ok(Directory {
            guid: self.text("guid")?,
            description: self.text("description")?,
            is_default: self.flag("is_default"),
        })
    }
}

#[cfg(test)]
#[path = "catalog_tests.rs"]
mod tests;
