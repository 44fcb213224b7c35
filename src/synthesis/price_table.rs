use std::{collections::HashMap, fmt, ops::Deref};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Category, FareguardError};

/// Prices are whole multiples of this step.
pub const PRICE_STEP: i64 = 100;

/// Inclusive price envelope `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "(i64, i64)", into = "(i64, i64)")]
pub struct PriceRange {
    min: i64,
    max: i64,
}

impl PriceRange {
    /// Used when a route table has no entry for a category.
    pub const UNRESTRICTED: PriceRange = PriceRange {
        min: 0,
        max: i64::MAX,
    };

    /// Validated range; `min` must not exceed `max`.
    pub fn new(min: i64, max: i64) -> Result<Self, FareguardError> {
        if min > max {
            return Err(FareguardError::InvalidPriceRange(format!(
                "Price range minimum {min} exceeds maximum {max}"
            )));
        }

        Ok(Self { min, max })
    }

    /// Lower bound.
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Upper bound.
    pub fn max(&self) -> i64 {
        self.max
    }

    /// `true` if `price` lies in the range.
    pub fn contains(&self, price: i64) -> bool {
        self.min <= price && price <= self.max
    }

    /// `[max(a.min, b.min), min(a.max, b.max)]`, or `None` when empty.
    pub fn intersect(&self, other: &PriceRange) -> Option<PriceRange> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        (min <= max).then_some(PriceRange { min, max })
    }

    /// First and last multiple of [`PRICE_STEP`] inside the range, expressed
    /// in steps, or `None` if the range holds no such multiple.
    pub fn step_bounds(&self) -> Option<(i64, i64)> {
        let first = self.min.div_euclid(PRICE_STEP) + i64::from(self.min.rem_euclid(PRICE_STEP) != 0);
        let last = self.max.div_euclid(PRICE_STEP);
        (first <= last).then_some((first, last))
    }
}

impl TryFrom<(i64, i64)> for PriceRange {
    type Error = FareguardError;

    fn try_from((min, max): (i64, i64)) -> Result<Self, Self::Error> {
        Self::new(min, max)
    }
}

impl From<PriceRange> for (i64, i64) {
    fn from(range: PriceRange) -> Self {
        (range.min, range.max)
    }
}

/// Three-letter uppercase IATA code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AirportCode(String);

impl Deref for AirportCode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<String> for AirportCode {
    type Error = FareguardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() == 3 && value.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Self(value))
        } else {
            Err(FareguardError::InvalidAirportCode(format!(
                "Airport code must be three uppercase letters, got {value:?}"
            )))
        }
    }
}

impl TryFrom<&str> for AirportCode {
    type Error = FareguardError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

impl From<AirportCode> for String {
    fn from(code: AirportCode) -> Self {
        code.0
    }
}

impl fmt::Display for AirportCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Directed origin/destination pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Departure airport.
    pub origin: AirportCode,
    /// Arrival airport.
    pub destination: AirportCode,
}

impl Route {
    /// Validated route.
    pub fn new(origin: &str, destination: &str) -> Result<Self, FareguardError> {
        Ok(Self {
            origin: AirportCode::try_from(origin)?,
            destination: AirportCode::try_from(destination)?,
        })
    }
}

/// Price envelope per category for one route.
pub type CategoryPrices = HashMap<Category, PriceRange>;

pub(crate) fn category_prices(promo: (i64, i64), normal: (i64, i64), peak: (i64, i64)) -> CategoryPrices {
    [
        (Category::Promo, PriceRange { min: promo.0, max: promo.1 }),
        (Category::Normal, PriceRange { min: normal.0, max: normal.1 }),
        (Category::Peak, PriceRange { min: peak.0, max: peak.1 }),
    ]
    .into_iter()
    .collect()
}

/// Route-specific price envelopes with a default table and a last-resort range.
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceCatalog {
    routes: HashMap<Route, CategoryPrices>,
    default: CategoryPrices,
    fallback: PriceRange,
}

impl PriceCatalog {
    /// Catalog with no route entries.
    pub fn new(default: CategoryPrices) -> Self {
        Self {
            routes: HashMap::new(),
            default,
            fallback: PriceRange::UNRESTRICTED,
        }
    }

    /// Adds or replaces the envelopes for `route`.
    pub fn with_route(mut self, route: Route, prices: CategoryPrices) -> Self {
        self.routes.insert(route, prices);
        self
    }

    /// Replaces the last-resort range.
    pub fn with_fallback(mut self, fallback: PriceRange) -> Self {
        self.fallback = fallback;
        self
    }

    /// Envelope for `category` on `origin -> destination`.
    ///
    /// Routes absent from the table use the default table. A category missing
    /// from whichever table applies uses the fallback range.
    pub fn range_for(&self, origin: &str, destination: &str, category: Category) -> PriceRange {
        let table = Route::new(origin, destination)
            .ok()
            .and_then(|route| self.routes.get(&route))
            .unwrap_or(&self.default);

        table.get(&category).copied().unwrap_or(self.fallback)
    }

    /// `true` if `origin -> destination` has its own table.
    pub fn has_route(&self, origin: &str, destination: &str) -> bool {
        Route::new(origin, destination)
            .map(|route| self.routes.contains_key(&route))
            .unwrap_or(false)
    }

    /// Number of route-specific tables.
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }
}

impl Default for PriceCatalog {
    fn default() -> Self {
        let regional = category_prices((3500, 5500), (6000, 10000), (11000, 16000));
        let mut catalog = Self::new(category_prices((2000, 4000), (4000, 7000), (7000, 10000)));

        for (origin, destination, prices) in [
            ("TPE", "NRT", regional.clone()),
            ("TPE", "KIX", regional),
            ("TPE", "SIN", category_prices((3500, 5500), (6000, 9000), (9000, 12000))),
            ("TPE", "BKK", category_prices((3000, 5000), (5500, 8500), (8500, 11000))),
        ] {
            let route = Route {
                origin: AirportCode(origin.to_string()),
                destination: AirportCode(destination.to_string()),
            };
            catalog.routes.insert(route, prices);
        }

        catalog
    }
}

#[derive(Serialize, Deserialize)]
struct RouteFaresFile {
    origin: AirportCode,
    destination: AirportCode,
    prices: CategoryPrices,
}

#[derive(Serialize, Deserialize)]
struct PriceCatalogFile {
    #[serde(default)]
    routes: Vec<RouteFaresFile>,
    default: CategoryPrices,
    #[serde(default)]
    fallback: Option<PriceRange>,
}

impl Serialize for PriceCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut routes: Vec<RouteFaresFile> = self
            .routes
            .iter()
            .map(|(route, prices)| RouteFaresFile {
                origin: route.origin.clone(),
                destination: route.destination.clone(),
                prices: prices.clone(),
            })
            .collect();
        routes.sort_by(|a, b| (&a.origin, &a.destination).cmp(&(&b.origin, &b.destination)));

        PriceCatalogFile {
            routes,
            default: self.default.clone(),
            fallback: Some(self.fallback),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PriceCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let file = PriceCatalogFile::deserialize(deserializer)?;
        let mut catalog = PriceCatalog::new(file.default);

        if let Some(fallback) = file.fallback {
            catalog.fallback = fallback;
        }

        for entry in file.routes {
            let route = Route {
                origin: entry.origin,
                destination: entry.destination,
            };
            catalog.routes.insert(route, entry.prices);
        }

        Ok(catalog)
    }
}
