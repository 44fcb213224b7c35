//! Per-query orchestration: resolve, admit, synthesize.
//!
//! The dispatcher is the boundary a transport layer talks to. It takes a
//! bearer token and flat query parameters, and returns either records or a
//! [`DispatchError`] that maps onto an HTTP-like status code.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    AdmissionController, AdmissionDecision, DispatchError, FlightRecord, PriceBounds, RngSeeder,
    RouteConstraint, SynthesisEngine, SynthesisRequest, TierResolver,
};

/// Strips an optional `Bearer ` prefix from an `Authorization` header value.
pub fn bearer_token(header: &str) -> &str {
    let header = header.trim();
    header.strip_prefix("Bearer ").unwrap_or(header).trim()
}

/// Flat query parameters as received from the transport.
///
/// Recognised keys: `from`, `to`, `date`, `type`, `min_price`, `max_price`.
/// Values stay raw until [`Dispatcher::dispatch`] interprets them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlightQuery {
    /// Departure airport code.
    pub origin: Option<String>,
    /// Arrival airport code.
    pub destination: Option<String>,
    /// Travel date.
    pub date: Option<String>,
    /// Category or alias.
    pub category: Option<String>,
    /// Lower price bound, unparsed.
    pub min_price: Option<String>,
    /// Upper price bound, unparsed.
    pub max_price: Option<String>,
}

impl FlightQuery {
    /// Collects known keys; unknown keys are ignored and the last value wins.
    pub fn from_params<I, K, V>(params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut query = Self::default();
        for (key, value) in params {
            let slot = match key.as_ref() {
                "from" => &mut query.origin,
                "to" => &mut query.destination,
                "date" => &mut query.date,
                "type" => &mut query.category,
                "min_price" => &mut query.min_price,
                "max_price" => &mut query.max_price,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        query
    }

    /// Present parameters under their wire names.
    pub fn to_params(&self) -> BTreeMap<&'static str, String> {
        [
            ("from", &self.origin),
            ("to", &self.destination),
            ("date", &self.date),
            ("type", &self.category),
            ("min_price", &self.min_price),
            ("max_price", &self.max_price),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|value| (key, value)))
        .collect()
    }

    /// Parses the numeric bounds, defaulting absent ones.
    pub fn price_bounds(&self) -> Result<PriceBounds, DispatchError> {
        Ok(PriceBounds::new(
            parse_price("min_price", self.min_price.as_deref(), PriceBounds::DEFAULT_MIN)?,
            parse_price("max_price", self.max_price.as_deref(), PriceBounds::DEFAULT_MAX)?,
        ))
    }

    /// Route constraint, or `None` if origin, destination or date is missing.
    pub fn route(&self) -> Option<RouteConstraint> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Some(RouteConstraint {
            origin: present(&self.origin)?.to_ascii_uppercase(),
            destination: present(&self.destination)?.to_ascii_uppercase(),
            date: present(&self.date)?,
        })
    }
}

fn parse_price(field: &'static str, raw: Option<&str>, default: i64) -> Result<i64, DispatchError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| DispatchError::MalformedInput {
                field,
                value: value.to_string(),
            }),
    }
}

/// Resolver, admission controller and synthesis engine wired together.
///
/// Cheap to share behind an [`Arc`]; every method takes `&self`.
pub struct Dispatcher {
    resolver: Arc<dyn TierResolver>,
    admission: Arc<AdmissionController>,
    engine: Arc<SynthesisEngine>,
    seeder: RngSeeder,
}

impl Dispatcher {
    /// Wires the three collaborators.
    pub fn new(
        resolver: Arc<dyn TierResolver>,
        admission: Arc<AdmissionController>,
        engine: Arc<SynthesisEngine>,
        seeder: RngSeeder,
    ) -> Self {
        Self {
            resolver,
            admission,
            engine,
            seeder,
        }
    }

    /// The admission controller.
    pub fn admission(&self) -> &Arc<AdmissionController> {
        &self.admission
    }

    /// The synthesis engine.
    pub fn engine(&self) -> &Arc<SynthesisEngine> {
        &self.engine
    }

    /// Handle one query.
    ///
    /// # Order
    ///
    /// 1. Unknown token: [`DispatchError::Unauthorized`], no counter touched
    /// 2. Unparsable price bound: [`DispatchError::MalformedInput`], no quota consumed
    /// 3. Quota exhausted: [`DispatchError::TooManyRequests`]
    /// 4. Otherwise: up to `density_per_request` records, price-ascending
    ///
    /// An admitted query whose constraints cannot be met returns fewer records,
    /// possibly none, and is still a success.
    pub fn dispatch(&self, token: &str, query: &FlightQuery) -> Result<Vec<FlightRecord>, DispatchError> {
        let identity = self
            .resolver
            .lookup(token)
            .ok_or(DispatchError::Unauthorized)?;

        let bounds = query.price_bounds()?;

        let now = self.admission.now();
        if let AdmissionDecision::Rejected {
            retry_after_ms,
            limit,
            ..
        } = self.admission.admit(&identity, now)
        {
            return Err(DispatchError::TooManyRequests {
                retry_after_ms,
                limit,
            });
        }

        let request = SynthesisRequest {
            route: query.route(),
            category: query
                .category
                .clone()
                .filter(|category| !category.trim().is_empty()),
            bounds,
            count: identity.density_per_request(),
        };

        let mut rng = self.seeder.next_rng();
        Ok(self.engine.synthesize(&request, &mut rng))
    } // end method dispatch
}
