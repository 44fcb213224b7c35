use std::collections::HashSet;

use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{
    Category, CategoryAliases, FareguardError, MAX_DENSITY_PER_REQUEST, PRICE_STEP, PriceCatalog,
    PriceRange, rng::stream_rng,
};

/// Carrier code and display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Airline {
    /// Two-letter carrier prefix used in flight codes.
    pub code: String,
    /// Display name.
    pub name: String,
}

impl Airline {
    /// Creates a roster entry.
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

/// The carriers used when no roster is configured.
pub fn default_airlines() -> Vec<Airline> {
    [
        ("CI", "China Airlines"),
        ("BR", "EVA Air"),
        ("JX", "Starlux"),
        ("TG", "Thai Airways"),
        ("JL", "Japan Airlines"),
        ("SQ", "Singapore Airlines"),
        ("TR", "Scoot"),
        ("IT", "Tigerair Taiwan"),
    ]
    .into_iter()
    .map(|(code, name)| Airline::new(code, name))
    .collect()
}

/// Daytime window for departures, as whole hours. Times fall on `:00` or `:30`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartureWindow {
    /// First departure hour (inclusive).
    pub first_hour: u8,
    /// Last departure hour (inclusive).
    pub last_hour: u8,
}

impl Default for DepartureWindow {
    /// 07:00 to 21:30.
    fn default() -> Self {
        Self {
            first_hour: 7,
            last_hour: 21,
        }
    }
}

/// Caller price bounds. Absent bounds default to `[0, 99999]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceBounds {
    /// Lowest acceptable price.
    pub min: i64,
    /// Highest acceptable price.
    pub max: i64,
}

impl PriceBounds {
    /// Default lower bound.
    pub const DEFAULT_MIN: i64 = 0;
    /// Default upper bound.
    pub const DEFAULT_MAX: i64 = 99_999;

    /// Bounds as given; an inverted pair simply matches nothing.
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    fn intersect(&self, range: &PriceRange) -> Option<PriceRange> {
        let lo = self.min.max(range.min());
        let hi = self.max.min(range.max());
        PriceRange::new(lo, hi).ok()
    }
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self {
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}

/// Origin, destination and travel date of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConstraint {
    /// Departure airport code.
    pub origin: String,
    /// Arrival airport code.
    pub destination: String,
    /// Travel date, echoed verbatim into every record.
    pub date: String,
}

/// One call's worth of constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    /// Route and date. `None` produces no records.
    pub route: Option<RouteConstraint>,
    /// Requested category or alias, as sent by the caller.
    pub category: Option<String>,
    /// Caller price bounds.
    pub bounds: PriceBounds,
    /// Number of slots to attempt.
    pub count: u32,
}

/// A synthetic flight offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// `<carrier>-<3 digits>`, unique within one call.
    pub flight: String,
    /// Carrier display name.
    pub airline: String,
    /// Departure airport.
    #[serde(rename = "from")]
    pub origin: String,
    /// Arrival airport.
    #[serde(rename = "to")]
    pub destination: String,
    /// Travel date.
    pub date: String,
    /// `HH:MM`, on a half-hour boundary.
    pub time: String,
    /// Multiple of 100.
    pub price: i64,
    /// Resolved category.
    #[serde(rename = "type")]
    pub category: Category,
}

/// Static inputs of a [`SynthesisEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOptions {
    /// Price envelopes.
    #[serde(default)]
    pub prices: PriceCatalog,
    /// Category labels.
    #[serde(default = "default_aliases")]
    pub aliases: CategoryAliases,
    /// Carrier roster.
    #[serde(default = "default_airlines")]
    pub airlines: Vec<Airline>,
    /// Departure hours.
    #[serde(default)]
    pub departures: DepartureWindow,
}

/// `Economy -> normal`, `Saver -> promo`, `Flex -> peak`.
pub fn default_aliases() -> CategoryAliases {
    CategoryAliases::empty()
        .with_alias("Economy", Category::Normal)
        .with_alias("Saver", Category::Promo)
        .with_alias("Flex", Category::Peak)
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            prices: PriceCatalog::default(),
            aliases: default_aliases(),
            airlines: default_airlines(),
            departures: DepartureWindow::default(),
        }
    }
}

/// Constraint-driven generator of synthetic flight records.
///
/// Holds only read-only tables; every call brings its own generator, so one
/// engine can serve any number of threads.
///
/// # Algorithm
///
/// For each of the `count` slots:
///
/// 1. **Category:** alias, else canonical name, else uniform draw
/// 2. **Envelope:** route table, else default table, else fallback range
/// 3. **Intersect** with caller bounds; an empty intersection skips the slot
/// 4. **Price:** uniform over the multiples of 100 inside the intersection;
///    an intersection holding none (for example `[9010, 9090]`) skips the
///    slot as well
/// 5. **Decorate:** carrier, call-unique number, half-hour departure
///
/// Prices therefore always stay inside the caller's bounds. The result is
/// sorted by ascending price and is shorter than `count` exactly when some
/// slot's intersection was empty or held no multiple of 100.
#[derive(Debug, Clone)]
pub struct SynthesisEngine {
    prices: PriceCatalog,
    aliases: CategoryAliases,
    airlines: Vec<Airline>,
    departures: DepartureWindow,
}

impl SynthesisEngine {
    /// Validates the roster and departure window.
    pub fn new(options: SynthesisOptions) -> Result<Self, FareguardError> {
        if options.airlines.is_empty() {
            return Err(FareguardError::InvalidSchedule(
                "Airline roster must not be empty".to_string(),
            ));
        }

        let DepartureWindow {
            first_hour,
            last_hour,
        } = options.departures;
        if first_hour > last_hour || last_hour > 23 {
            return Err(FareguardError::InvalidSchedule(format!(
                "Departure window {first_hour}..={last_hour} is not a valid hour range"
            )));
        }

        Ok(Self {
            prices: options.prices,
            aliases: options.aliases,
            airlines: options.airlines,
            departures: options.departures,
        })
    }

    /// Price catalog in use.
    pub fn prices(&self) -> &PriceCatalog {
        &self.prices
    }

    /// Category for a caller-supplied value.
    pub fn resolve_category<R: Rng + ?Sized>(&self, requested: Option<&str>, rng: &mut R) -> Category {
        requested
            .and_then(|raw| self.aliases.resolve(raw))
            .unwrap_or_else(|| Category::random(rng))
    }

    /// Generate up to `request.count` records.
    ///
    /// At most [`MAX_DENSITY_PER_REQUEST`] slots are attempted per call, since
    /// flight numbers must stay unique within the call.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        request: &SynthesisRequest,
        rng: &mut R,
    ) -> Vec<FlightRecord> {
        let Some(route) = &request.route else {
            return Vec::new();
        };

        let slots = request.count.min(MAX_DENSITY_PER_REQUEST);
        let mut numbers: HashSet<u16> = HashSet::with_capacity(slots as usize);
        let mut records = Vec::with_capacity(slots as usize);

        for _ in 0..slots {
            let category = self.resolve_category(request.category.as_deref(), rng);
            let envelope = self
                .prices
                .range_for(&route.origin, &route.destination, category);

            let Some((first, last)) = request
                .bounds
                .intersect(&envelope)
                .and_then(|window| window.step_bounds())
            else {
                continue;
            };

            let price = rng.gen_range(first..=last) * PRICE_STEP;
            let airline = self.pick_airline(rng);
            let number = loop {
                let candidate = rng.gen_range(100..=999u16);
                if numbers.insert(candidate) {
                    break candidate;
                }
            };

            records.push(FlightRecord {
                flight: format!("{}-{number}", airline.code),
                airline: airline.name.clone(),
                origin: route.origin.clone(),
                destination: route.destination.clone(),
                date: route.date.clone(),
                time: self.departure_time(rng),
                price,
                category,
            });
        }

        records.sort_by_key(|record| record.price);
        records
    } // end method synthesize

    /// [`synthesize`](Self::synthesize) with a fresh generator seeded from `seed`.
    pub fn synthesize_seeded(&self, request: &SynthesisRequest, seed: u64) -> Vec<FlightRecord> {
        let mut rng = stream_rng(seed, 0);
        self.synthesize(request, &mut rng)
    }

    fn pick_airline<R: Rng + ?Sized>(&self, rng: &mut R) -> &Airline {
        // roster is non-empty, checked in `new`
        match self.airlines.choose(rng) {
            Some(airline) => airline,
            None => &self.airlines[0],
        }
    }

    fn departure_time<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let hour = rng.gen_range(self.departures.first_hour..=self.departures.last_hour);
        let minute = if rng.gen_bool(0.5) { 0 } else { 30 };
        format!("{hour:02}:{minute:02}")
    }
}
