use chrono::{Days, NaiveDate};
use rand::{Rng, seq::SliceRandom};

use crate::{AirportCode, FareguardError, FlightQuery};

/// Produces plausible random queries for the harness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryGenerator {
    airports: Vec<AirportCode>,
    days_ahead: u64,
    min_price: (i64, i64),
    max_price: (i64, i64),
    categories: Vec<String>,
}

impl QueryGenerator {
    /// Generator over `airports`. At least two distinct codes are needed so
    /// origin and destination can differ.
    pub fn new(airports: Vec<AirportCode>) -> Result<Self, FareguardError> {
        let mut distinct = airports.clone();
        distinct.sort();
        distinct.dedup();
        if distinct.len() < 2 {
            return Err(FareguardError::InvalidAirportCode(
                "Query generator needs at least two distinct airports".to_string(),
            ));
        }

        Ok(Self {
            airports: distinct,
            ..Self::default()
        })
    }

    /// Generate one query for a travel date between `today` and 30 days out.
    ///
    /// The category is drawn uniformly from `promo`, `normal`, `peak` and
    /// "none", so it is omitted about a quarter of the time.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R, today: NaiveDate) -> FlightQuery {
        let origin = self.airports.choose(rng).map(|code| code.to_string());
        let destination = self
            .airports
            .iter()
            .filter(|code| Some(code.to_string()) != origin)
            .collect::<Vec<_>>()
            .choose(rng)
            .map(|code| code.to_string());

        let date = today
            .checked_add_days(Days::new(rng.gen_range(0..=self.days_ahead)))
            .unwrap_or(today);

        // one extra slot past the end stands for "no category"
        let category = self
            .categories
            .get(rng.gen_range(0..=self.categories.len()))
            .cloned();

        FlightQuery {
            origin,
            destination,
            date: Some(date.format("%Y-%m-%d").to_string()),
            category,
            min_price: Some(rng.gen_range(self.min_price.0..=self.min_price.1).to_string()),
            max_price: Some(rng.gen_range(self.max_price.0..=self.max_price.1).to_string()),
        }
    } // end method generate
}

impl Default for QueryGenerator {
    /// TPE, NRT, KIX, SIN, BKK; min price 1000 to 5000; max price 8000 to 15000.
    fn default() -> Self {
        let airports = ["TPE", "NRT", "KIX", "SIN", "BKK"]
            .into_iter()
            .filter_map(|code| AirportCode::try_from(code).ok())
            .collect();

        Self {
            airports,
            days_ahead: 30,
            min_price: (1000, 5000),
            max_price: (8000, 15000),
            categories: ["promo", "normal", "peak"].map(str::to_string).to_vec(),
        }
    }
}
