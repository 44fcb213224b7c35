use std::{collections::HashMap, fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fare class used to pick a price envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Discounted fares.
    Promo,
    /// Regular fares.
    Normal,
    /// High-season fares.
    Peak,
}

impl Category {
    /// Every category, in draw order.
    pub const ALL: [Category; 3] = [Category::Promo, Category::Normal, Category::Peak];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Promo => "promo",
            Category::Normal => "normal",
            Category::Peak => "peak",
        }
    }

    /// Uniform draw over [`Category::ALL`].
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "promo" => Ok(Category::Promo),
            "normal" => Ok(Category::Normal),
            "peak" => Ok(Category::Peak),
            _ => Err(()),
        }
    }
}

/// Human-facing labels mapped to canonical categories.
///
/// Labels match case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryAliases {
    labels: HashMap<String, Category>,
}

impl CategoryAliases {
    /// Empty table: only canonical names resolve.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Adds `label -> category`.
    pub fn with_alias(mut self, label: &str, category: Category) -> Self {
        self.labels.insert(normalize(label), category);
        self
    }

    /// Alias first, then canonical name.
    pub fn resolve(&self, raw: &str) -> Option<Category> {
        self.labels
            .get(&normalize(raw))
            .copied()
            .or_else(|| raw.parse().ok())
    }

    /// Number of aliases.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// `true` when no alias is configured.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

impl FromIterator<(String, Category)> for CategoryAliases {
    fn from_iter<T: IntoIterator<Item = (String, Category)>>(iter: T) -> Self {
        Self {
            labels: iter
                .into_iter()
                .map(|(label, category)| (normalize(&label), category))
                .collect(),
        }
    }
}

impl Serialize for CategoryAliases {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.labels.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CategoryAliases {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let labels = HashMap::<String, Category>::deserialize(deserializer)?;
        Ok(labels.into_iter().collect())
    }
}
