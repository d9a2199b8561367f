//! Gazetteer: canonical coordinates for known places and company headquarters.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::article::GeoRef;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KnownLocation {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "countryCode", default)]
    pub country_code: String,
}

impl KnownLocation {
    fn to_geo(&self) -> GeoRef {
        GeoRef {
            name: self.name.clone(),
            lat: self.lat,
            lon: self.lon,
            country_code: self.country_code.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GeoMapFile {
    #[serde(default)]
    known_locations: HashMap<String, KnownLocation>,
    #[serde(default)]
    company_hq: HashMap<String, String>,
}

/// The rewriter's free-text location guess.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoGuess {
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub country_code: Option<String>,
}

impl GeoGuess {
    /// Lenient conversion from the model's `geo` value. Non-objects (including `null`) yield `None`.
    /// Coordinates may arrive as numbers or numeric strings.
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let num = |key: &str| match obj.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        Some(Self {
            name: obj
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            lat: num("lat").filter(|x| x.is_finite()),
            lon: num("lon").filter(|x| x.is_finite()),
            country_code: obj
                .get("countryCode")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    locations: HashMap<String, KnownLocation>,
    /// Location keys, longest first, so the most specific key wins.
    location_keys: Vec<String>,
    /// (company, location key), longest company name first.
    companies: Vec<(String, String)>,
}

impl Gazetteer {
    pub fn new(
        locations: HashMap<String, KnownLocation>,
        company_hq: HashMap<String, String>,
    ) -> Self {
        let mut location_keys: Vec<String> = locations.keys().cloned().collect();
        location_keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut companies: Vec<(String, String)> = company_hq.into_iter().collect();
        companies.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Self {
            locations,
            location_keys,
            companies,
        }
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let file: GeoMapFile = serde_json::from_str(s).context("parsing geo map json")?;
        Ok(Self::new(file.known_locations, file.company_hq))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("reading geo map from {}", path.display()))?;
        Self::from_json(&s)
    }

    /// Like [`Gazetteer::from_path`] but never fails: a missing or corrupt file yields an empty gazetteer.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::from_path(path) {
            Ok(g) => g,
            Err(e) => {
                tracing::warn!(error = ?e, path = %path.display(), "geo map unavailable, using empty gazetteer");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.companies.is_empty()
    }

    /// Prompt hint listing known places and company HQs.
    pub fn hint(&self) -> String {
        let mut names: Vec<&str> = self.location_keys.iter().map(String::as_str).collect();
        names.sort_unstable();
        let mut companies: Vec<String> = self
            .companies
            .iter()
            .map(|(c, k)| format!("{c} -> {k}"))
            .collect();
        companies.sort_unstable();
        format!(
            "Known locations: {}\nKnown company HQs: {}",
            names.join(", "),
            companies.join(", ")
        )
    }

    /// Resolve a guess to a location. Precedence: known location key in the name,
    /// then known company in the name (mapped through its HQ), then the guess's own
    /// coordinates, else nothing.
    pub fn resolve(&self, guess: &GeoGuess) -> Option<GeoRef> {
        let name = guess.name.to_lowercase();

        if let Some(loc) = self
            .location_keys
            .iter()
            .find(|k| name.contains(&k.to_lowercase()))
            .and_then(|k| self.locations.get(k))
        {
            return Some(loc.to_geo());
        }

        if let Some(loc) = self
            .companies
            .iter()
            .filter(|(company, _)| name.contains(&company.to_lowercase()))
            .find_map(|(_, key)| self.locations.get(key))
        {
            return Some(loc.to_geo());
        }

        match (guess.lat, guess.lon) {
            (Some(lat), Some(lon)) => Some(GeoRef {
                name: if guess.name.is_empty() {
                    "Unknown".to_string()
                } else {
                    guess.name.clone()
                },
                lat,
                lon,
                country_code: guess.country_code.clone().unwrap_or_default(),
            }),
            _ => None,
        }
    }
}
