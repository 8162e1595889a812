//! Server-owned reference data: weather and market prices

use serde::{Deserialize, Serialize};

use super::record::{Collection, Record, RecordKey};

/// Key of the single stored weather snapshot
pub const CURRENT_WEATHER_ID: &str = "current";

/// Direction of a price movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

/// Latest known price for one crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPrice {
    pub crop: String,
    pub price: f64,
    pub unit: String,
    pub trend: Trend,
    /// Signed percentage label, e.g. "+5%"
    pub change: String,
    /// When the price was stored locally (Unix ms)
    #[serde(default)]
    pub timestamp: i64,
}

impl Record for MarketPrice {
    const COLLECTION: Collection = Collection::MarketPrices;

    fn key(&self) -> RecordKey {
        RecordKey::Text(self.crop.clone())
    }
}

/// Weather as reported by the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: String,
    pub forecast: String,
}

impl WeatherReport {
    /// Stamp the report as the current local snapshot
    pub fn into_snapshot(self, timestamp: i64) -> WeatherSnapshot {
        WeatherSnapshot {
            id: CURRENT_WEATHER_ID.to_string(),
            temperature: self.temperature,
            humidity: self.humidity,
            rainfall: self.rainfall,
            forecast: self.forecast,
            timestamp,
        }
    }
}

/// The locally cached weather, always stored under [`CURRENT_WEATHER_ID`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherSnapshot {
    pub id: String,
    pub temperature: f64,
    pub humidity: f64,
    pub rainfall: String,
    pub forecast: String,
    pub timestamp: i64,
}

impl Record for WeatherSnapshot {
    const COLLECTION: Collection = Collection::Weather;

    fn key(&self) -> RecordKey {
        RecordKey::Text(self.id.clone())
    }
}

/// Weather served by the stand-in remote service and the in-process mock
pub fn seed_weather() -> WeatherReport {
    WeatherReport {
        temperature: 24.0,
        humidity: 68.0,
        rainfall: "Light rain expected".to_string(),
        forecast: "Partly cloudy with occasional showers".to_string(),
    }
}

/// Market prices served by the stand-in remote service and the in-process mock
pub fn seed_market_prices() -> Vec<MarketPrice> {
    [
        ("Maize", 45.0, "per 90kg bag", Trend::Up, "+5%"),
        ("Beans", 120.0, "per 90kg bag", Trend::Up, "+8%"),
        ("Tomatoes", 80.0, "per crate", Trend::Down, "-3%"),
        ("Onions", 60.0, "per 50kg bag", Trend::Up, "+12%"),
    ]
    .into_iter()
    .map(|(crop, price, unit, trend, change)| MarketPrice {
        crop: crop.to_string(),
        price,
        unit: unit.to_string(),
        trend,
        change: change.to_string(),
        timestamp: 0,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn market_price_is_keyed_by_crop() {
        let prices = seed_market_prices();
        assert_eq!(prices.len(), 4);
        assert_eq!(prices[0].key(), RecordKey::Text("Maize".into()));

        let value = serde_json::to_value(&prices[2]).unwrap();
        assert_eq!(value["trend"], "down");
        assert_eq!(value["change"], "-3%");
    }

    #[test]
    fn market_price_timestamp_defaults_when_missing() {
        let price: MarketPrice = serde_json::from_str(
            r#"{"crop":"Maize","price":45,"unit":"per 90kg bag","trend":"up","change":"+5%"}"#,
        )
        .unwrap();
        assert_eq!(price.timestamp, 0);
    }

    #[test]
    fn weather_report_becomes_current_snapshot() {
        let snapshot = seed_weather().into_snapshot(1_000);
        assert_eq!(snapshot.id, CURRENT_WEATHER_ID);
        assert_eq!(snapshot.temperature, 24.0);
        assert_eq!(snapshot.timestamp, 1_000);
    }
}
