//! Geographic coordinates.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair.
///
/// The backend expects plain decimal degrees; no projection or precision
/// handling happens client-side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lng: f64,
}

impl Coordinates {
    /// Create a new coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_serde() {
        let coords = Coordinates::new(12.9716, 77.5946);
        let json = serde_json::to_string(&coords).unwrap();
        assert_eq!(json, r#"{"lat":12.9716,"lng":77.5946}"#);

        let back: Coordinates = serde_json::from_str(&json).unwrap();
        assert_eq!(back, coords);
    }
}
