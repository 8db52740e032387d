//! Great-circle distance and the ZIP geocoding seam.

use crate::pipeline::GeoPoint;
use std::collections::HashMap;

const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Resolves a ZIP code to coordinates. Lookups are expected to be local and
/// fast; `None` means the ZIP is unknown.
pub trait Geocoder: Send + Sync + std::fmt::Debug {
    fn locate(&self, zip_code: &str) -> Option<GeoPoint>;
}

/// In-memory ZIP table
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    points: HashMap<String, GeoPoint>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_zip(mut self, zip_code: impl Into<String>, point: GeoPoint) -> Self {
        self.points.insert(zip_code.into(), point);
        self
    }
}

impl Geocoder for StaticGeocoder {
    fn locate(&self, zip_code: &str) -> Option<GeoPoint> {
        self.points.get(zip_code).copied()
    }
}
