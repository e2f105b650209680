//! Viewport geometry: visible map regions and the bounding boxes derived
//! from them.

use serde::{Deserialize, Serialize};

/// Edge tolerance, in degrees, under which two bounding boxes are treated as
/// the same query (roughly 50m at mid-latitudes).
pub const NEAR_IDENTICAL_EPSILON: f64 = 0.0005;

/// Clamp a latitude into `[-90, 90]`.
pub fn clamp_latitude(lat: f64) -> f64 {
    lat.clamp(-90.0, 90.0)
}

/// Normalize a longitude into `(-180, 180]`.
pub fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 { 180.0 } else { wrapped }
}

/// Rectangular lat/lon query region.
///
/// Latitudes are clamped and longitudes normalized independently, so a box
/// crossing the antimeridian has `west > east`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    /// Build a box from raw edges, clamping and normalizing each one.
    ///
    /// South and north are swapped if they arrive inverted so that
    /// `south <= north` always holds.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        let (south, north) = {
            let s = clamp_latitude(south);
            let n = clamp_latitude(north);
            if s <= n { (s, n) } else { (n, s) }
        };
        Self {
            south,
            west: normalize_longitude(west),
            north,
            east: normalize_longitude(east),
        }
    }

    /// Every edge differs from `other` by strictly less than `epsilon`.
    pub fn is_near_identical(&self, other: &BoundingBox, epsilon: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() < epsilon;
        close(self.south, other.south)
            && close(self.west, other.west)
            && close(self.north, other.north)
            && close(self.east, other.east)
    }

    /// Whether the box wraps across the antimeridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        if lat < self.south || lat > self.north {
            return false;
        }
        let lon = normalize_longitude(lon);
        if self.crosses_antimeridian() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }

    /// Query parameters in the backend's `swlat/swlng/nelat/nelng` naming.
    pub fn query_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("swlat", self.south.to_string()),
            ("swlng", self.west.to_string()),
            ("nelat", self.north.to_string()),
            ("nelng", self.east.to_string()),
        ]
    }
}

/// Visible map region as reported by the map widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportSnapshot {
    pub center_lat: f64,
    pub center_lon: f64,
    pub span_lat: f64,
    pub span_lon: f64,
}

impl ViewportSnapshot {
    pub fn new(
        center_lat: f64,
        center_lon: f64,
        span_lat: f64,
        span_lon: f64,
    ) -> Self {
        Self {
            center_lat,
            center_lon,
            span_lat,
            span_lon,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let half_lat = self.span_lat.abs() / 2.0;
        let half_lon = self.span_lon.abs() / 2.0;
        BoundingBox::new(
            self.center_lat - half_lat,
            self.center_lon - half_lon,
            self.center_lat + half_lat,
            self.center_lon + half_lon,
        )
    }

    pub fn is_near_identical(
        &self,
        other: &ViewportSnapshot,
        epsilon: f64,
    ) -> bool {
        self.bounding_box()
            .is_near_identical(&other.bounding_box(), epsilon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longitude_normalization_wraps_into_half_open_range() {
        assert_eq!(normalize_longitude(0.0), 0.0);
        assert_eq!(normalize_longitude(180.0), 180.0);
        assert_eq!(normalize_longitude(-180.0), 180.0);
        assert!((normalize_longitude(190.0) - -170.0).abs() < 1e-9);
        assert!((normalize_longitude(-190.0) - 170.0).abs() < 1e-9);
        assert!((normalize_longitude(540.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn snapshot_derives_clamped_box() {
        let snap = ViewportSnapshot::new(89.0, 139.7, 4.0, 0.5);
        let bbox = snap.bounding_box();
        assert_eq!(bbox.north, 90.0);
        assert!((bbox.south - 87.0).abs() < 1e-9);
        assert!((bbox.west - 139.45).abs() < 1e-9);
        assert!((bbox.east - 139.95).abs() < 1e-9);
        assert!(bbox.south <= bbox.north);
    }

    #[test]
    fn box_spanning_antimeridian_wraps_east_edge() {
        let bbox = ViewportSnapshot::new(0.0, 179.0, 2.0, 4.0).bounding_box();
        assert!((bbox.west - 177.0).abs() < 1e-9);
        assert!((bbox.east - -179.0).abs() < 1e-9);
        assert!(bbox.crosses_antimeridian());
        assert!(bbox.contains(0.5, 179.5));
        assert!(bbox.contains(0.5, -179.5));
        assert!(!bbox.contains(0.5, 170.0));
    }

    #[test]
    fn near_identical_uses_strict_epsilon_per_edge() {
        let a = BoundingBox::new(35.0, 139.0, 36.0, 140.0);
        let b = BoundingBox::new(35.0004, 139.0004, 36.0004, 140.0004);
        let c = BoundingBox::new(35.0, 139.0, 36.0, 140.0006);
        assert!(a.is_near_identical(&b, NEAR_IDENTICAL_EPSILON));
        assert!(!a.is_near_identical(&c, NEAR_IDENTICAL_EPSILON));
    }

    #[test]
    fn inverted_latitudes_are_reordered() {
        let bbox = BoundingBox::new(10.0, 0.0, -10.0, 1.0);
        assert_eq!(bbox.south, -10.0);
        assert_eq!(bbox.north, 10.0);
    }
}
