//! Coarse 10-degree geographic tiling used as object-store key prefixes.

use std::collections::BTreeSet;

/// Map a point to its 10x10 degree region label, e.g. `N60W120`.
///
/// The hemisphere letter comes from the coordinate's sign bit rather than a
/// comparison against zero, so `-0.0` lands in the southern/western
/// hemisphere and round-trips the same label every time. Latitude 90 is
/// clamped into the 80 bin (the poles have no 90 bin) and longitude
/// magnitudes of 180 or more back off to the 170 bin at the dateline.
pub fn point_to_region(lat: f64, lon: f64) -> String {
    let ns = if lat.is_sign_negative() { 'S' } else { 'N' };
    let ew = if lon.is_sign_negative() { 'W' } else { 'E' };

    let mut region_lat = 10 * (lat.abs() / 10.0).trunc() as u32;
    if region_lat == 90 {
        region_lat = 80;
    }

    let mut region_lon = 10 * (lon.abs() / 10.0).trunc() as u32;
    if region_lon >= 180 {
        region_lon = 170;
    }

    format!("{}{:02}{}{:03}", ns, region_lat, ew, region_lon)
}

/// Every region label covering a bounding box, upper edge inclusive.
///
/// Used to bound an object-store prefix search without scanning the whole
/// bucket; the set is small because product footprints span at most a few
/// regions.
pub fn regions_from_bounds(
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
) -> BTreeSet<String> {
    let mut regions = BTreeSet::new();
    for lat in grid_points(min_lat, max_lat) {
        for lon in grid_points(min_lon, max_lon) {
            regions.insert(point_to_region(lat, lon));
        }
    }
    regions
}

/// The endpoints of `[min, max]` plus every 10-degree multiple between them.
fn grid_points(min: f64, max: f64) -> Vec<f64> {
    let mut points = vec![min];
    let mut grid = (min / 10.0).ceil() * 10.0;
    while grid <= max {
        points.push(grid);
        grid += 10.0;
    }
    if points.last() != Some(&max) {
        points.push(max);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_to_region() {
        assert_eq!(point_to_region(63.0, 128.0), "N60E120");
        assert_eq!(point_to_region(-63.0, -128.0), "S60W120");
        assert_eq!(point_to_region(5.0, -5.0), "N00W000");
    }

    #[test]
    fn test_negative_zero_uses_sign_bit() {
        assert_eq!(point_to_region(-0.0, 0.0), "S00E000");
        assert_eq!(point_to_region(0.0, -0.0), "N00W000");
    }

    #[test]
    fn test_pole_and_dateline_clamping() {
        assert_eq!(point_to_region(90.0, 0.0), "N80E000");
        assert_eq!(point_to_region(-90.0, 0.0), "S80E000");
        assert_eq!(point_to_region(0.0, 180.0), "N00E170");
        assert_eq!(point_to_region(0.0, -180.0), "N00W170");
    }

    #[test]
    fn test_totality_over_valid_range() {
        let mut lat = -90.0;
        while lat <= 90.0 {
            let mut lon = -180.0;
            while lon <= 180.0 {
                let label = point_to_region(lat, lon);
                assert_eq!(label.len(), 7, "bad label {} for ({}, {})", label, lat, lon);
                lon += 2.5;
            }
            lat += 2.5;
        }
    }

    #[test]
    fn test_regions_from_bounds() {
        let regions = regions_from_bounds(-128.0, -63.0, -109.0, -54.0);
        let expected: BTreeSet<String> = [
            "S60W120", "S60W110", "S60W100", "S50W120", "S50W110", "S50W100",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(regions, expected);
    }

    #[test]
    fn test_regions_from_bounds_single_cell() {
        let regions = regions_from_bounds(121.0, 61.0, 123.0, 62.0);
        assert_eq!(regions.len(), 1);
        assert!(regions.contains("N60E120"));
    }
}
