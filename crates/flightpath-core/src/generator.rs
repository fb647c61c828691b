//! Candidate route generation.
//!
//! Every candidate shares the origin and destination and differs in how far
//! (and to which side) its intermediate waypoints bow away from the direct
//! great circle.

use crate::error::PlanError;
use crate::geo;
use crate::models::{Airport, Coordinate, ExcludedRegion, PathStyle, PathType, Route, Waypoint};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Total waypoints per route, origin and destination included.
    pub waypoint_count: usize,
    /// Peak lateral offset as a fraction of the direct distance.
    pub side_offset_ratio: f64,
    pub cardinal_offset_ratio: f64,
    pub wide_offset_ratio: f64,
    /// Displaced waypoints land this far outside an excluded region.
    pub exclusion_margin_km: f64,
    pub max_exclusion_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            waypoint_count: 20,
            side_offset_ratio: 0.10,
            cardinal_offset_ratio: 0.15,
            wide_offset_ratio: 0.25,
            exclusion_margin_km: 25.0,
            max_exclusion_attempts: 5,
        }
    }
}

/// Inputs for one generation run.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub origin: Airport,
    pub destination: Airport,
    /// Empty means every style.
    pub styles: Vec<PathStyle>,
    pub exclusions: Vec<ExcludedRegion>,
}

#[derive(Debug, Clone, Default)]
pub struct RouteGenerator {
    config: GeneratorConfig,
}

impl RouteGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Build one candidate per requested style.
    ///
    /// Styles whose waypoints cannot be moved clear of every excluded region
    /// are dropped; if none survive the request is infeasible.
    pub fn generate(&self, request: &GenerationRequest) -> Result<Vec<Route>, PlanError> {
        let origin = request.origin.location;
        let destination = request.destination.location;

        if origin == destination {
            return Err(PlanError::Infeasible(
                "origin and destination are the same point".to_string(),
            ));
        }
        for region in &request.exclusions {
            if region.contains(origin) || region.contains(destination) {
                return Err(PlanError::Infeasible(format!(
                    "excluded region at ({:.4}, {:.4}) covers an endpoint",
                    region.center.lat, region.center.lon
                )));
            }
        }

        let mut styles: Vec<PathStyle> = Vec::new();
        let requested = if request.styles.is_empty() {
            PathStyle::ALL.to_vec()
        } else {
            request.styles.clone()
        };
        for style in requested {
            if !styles.contains(&style) {
                styles.push(style);
            }
        }

        let mut routes = Vec::with_capacity(styles.len());
        for style in styles {
            match self.build_positions(origin, destination, style, &request.exclusions) {
                Some(positions) => {
                    let waypoints = positions
                        .into_iter()
                        .enumerate()
                        .map(|(idx, at)| Waypoint::new(idx as u32 + 1, at))
                        .collect();
                    routes.push(Route::new(
                        request.origin.clone(),
                        request.destination.clone(),
                        waypoints,
                        PathType::Generated(style),
                    ));
                }
                None => {
                    tracing::debug!("Discarding {} candidate: excluded region could not be cleared", style);
                }
            }
        }

        if routes.is_empty() {
            return Err(PlanError::Infeasible(
                "every candidate style crosses an excluded region".to_string(),
            ));
        }
        Ok(routes)
    }

    fn build_positions(
        &self,
        origin: Coordinate,
        destination: Coordinate,
        style: PathStyle,
        exclusions: &[ExcludedRegion],
    ) -> Option<Vec<Coordinate>> {
        let count = self.config.waypoint_count.max(2);
        let direct_km = geo::distance(origin, destination);
        let course = geo::bearing(origin, destination);

        let mut positions = Vec::with_capacity(count);
        positions.push(origin);

        for idx in 1..count - 1 {
            let fraction = idx as f64 / (count - 1) as f64;
            let base = geo::along_great_circle(origin, destination, fraction);
            let (ratio, side) = self.lateral_offset(style, idx, course);
            let magnitude = ratio * direct_km * (PI * fraction).sin();
            let point = geo::destination_point(base, magnitude, side);
            positions.push(self.clear_exclusions(point, exclusions)?);
        }

        positions.push(destination);
        Some(positions)
    }

    /// Offset ratio and bearing of the displacement for one waypoint.
    fn lateral_offset(&self, style: PathStyle, idx: usize, course: f64) -> (f64, f64) {
        let left = geo::normalize_degrees(course - 90.0);
        let right = geo::normalize_degrees(course + 90.0);
        let northward = |bearing: f64| bearing.to_radians().cos();

        match style {
            PathStyle::Direct => (0.0, course),
            PathStyle::Left => (self.config.side_offset_ratio, left),
            PathStyle::Right => (self.config.side_offset_ratio, right),
            PathStyle::North => {
                // East-west courses have a clear northern side; on north-south
                // courses both perpendiculars tie and left is used.
                let side = if northward(right) > northward(left) + 1e-9 { right } else { left };
                (self.config.cardinal_offset_ratio, side)
            }
            PathStyle::South => {
                let side = if northward(left) < northward(right) - 1e-9 { left } else { right };
                (self.config.cardinal_offset_ratio, side)
            }
            PathStyle::Wide => {
                let side = if idx % 2 == 1 { left } else { right };
                (self.config.wide_offset_ratio, side)
            }
        }
    }

    /// Push a point out of any excluded region it falls in.
    fn clear_exclusions(&self, mut point: Coordinate, exclusions: &[ExcludedRegion]) -> Option<Coordinate> {
        for _ in 0..self.config.max_exclusion_attempts {
            let Some(region) = exclusions.iter().find(|region| region.contains(point)) else {
                return Some(point);
            };
            let away = geo::bearing(region.center, point);
            point = geo::destination_point(
                region.center,
                region.radius_km + self.config.exclusion_margin_km,
                away,
            );
        }

        if exclusions.iter().any(|region| region.contains(point)) {
            None
        } else {
            Some(point)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn airport(code: &str, lat: f64, lon: f64) -> Airport {
        Airport {
            code: code.to_string(),
            name: code.to_string(),
            city: String::new(),
            location: Coordinate::new(lat, lon),
            elevation_m: 0.0,
            timezone: String::new(),
        }
    }

    fn request(exclusions: Vec<ExcludedRegion>) -> GenerationRequest {
        GenerationRequest {
            origin: airport("DEL", 28.5562, 77.1000),
            destination: airport("BOM", 19.0896, 72.8656),
            styles: Vec::new(),
            exclusions,
        }
    }

    #[test]
    fn test_generates_every_style_with_fixed_endpoints() {
        let generator = RouteGenerator::default();
        let routes = generator.generate(&request(Vec::new())).expect("routes");
        assert_eq!(routes.len(), PathStyle::ALL.len());

        for route in &routes {
            assert_eq!(route.waypoints.len(), 20);
            assert_eq!(route.waypoints[0].position, route.origin.location);
            assert_eq!(
                route.waypoints.last().map(|wp| wp.position),
                Some(route.destination.location)
            );
            assert!(route.reroute_history.is_empty());
            let sequences: Vec<u32> = route.waypoints.iter().map(|wp| wp.sequence).collect();
            assert_eq!(sequences, (1..=20).collect::<Vec<u32>>());
        }
    }

    #[test]
    fn test_styles_are_geometrically_distinct() {
        let generator = RouteGenerator::default();
        let routes = generator.generate(&request(Vec::new())).expect("routes");
        let midpoint = |style: PathStyle| {
            routes
                .iter()
                .find(|route| route.path_type == PathType::Generated(style))
                .map(|route| route.waypoints[10].position)
                .expect("style present")
        };

        let direct = midpoint(PathStyle::Direct);
        let left = midpoint(PathStyle::Left);
        let right = midpoint(PathStyle::Right);
        assert!(geo::distance(direct, left) > 50.0);
        assert!(geo::distance(direct, right) > 50.0);
        assert!(geo::distance(left, right) > 100.0);

        // DEL-BOM runs roughly south-west, so the north side is the right side.
        assert!(midpoint(PathStyle::North).lat > direct.lat);
        assert!(midpoint(PathStyle::South).lat < direct.lat);
    }

    #[test]
    fn test_requested_styles_are_deduplicated() {
        let generator = RouteGenerator::default();
        let mut req = request(Vec::new());
        req.styles = vec![PathStyle::Left, PathStyle::Left, PathStyle::Direct];
        let routes = generator.generate(&req).expect("routes");
        let tags: Vec<String> = routes.iter().map(|r| r.path_type.to_string()).collect();
        assert_eq!(tags, vec!["left", "direct"]);
    }

    #[test]
    fn test_exclusion_is_never_violated() {
        let generator = RouteGenerator::default();
        let center = geo::along_great_circle(
            Coordinate::new(28.5562, 77.1000),
            Coordinate::new(19.0896, 72.8656),
            0.5,
        );
        let region = ExcludedRegion {
            center,
            radius_km: 80.0,
        };
        let routes = generator.generate(&request(vec![region])).expect("routes");
        assert!(!routes.is_empty());
        for route in &routes {
            for wp in &route.waypoints {
                assert!(
                    !region.contains(wp.position),
                    "{} waypoint {} inside exclusion",
                    route.path_type,
                    wp.sequence
                );
            }
        }
    }

    #[test]
    fn test_exclusion_over_endpoint_is_infeasible() {
        let generator = RouteGenerator::default();
        let region = ExcludedRegion {
            center: Coordinate::new(28.5562, 77.1000),
            radius_km: 10.0,
        };
        let result = generator.generate(&request(vec![region]));
        assert!(matches!(result, Err(PlanError::Infeasible(_))));
    }

    #[test]
    fn test_unclearable_style_is_discarded() {
        let config = GeneratorConfig {
            max_exclusion_attempts: 0,
            ..GeneratorConfig::default()
        };
        let generator = RouteGenerator::new(config);
        let center = geo::along_great_circle(
            Coordinate::new(28.5562, 77.1000),
            Coordinate::new(19.0896, 72.8656),
            0.5,
        );
        let region = ExcludedRegion {
            center,
            radius_km: 60.0,
        };
        let mut req = request(vec![region]);
        req.styles = vec![PathStyle::Direct];
        let result = generator.generate(&req);
        assert!(matches!(result, Err(PlanError::Infeasible(_))));

        // The wide offsets clear the same region without any displacement.
        req.styles = vec![PathStyle::Direct, PathStyle::Wide];
        let routes = generator.generate(&req).expect("wide survives");
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path_type, PathType::Generated(PathStyle::Wide));
    }
}
