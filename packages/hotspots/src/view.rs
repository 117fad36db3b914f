//! Map center/zoom fitting.

use fire_portal_geography_models::{GeoPoint, MapView};
use geo::{BoundingRect, MultiPoint, Point};

use crate::IncidentPin;

/// Zoom used when everything sits on a single point.
pub const SINGLE_POINT_ZOOM: u8 = 13;
/// Most zoomed-out level a preview will use.
pub const MIN_ZOOM: u8 = 3;
/// Most zoomed-in level a preview will use.
pub const MAX_ZOOM: u8 = 16;

/// Spans below this (in degrees) count as a single point.
const DEGENERATE_SPAN_DEG: f64 = 1e-6;

/// Picks the center and zoom for a department's map preview.
///
/// Centers on the department when its address resolved, otherwise on the
/// middle of the pins' bounding box. The zoom is chosen so every pin fits
/// the view around that center, which for a department center means twice
/// the farthest pin's offset. Returns `None` when there is
/// nothing to show.
#[must_use]
pub fn fit_view(department: Option<GeoPoint>, pins: &[IncidentPin]) -> Option<MapView> {
    let points: Vec<Point<f64>> = department
        .into_iter()
        .chain(pins.iter().map(|p| p.point))
        .map(|p| Point::new(p.lon, p.lat))
        .collect();

    let rect = MultiPoint::from(points).bounding_rect()?;

    let (center, span) = department.map_or_else(
        || {
            let c = rect.center();
            (GeoPoint::new(c.y, c.x), rect.width().max(rect.height()))
        },
        |dept| (dept, 2.0 * max_offset(dept, pins)),
    );

    let zoom = if span < DEGENERATE_SPAN_DEG {
        SINGLE_POINT_ZOOM
    } else {
        zoom_for_span(span)
    };

    Some(MapView { center, zoom })
}

/// Largest latitude or longitude offset of any pin from `center`.
fn max_offset(center: GeoPoint, pins: &[IncidentPin]) -> f64 {
    pins.iter()
        .map(|p| {
            (p.point.lat - center.lat)
                .abs()
                .max((p.point.lon - center.lon).abs())
        })
        .fold(0.0, f64::max)
}

/// Web-mercator zoom whose tile width (360° / 2^z) still covers `span`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn zoom_for_span(span: f64) -> u8 {
    let zoom = (360.0 / span).log2().floor();
    zoom.clamp(f64::from(MIN_ZOOM), f64::from(MAX_ZOOM)) as u8
}

#[cfg(test)]
mod tests {
    use fire_portal_incident_models::IncidentCategory;

    use super::*;

    fn pin_at(id: &str, lat: f64, lon: f64) -> IncidentPin {
        IncidentPin {
            id: id.to_string(),
            label: id.to_string(),
            address: String::new(),
            occurred_at: None,
            point: GeoPoint::new(lat, lon),
            category: IncidentCategory::Fire,
        }
    }

    #[test]
    fn nothing_to_show() {
        assert!(fit_view(None, &[]).is_none());
    }

    #[test]
    fn department_alone_uses_single_point_zoom() {
        let dept = GeoPoint::new(39.95, -75.16);
        assert_eq!(
            fit_view(Some(dept), &[]),
            Some(MapView {
                center: dept,
                zoom: SINGLE_POINT_ZOOM
            })
        );
    }

    #[test]
    fn centers_on_department_when_known() {
        let dept = GeoPoint::new(39.95, -75.16);
        let pins = [pin_at("a", 40.0, -75.0), pin_at("b", 40.1, -75.1)];

        let view = fit_view(Some(dept), &pins).unwrap();

        assert_eq!(view.center, dept);
    }

    #[test]
    fn off_center_pin_stays_in_view() {
        let dept = GeoPoint::new(40.0, -75.0);
        let pins = [pin_at("east", 40.0, -74.0)];

        let view = fit_view(Some(dept), &pins).unwrap();

        // 2 degrees around the department: 360 / 2 = 180, log2 ~ 7.5
        assert_eq!(view.zoom, 7);
        let half_width = 360.0 / f64::from(1_u32 << view.zoom) / 2.0;
        assert!(view.center.lon + half_width >= -74.0);
    }

    #[test]
    fn falls_back_to_pin_bounds_center() {
        let pins = [pin_at("a", 40.0, -75.2), pin_at("b", 40.2, -75.0)];

        let view = fit_view(None, &pins).unwrap();

        assert!((view.center.lat - 40.1).abs() < 1e-9);
        assert!((view.center.lon + 75.1).abs() < 1e-9);
        // 0.2 degrees: 360 / 0.2 = 1800, log2 ~ 10.8
        assert_eq!(view.zoom, 10);
    }

    #[test]
    fn zoom_is_clamped() {
        let wide = [pin_at("a", -60.0, -170.0), pin_at("b", 70.0, 170.0)];
        assert_eq!(fit_view(None, &wide).unwrap().zoom, MIN_ZOOM);

        let tight = [pin_at("a", 40.0, -75.0), pin_at("b", 40.000_01, -75.0)];
        assert_eq!(fit_view(None, &tight).unwrap().zoom, MAX_ZOOM);
    }
}
