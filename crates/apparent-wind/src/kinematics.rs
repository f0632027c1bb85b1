//! Speed and course-over-ground derivation for raw fix series.

use time::OffsetDateTime;

use crate::{
    errors::InputError,
    geodesy::{haversine_distance, initial_bearing},
    models::{CoordStrategy, Fix},
};

/// Default ceiling above which a derived speed is treated as GPS jitter.
pub const DEFAULT_MAX_PLAUSIBLE_SPEED_MS: f64 = 30.0;

/// Fills missing speed and course on a fix series.
#[derive(Debug, Clone, Copy)]
pub struct KinematicDeriver {
    max_plausible_speed_ms: f64,
}

/// A fix series with speed and course filled wherever they could be derived.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub fixes: Vec<Fix>,
    /// Number of fixes whose speed was derived rather than recorded.
    pub speeds_derived: usize,
}

impl Default for KinematicDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PLAUSIBLE_SPEED_MS)
    }
}

impl KinematicDeriver {
    pub fn new(max_plausible_speed_ms: f64) -> Self {
        Self {
            max_plausible_speed_ms,
        }
    }

    /// Returns a new series; the input is left untouched.
    pub fn derive(&self, fixes: &[Fix]) -> Derivation {
        let mut out = fixes.to_vec();
        let speeds_derived = self.fill_speeds(&mut out);
        for (fix, course) in out.iter_mut().zip(course_over_ground(fixes)) {
            fix.course_deg = course;
        }
        tracing::info!(
            "Speed derivation: {} of {} fixes ({})",
            speeds_derived,
            fixes.len(),
            if speeds_derived > 0 { "derived" } else { "none needed or possible" }
        );
        Derivation {
            fixes: out,
            speeds_derived,
        }
    }

    fn fill_speeds(&self, fixes: &mut [Fix]) -> usize {
        let mut derived = 0;
        // Last fix with both a timestamp and a position. Carried across fixes
        // that already have a speed so gaps are bridged.
        let mut prev: Option<(OffsetDateTime, f64, f64)> = None;

        for fix in fixes.iter_mut() {
            let current = match (fix.timestamp, fix.position()) {
                (Some(t), Some((lat, lon))) => Some((t, lat, lon)),
                _ => None,
            };

            if fix.speed_m_s.is_none()
                && let (Some((t0, lat0, lon0)), Some((t1, lat1, lon1))) = (prev, current)
            {
                let elapsed = (t1 - t0).as_seconds_f64();
                if elapsed > 0.0 {
                    let speed = haversine_distance(lat0, lon0, lat1, lon1) / elapsed;
                    if speed <= self.max_plausible_speed_ms {
                        fix.speed_m_s = Some(speed);
                        derived += 1;
                    } else {
                        tracing::debug!("Discarding implausible derived speed {speed:.1} m/s");
                    }
                }
            }

            if current.is_some() {
                prev = current;
            }
        }
        derived
    }
}

/// Course over ground for each fix, from the previous georeferenced fix.
pub fn course_over_ground(fixes: &[Fix]) -> Vec<Option<f64>> {
    let mut prev: Option<(f64, f64)> = None;
    fixes
        .iter()
        .map(|fix| {
            let (lat, lon) = fix.position()?;
            let course = prev.and_then(|(plat, plon)| initial_bearing(plat, plon, lat, lon));
            prev = Some((lat, lon));
            course
        })
        .collect()
}

/// Earliest and latest valid timestamps of the series.
pub fn track_window(fixes: &[Fix]) -> Result<(OffsetDateTime, OffsetDateTime), InputError> {
    let mut times = fixes.iter().filter_map(|f| f.timestamp);
    let first = times.next().ok_or(InputError::NoValidTimestamps)?;
    Ok(times.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
}

/// The single coordinate the wind series is requested for.
pub fn representative_coord(
    fixes: &[Fix],
    strategy: CoordStrategy,
) -> Result<(f64, f64), InputError> {
    let coords: Vec<(f64, f64)> = fixes.iter().filter_map(Fix::position).collect();
    if coords.is_empty() {
        return Err(InputError::NoValidCoordinates);
    }

    let coord = match strategy {
        CoordStrategy::Start => coords[0],
        CoordStrategy::Midpoint => coords[coords.len() / 2],
        CoordStrategy::Centroid => {
            let mut lats: Vec<f64> = coords.iter().map(|c| c.0).collect();
            let mut lons: Vec<f64> = coords.iter().map(|c| c.1).collect();
            lats.sort_by(f64::total_cmp);
            lons.sort_by(f64::total_cmp);
            (lats[lats.len() / 2], lons[lons.len() / 2])
        }
    };
    Ok(coord)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, macros::datetime};

    const T0: OffsetDateTime = datetime!(2024-06-01 10:00 UTC);

    fn meters_north(m: f64) -> f64 {
        (m / crate::geodesy::EARTH_RADIUS_M).to_degrees()
    }

    #[test]
    fn test_derives_speed_and_course_due_north() {
        let fixes = vec![
            Fix::new(T0, 50.0, -1.0),
            Fix::new(T0 + Duration::seconds(100), 50.0 + meters_north(1000.0), -1.0),
        ];
        let result = KinematicDeriver::default().derive(&fixes);

        assert_eq!(result.speeds_derived, 1);
        assert_eq!(result.fixes[0].speed_m_s, None);
        assert_eq!(result.fixes[0].course_deg, None);
        let speed = result.fixes[1].speed_m_s.unwrap();
        assert!((speed - 10.0).abs() < 1e-6, "speed was {speed}");
        let course = result.fixes[1].course_deg.unwrap();
        assert!(course.abs() < 1e-9, "course was {course}");
        // Input untouched
        assert_eq!(fixes[1].speed_m_s, None);
    }

    #[test]
    fn test_rejects_implausible_speed() {
        let fixes = vec![
            Fix::new(T0, 50.0, -1.0),
            Fix::new(T0 + Duration::seconds(1), 50.0 + meters_north(2000.0), -1.0),
        ];
        let result = KinematicDeriver::default().derive(&fixes);
        assert_eq!(result.speeds_derived, 0);
        assert_eq!(result.fixes[1].speed_m_s, None);
        // Course is still defined.
        assert!(result.fixes[1].course_deg.is_some());

        let lenient = KinematicDeriver::new(5000.0).derive(&fixes);
        assert_eq!(lenient.speeds_derived, 1);
    }

    #[test]
    fn test_recorded_speed_kept_and_bridges_gaps() {
        let fixes = vec![
            Fix::new(T0, 50.0, -1.0),
            Fix::new(T0 + Duration::seconds(10), 50.0 + meters_north(50.0), -1.0).with_speed(4.2),
            Fix {
                timestamp: Some(T0 + Duration::seconds(15)),
                ..Default::default()
            },
            Fix::new(T0 + Duration::seconds(20), 50.0 + meters_north(100.0), -1.0),
        ];
        let result = KinematicDeriver::default().derive(&fixes);

        assert_eq!(result.fixes[1].speed_m_s, Some(4.2));
        assert_eq!(result.fixes[2].speed_m_s, None);
        // Derived from the fix with recorded speed, skipping the gap.
        let speed = result.fixes[3].speed_m_s.unwrap();
        assert!((speed - 5.0).abs() < 1e-6);
        assert_eq!(result.speeds_derived, 1);
    }

    #[test]
    fn test_tolerates_non_monotonic_time() {
        let fixes = vec![
            Fix::new(T0 + Duration::seconds(10), 50.0, -1.0),
            Fix::new(T0, 50.0 + meters_north(10.0), -1.0),
            Fix::new(T0, 50.0 + meters_north(20.0), -1.0),
            Fix::new(T0 + Duration::seconds(5), 50.0 + meters_north(30.0), -1.0),
        ];
        let result = KinematicDeriver::default().derive(&fixes);
        assert_eq!(result.fixes[1].speed_m_s, None);
        assert_eq!(result.fixes[2].speed_m_s, None);
        let speed = result.fixes[3].speed_m_s.unwrap();
        assert!((speed - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_course_undefined_for_coincident_fixes() {
        let fixes = vec![
            Fix::new(T0, 50.0, -1.0),
            Fix::new(T0 + Duration::seconds(5), 50.0, -1.0),
        ];
        let course = course_over_ground(&fixes);
        assert_eq!(course, vec![None, None]);
    }

    #[test]
    fn test_track_window() {
        let fixes = vec![
            Fix::new(T0 + Duration::seconds(30), 0.0, 0.0),
            Fix::default(),
            Fix::new(T0, 0.0, 0.0),
            Fix::new(T0 + Duration::seconds(10), 0.0, 0.0),
        ];
        let (start, end) = track_window(&fixes).unwrap();
        assert_eq!(start, T0);
        assert_eq!(end, T0 + Duration::seconds(30));

        let err = track_window(&[Fix::default()]).unwrap_err();
        assert!(matches!(err, InputError::NoValidTimestamps));
    }

    #[test]
    fn test_representative_coord_strategies() {
        let fixes = vec![
            Fix::new(T0, 1.0, 30.0),
            Fix::default(),
            Fix::new(T0, 3.0, 10.0),
            Fix::new(T0, 2.0, 20.0),
        ];
        assert_eq!(
            representative_coord(&fixes, CoordStrategy::Start).unwrap(),
            (1.0, 30.0)
        );
        assert_eq!(
            representative_coord(&fixes, CoordStrategy::Midpoint).unwrap(),
            (3.0, 10.0)
        );
        assert_eq!(
            representative_coord(&fixes, CoordStrategy::Centroid).unwrap(),
            (2.0, 20.0)
        );
        assert!(matches!(
            representative_coord(&[Fix::default()], CoordStrategy::Centroid),
            Err(InputError::NoValidCoordinates)
        ));
    }
}
