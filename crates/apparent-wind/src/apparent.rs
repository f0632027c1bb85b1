//! Apparent wind: true wind minus boat velocity, decomposed along the course.

use crate::{
    geodesy::{course_to_uv, uv_speed, uv_to_met_direction, wrap_180},
    models::{AmbientWind, ApparentWind, BoatVelocity, EnrichedFix, Fix},
};

/// Below this speed the course is mostly GPS noise.
pub const DEFAULT_MIN_SPEED_MS: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct ApparentWindEngine {
    min_speed_ms: f64,
}

impl Default for ApparentWindEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SPEED_MS)
    }
}

impl ApparentWindEngine {
    pub fn new(min_speed_ms: f64) -> Self {
        Self { min_speed_ms }
    }

    /// Apparent wind for one fix given the ambient (u, v), boat speed and course.
    pub fn apparent(&self, wind_u: f64, wind_v: f64, speed: f64, course_deg: f64) -> ApparentWind {
        let (boat_u, boat_v) = course_to_uv(speed, course_deg);
        let u = wind_u - boat_u;
        let v = wind_v - boat_v;
        let speed_ms = uv_speed(u, v);
        let direction_deg = uv_to_met_direction(u, v);

        let angle_deg = (speed >= self.min_speed_ms).then(|| wrap_180(direction_deg - course_deg));
        let (head_ms, cross_ms) = match angle_deg {
            Some(angle) => {
                let rad = angle.to_radians();
                (Some(speed_ms * rad.cos()), Some(speed_ms * rad.sin()))
            }
            None => (None, None),
        };

        ApparentWind {
            speed_ms,
            direction_deg,
            angle_deg,
            head_ms,
            cross_ms,
        }
    }

    /// Combines kinematics and ambient wind into enriched fixes. `winds` is
    /// parallel to `fixes`.
    pub fn enrich(&self, fixes: &[Fix], winds: &[Option<AmbientWind>]) -> Vec<EnrichedFix> {
        let enriched: Vec<EnrichedFix> = fixes
            .iter()
            .zip(winds)
            .map(|(fix, wind)| {
                let boat = match (fix.speed_m_s, fix.course_deg) {
                    (Some(speed), Some(course)) => {
                        let (u_ms, v_ms) = course_to_uv(speed, course);
                        Some(BoatVelocity { u_ms, v_ms })
                    }
                    _ => None,
                };
                let apparent = match (wind, fix.speed_m_s, fix.course_deg) {
                    (Some(w), Some(speed), Some(course)) => {
                        Some(self.apparent(w.u_ms, w.v_ms, speed, course))
                    }
                    _ => None,
                };
                EnrichedFix {
                    fix: fix.clone(),
                    wind: *wind,
                    boat,
                    apparent,
                }
            })
            .collect();

        let mapped = enriched.iter().filter(|f| f.apparent.is_some()).count();
        tracing::info!(
            "Apparent wind computed for {} / {} points (min_speed_ms={})",
            mapped,
            fixes.len(),
            self.min_speed_ms
        );
        enriched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geodesy::met_to_uv;
    use time::macros::datetime;

    const EPS: f64 = 1e-9;

    fn ambient(speed: f64, from_deg: f64) -> AmbientWind {
        let (u_ms, v_ms) = met_to_uv(speed, from_deg);
        AmbientWind {
            speed_ms: speed,
            direction_deg: from_deg,
            u_ms,
            v_ms,
        }
    }

    #[test]
    fn test_sailing_into_the_wind() {
        // Wind from due north at 10 m/s (u=0, v=-10), boat north at 5 m/s.
        let aw = ApparentWindEngine::default().apparent(0.0, -10.0, 5.0, 0.0);
        assert!((aw.speed_ms - 15.0).abs() < EPS);
        assert!(aw.direction_deg.abs() < EPS);
        assert!(aw.angle_deg.unwrap().abs() < EPS);
        assert!((aw.head_ms.unwrap() - 15.0).abs() < EPS);
        assert!(aw.cross_ms.unwrap().abs() < EPS);
    }

    #[test]
    fn test_running_downwind_faster_than_wind() {
        // Wind from the south at 4 m/s, boat north at 6 m/s: 2 m/s on the nose.
        let (u, v) = met_to_uv(4.0, 180.0);
        let aw = ApparentWindEngine::default().apparent(u, v, 6.0, 0.0);
        assert!((aw.speed_ms - 2.0).abs() < EPS);
        assert!((aw.head_ms.unwrap() - 2.0).abs() < EPS);
    }

    #[test]
    fn test_beam_wind_from_starboard() {
        // Boat heading north, wind from the east: starboard side.
        let (u, v) = met_to_uv(10.0, 90.0);
        let aw = ApparentWindEngine::default().apparent(u, v, 0.5, 0.0);
        let angle = aw.angle_deg.unwrap();
        assert!(angle > 0.0 && angle < 90.0, "angle was {angle}");
        assert!(aw.cross_ms.unwrap() > 0.0);
        assert!(aw.head_ms.unwrap() > 0.0);
    }

    #[test]
    fn test_tailwind_dead_astern() {
        let (u, v) = met_to_uv(10.0, 180.0);
        let aw = ApparentWindEngine::default().apparent(u, v, 2.0, 0.0);
        // Dead astern; floating point may land on either side of the wrap.
        assert!(aw.angle_deg.unwrap().abs() > 179.999_999);
        assert!((aw.head_ms.unwrap() + 8.0).abs() < EPS);
    }

    #[test]
    fn test_angle_undefined_below_min_speed() {
        let aw = ApparentWindEngine::new(0.5).apparent(0.0, -10.0, 0.49, 0.0);
        assert!(aw.angle_deg.is_none());
        assert!(aw.head_ms.is_none());
        assert!(aw.cross_ms.is_none());
        assert!((aw.speed_ms - 10.49).abs() < EPS);
    }

    #[test]
    fn test_enrich_skips_missing_inputs() {
        let t = datetime!(2024-06-01 10:00 UTC);
        let moving = Fix {
            course_deg: Some(90.0),
            ..Fix::new(t, 50.0, -1.0).with_speed(3.0)
        };
        let no_course = Fix::new(t, 50.0, -1.0).with_speed(3.0);
        let fixes = vec![moving.clone(), no_course, moving];
        let winds = vec![Some(ambient(6.0, 0.0)), Some(ambient(6.0, 0.0)), None];

        let out = ApparentWindEngine::default().enrich(&fixes, &winds);
        assert_eq!(out.len(), 3);

        let boat = out[0].boat.unwrap();
        assert!((boat.u_ms - 3.0).abs() < EPS);
        assert!(boat.v_ms.abs() < EPS);
        assert!(out[0].apparent.is_some());

        // Missing course is never treated as a stationary boat.
        assert!(out[1].boat.is_none());
        assert!(out[1].apparent.is_none());
        assert!(out[1].wind.is_some());

        assert!(out[2].boat.is_some());
        assert!(out[2].apparent.is_none());
    }
}
