//! GPX file generation from fixes.
//!
//! Produces GPX 1.1 XML suitable for the `/parse-gps` upload.

use apparent_wind::models::Fix;
use time::format_description::well_known::Rfc3339;

/// Generates a GPX 1.1 XML document with a single track segment. Fixes
/// without a position are skipped; GPX cannot express them.
pub fn generate_gpx(fixes: &[Fix], track_name: &str) -> Vec<u8> {
    let mut gpx = String::new();

    gpx.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    gpx.push('\n');
    gpx.push_str(r#"<gpx version="1.1" creator="apparent-wind-test-data""#);
    gpx.push_str(r#" xmlns="http://www.topografix.com/GPX/1/1">"#);
    gpx.push('\n');

    gpx.push_str("  <trk>\n");
    gpx.push_str(&format!("    <name>{}</name>\n", escape_xml(track_name)));
    gpx.push_str("    <trkseg>\n");

    for fix in fixes {
        let Some((lat, lon)) = fix.position() else {
            continue;
        };
        gpx.push_str(&format!(
            r#"      <trkpt lat="{:.7}" lon="{:.7}">"#,
            lat, lon
        ));
        gpx.push('\n');

        if let Some(ele) = fix.altitude_m {
            gpx.push_str(&format!("        <ele>{:.2}</ele>\n", ele));
        }

        if let Some(ts) = fix.timestamp.and_then(|t| t.format(&Rfc3339).ok()) {
            gpx.push_str(&format!("        <time>{}</time>\n", ts));
        }

        gpx.push_str("      </trkpt>\n");
    }

    gpx.push_str("    </trkseg>\n");
    gpx.push_str("  </trk>\n");
    gpx.push_str("</gpx>\n");

    gpx.into_bytes()
}

/// Escapes XML special characters in a string.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
