use std::fmt;

/// Coordinate systems accepted for proposal targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordSystem {
    Icrs,
    Fk5,
    Galactic,
}

impl CoordSystem {
    pub const ALL: [CoordSystem; 3] = [CoordSystem::Icrs, CoordSystem::Fk5, CoordSystem::Galactic];

    /// Value stored in the `target.system` column.
    pub fn code(self) -> &'static str {
        match self {
            CoordSystem::Icrs => "ICRS",
            CoordSystem::Fk5 => "FK5",
            CoordSystem::Galactic => "galactic",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CoordSystem::Icrs => "ICRS",
            CoordSystem::Fk5 => "FK5 J2000",
            CoordSystem::Galactic => "Galactic",
        }
    }

    /// Case-insensitive lookup, also accepting the usual aliases found in target lists.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "icrs" => Some(CoordSystem::Icrs),
            "fk5" | "j2000" => Some(CoordSystem::Fk5),
            "galactic" | "gal" => Some(CoordSystem::Galactic),
            _ => None,
        }
    }

    pub fn is_equatorial(self) -> bool {
        !matches!(self, CoordSystem::Galactic)
    }
}

impl fmt::Display for CoordSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parse a target's x/y strings into degrees.
///
/// Equatorial x is sexagesimal hours ("05:35:17.3", "5 35 17.3") or decimal
/// degrees; y is sexagesimal or decimal degrees. Galactic longitude and
/// latitude are decimal degrees.
pub fn parse_coordinates(system: CoordSystem, x: &str, y: &str) -> Result<(f64, f64), String> {
    let (x_deg, y_deg) = if system.is_equatorial() {
        let ra = if is_sexagesimal(x) {
            parse_sexagesimal(x).map_err(|e| format!("Invalid RA \"{}\": {e}", x.trim()))? * 15.0
        } else {
            parse_decimal(x).map_err(|e| format!("Invalid RA \"{}\": {e}", x.trim()))?
        };
        let dec = if is_sexagesimal(y) {
            parse_sexagesimal(y)
        } else {
            parse_decimal(y)
        }
        .map_err(|e| format!("Invalid Dec \"{}\": {e}", y.trim()))?;
        (ra, dec)
    } else {
        let l = parse_decimal(x).map_err(|e| format!("Invalid longitude \"{}\": {e}", x.trim()))?;
        let b = parse_decimal(y).map_err(|e| format!("Invalid latitude \"{}\": {e}", y.trim()))?;
        (l.rem_euclid(360.0), b)
    };

    if !(0.0..360.0).contains(&x_deg) {
        return Err(format!("{} is outside 0 to 360 degrees", x.trim()));
    }
    if !(-90.0..=90.0).contains(&y_deg) {
        return Err(format!("{} is outside -90 to +90 degrees", y.trim()));
    }
    Ok((x_deg, y_deg))
}

fn is_sexagesimal(s: &str) -> bool {
    let s = s.trim();
    s.contains(':') || s.split_whitespace().count() > 1
}

fn parse_decimal(s: &str) -> Result<f64, String> {
    let value: f64 = s.trim().parse().map_err(|_| "not a number".to_string())?;
    if !value.is_finite() {
        return Err("not a finite number".to_string());
    }
    Ok(value)
}

/// "[+-]a:b:c" or "[+-]a b c" (one to three fields) into a signed decimal value of `a`.
fn parse_sexagesimal(s: &str) -> Result<f64, String> {
    let s = s.trim();
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let fields: Vec<&str> = body
        .split(|c: char| c == ':' || c.is_whitespace())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() || fields.len() > 3 {
        return Err("expected one to three sexagesimal fields".to_string());
    }

    let mut total = 0.0;
    for (i, field) in fields.iter().enumerate() {
        let value: f64 = field
            .parse()
            .map_err(|_| format!("\"{field}\" is not a number"))?;
        if value < 0.0 || field.starts_with('-') || field.starts_with('+') {
            return Err("only the first field may carry a sign".to_string());
        }
        if i > 0 && value >= 60.0 {
            return Err(format!("\"{field}\" must be less than 60"));
        }
        total += value / 60f64.powi(i as i32);
    }
    Ok(if negative { -total } else { total })
}

// Galactic to ICRS rotation: transpose of the ICRS-to-galactic matrix (Hipparcos, J2000).
const GAL_TO_ICRS: [[f64; 3]; 3] = [
    [-0.054_875_560_416_215_4, 0.494_109_427_875_583_7, -0.867_666_149_019_004_7],
    [-0.873_437_090_234_885_0, -0.444_829_629_960_011_2, -0.198_076_373_431_201_5],
    [-0.483_835_015_548_713_2, 0.746_982_244_497_218_9, 0.455_983_776_175_066_9],
];

/// Convert stored target coordinates to ICRS RA/Dec in degrees.
/// FK5 J2000 is treated as ICRS; the difference is far below target accuracy.
pub fn to_icrs(system: CoordSystem, x: f64, y: f64) -> (f64, f64) {
    match system {
        CoordSystem::Icrs | CoordSystem::Fk5 => (x, y),
        CoordSystem::Galactic => {
            let (l, b) = (x.to_radians(), y.to_radians());
            let v = [b.cos() * l.cos(), b.cos() * l.sin(), b.sin()];
            let r: Vec<f64> = GAL_TO_ICRS
                .iter()
                .map(|row| row[0] * v[0] + row[1] * v[1] + row[2] * v[2])
                .collect();
            let ra = r[1].atan2(r[0]).to_degrees().rem_euclid(360.0);
            let dec = r[2].clamp(-1.0, 1.0).asin().to_degrees();
            (ra, dec)
        }
    }
}

/// RA in degrees as "hh:mm:ss.ss".
pub fn format_ra(ra_deg: f64) -> String {
    let per_day = 24 * 3600 * 100;
    let centisec = ((ra_deg.rem_euclid(360.0) / 15.0) * 3600.0 * 100.0).round() as i64 % per_day;
    let (h, rest) = (centisec / 360_000, centisec % 360_000);
    let (m, rest) = (rest / 6_000, rest % 6_000);
    format!("{:02}:{:02}:{:02}.{:02}", h, m, rest / 100, rest % 100)
}

/// Dec in degrees as "+dd:mm:ss.s".
pub fn format_dec(dec_deg: f64) -> String {
    let sign = if dec_deg < 0.0 { '-' } else { '+' };
    let decisec = (dec_deg.abs() * 36_000.0).round() as i64;
    let (d, rest) = (decisec / 36_000, decisec % 36_000);
    let (m, rest) = (rest / 600, rest % 600);
    format!("{}{:02}:{:02}:{:02}.{}", sign, d, m, rest / 10, rest % 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn sexagesimal_equatorial() {
        let (ra, dec) = parse_coordinates(CoordSystem::Icrs, "05:35:17.3", "-05:23:28").unwrap();
        assert!(close(ra, 83.822_083, 1e-5));
        assert!(close(dec, -5.391_111, 1e-5));
    }

    #[test]
    fn space_separated_and_decimal() {
        let (ra, dec) = parse_coordinates(CoordSystem::Fk5, "12 30 00", "+12 00 00").unwrap();
        assert!(close(ra, 187.5, 1e-9));
        assert!(close(dec, 12.0, 1e-9));

        let (ra, dec) = parse_coordinates(CoordSystem::Icrs, "187.5", "-0.5").unwrap();
        assert!(close(ra, 187.5, 1e-9));
        assert!(close(dec, -0.5, 1e-9));
    }

    #[test]
    fn negative_zero_degrees_keeps_sign() {
        let (_, dec) = parse_coordinates(CoordSystem::Icrs, "0", "-00:30:00").unwrap();
        assert!(close(dec, -0.5, 1e-9));
    }

    #[test]
    fn rejects_out_of_range_and_garbage() {
        assert!(parse_coordinates(CoordSystem::Icrs, "25:00:00", "0").is_err());
        assert!(parse_coordinates(CoordSystem::Icrs, "10:61:00", "0").is_err());
        assert!(parse_coordinates(CoordSystem::Icrs, "10", "91").is_err());
        assert!(parse_coordinates(CoordSystem::Icrs, "abc", "0").is_err());
        assert!(parse_coordinates(CoordSystem::Icrs, "10:-5:00", "0").is_err());
    }

    #[test]
    fn galactic_longitude_wraps() {
        let (l, b) = parse_coordinates(CoordSystem::Galactic, "-10", "5").unwrap();
        assert!(close(l, 350.0, 1e-9));
        assert!(close(b, 5.0, 1e-9));
    }

    #[test]
    fn galactic_centre_to_icrs() {
        let (ra, dec) = to_icrs(CoordSystem::Galactic, 0.0, 0.0);
        assert!(close(ra, 266.405, 0.01), "ra = {ra}");
        assert!(close(dec, -28.936, 0.01), "dec = {dec}");
    }

    #[test]
    fn galactic_north_pole_to_icrs() {
        let (ra, dec) = to_icrs(CoordSystem::Galactic, 0.0, 90.0);
        assert!(close(ra, 192.859, 0.01), "ra = {ra}");
        assert!(close(dec, 27.128, 0.01), "dec = {dec}");
    }

    #[test]
    fn formatting() {
        assert_eq!(format_ra(83.822_083), "05:35:17.30");
        assert_eq!(format_dec(-5.391_111), "-05:23:28.0");
        assert_eq!(format_ra(359.999_999_9), "00:00:00.00");
        assert_eq!(format_dec(0.0), "+00:00:00.0");
    }

    #[test]
    fn system_codes() {
        for system in CoordSystem::ALL {
            assert_eq!(CoordSystem::from_code(system.code()), Some(system));
        }
        assert_eq!(CoordSystem::from_code("J2000"), Some(CoordSystem::Fk5));
        assert_eq!(CoordSystem::from_code("B1950"), None);
    }
}
