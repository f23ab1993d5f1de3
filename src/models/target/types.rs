use serde::Deserialize;

use crate::astro::{CoordSystem, format_dec, format_ra, parse_coordinates, to_icrs};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Target {
    pub id: i64,
    pub proposal_id: i64,
    pub sort_order: i32,
    pub name: String,
    pub system: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub time: Option<f64>,
    pub priority: Option<i32>,
    pub note: String,
}

impl Target {
    pub fn coord_system(&self) -> Option<CoordSystem> {
        self.system.as_deref().and_then(CoordSystem::from_code)
    }

    /// ICRS position in degrees, when the target has coordinates.
    pub fn icrs(&self) -> Option<(f64, f64)> {
        match (self.coord_system(), self.x, self.y) {
            (Some(system), Some(x), Some(y)) => Some(to_icrs(system, x, y)),
            _ => None,
        }
    }

    pub fn system_display(&self) -> &'static str {
        self.coord_system().map(|s| s.label()).unwrap_or("")
    }

    pub fn x_display(&self) -> String {
        match (self.coord_system(), self.x) {
            (Some(s), Some(x)) if s.is_equatorial() => format_ra(x),
            (_, Some(x)) => format!("{x:.4}"),
            _ => String::new(),
        }
    }

    pub fn y_display(&self) -> String {
        match (self.coord_system(), self.y) {
            (Some(s), Some(y)) if s.is_equatorial() => format_dec(y),
            (_, Some(y)) => format!("{y:.4}"),
            _ => String::new(),
        }
    }

    pub fn time_display(&self) -> String {
        self.time.map(format_hours).unwrap_or_default()
    }

    pub fn priority_display(&self) -> String {
        self.priority.map(|p| p.to_string()).unwrap_or_default()
    }
}

pub fn format_hours(hours: f64) -> String {
    format!("{hours:.2}")
}

/// A validated target ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTarget {
    pub name: String,
    pub system: Option<CoordSystem>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub time: Option<f64>,
    pub priority: Option<i32>,
    pub note: String,
}

impl NewTarget {
    fn build(
        name: &str,
        system: &str,
        x: &str,
        y: &str,
        time: &str,
        priority: &str,
        note: &str,
    ) -> Result<NewTarget, Vec<String>> {
        let mut errors = Vec::new();

        let name = name.trim();
        if name.is_empty() {
            errors.push("Target name is required".to_string());
        }

        let (x, y) = (x.trim(), y.trim());
        let (system, coords) = if x.is_empty() && y.is_empty() {
            (None, None)
        } else if x.is_empty() || y.is_empty() {
            errors.push("Both coordinates are required when either is given".to_string());
            (None, None)
        } else {
            let parsed = if system.trim().is_empty() {
                Some(CoordSystem::Icrs)
            } else {
                CoordSystem::from_code(system)
            };
            match parsed {
                None => {
                    errors.push(format!("Unknown coordinate system \"{}\"", system.trim()));
                    (None, None)
                }
                Some(s) => match parse_coordinates(s, x, y) {
                    Ok(c) => (Some(s), Some(c)),
                    Err(e) => {
                        errors.push(e);
                        (None, None)
                    }
                },
            }
        };

        let time = match time.trim() {
            "" => None,
            t => match t.parse::<f64>() {
                Ok(v) if v.is_finite() && v > 0.0 => Some(v),
                _ => {
                    errors.push(format!("Time \"{t}\" must be a positive number of hours"));
                    None
                }
            },
        };

        let priority = match priority.trim() {
            "" => None,
            p => match p.parse::<i32>() {
                Ok(v) if (1..=99).contains(&v) => Some(v),
                _ => {
                    errors.push(format!("Priority \"{p}\" must be a whole number from 1 to 99"));
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(NewTarget {
            name: name.to_string(),
            system,
            x: coords.map(|c| c.0),
            y: coords.map(|c| c.1),
            time,
            priority,
            note: note.trim().to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct TargetForm {
    pub name: String,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub x: String,
    #[serde(default)]
    pub y: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub note: String,
    pub csrf_token: String,
}

impl TargetForm {
    pub fn to_new_target(&self) -> Result<NewTarget, Vec<String>> {
        NewTarget::build(&self.name, &self.system, &self.x, &self.y, &self.time, &self.priority, &self.note)
    }
}

#[derive(Debug, Deserialize)]
pub struct TargetListForm {
    pub targets: String,
    #[serde(default)]
    pub replace: Option<String>,
    pub csrf_token: String,
}

/// Parse an uploaded target list.
///
/// One target per line: `name x y [system] [time] [priority]`. Lines containing
/// a comma are read as CSV (so names may contain spaces, or commas when
/// quoted), otherwise split on whitespace. Text after `#` is ignored. Every bad line is reported with its
/// line number.
pub fn parse_target_list(text: &str) -> Result<Vec<NewTarget>, Vec<String>> {
    let mut targets = Vec::new();
    let mut errors = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<String> = if line.contains(',') {
            match split_comma_line(line) {
                Ok(fields) => fields,
                Err(e) => {
                    errors.push(format!("Line {line_no}: {e}"));
                    continue;
                }
            }
        } else {
            line.split_whitespace().map(str::to_string).collect()
        };
        if fields.len() < 3 || fields.len() > 6 {
            errors.push(format!(
                "Line {line_no}: expected name, x, y and optionally system, time, priority"
            ));
            continue;
        }

        let field = |i: usize| fields.get(i).map(String::as_str).unwrap_or("");
        let system = field(3);
        if !system.is_empty() && CoordSystem::from_code(system).is_none() {
            errors.push(format!("Line {line_no}: unknown coordinate system \"{system}\""));
            continue;
        }
        match NewTarget::build(field(0), system, field(1), field(2), field(4), field(5), "") {
            Ok(target) => targets.push(target),
            Err(errs) => errors.extend(errs.into_iter().map(|e| format!("Line {line_no}: {e}"))),
        }
    }

    if targets.is_empty() && errors.is_empty() {
        errors.push("The target list is empty".to_string());
    }
    if errors.is_empty() { Ok(targets) } else { Err(errors) }
}

fn split_comma_line(line: &str) -> Result<Vec<String>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(record)) => Ok(record.iter().map(str::to_string).collect()),
        Some(Err(e)) => Err(format!("could not read the line: {e}")),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, system: &str, x: &str, y: &str, time: &str, priority: &str) -> TargetForm {
        TargetForm {
            name: name.into(),
            system: system.into(),
            x: x.into(),
            y: y.into(),
            time: time.into(),
            priority: priority.into(),
            note: String::new(),
            csrf_token: String::new(),
        }
    }

    #[test]
    fn sexagesimal_target() {
        let t = form("Orion", "ICRS", "05:35:17.3", "-05:23:28", "2.5", "1").to_new_target().unwrap();
        assert_eq!(t.system, Some(CoordSystem::Icrs));
        assert!((t.x.unwrap() - 83.822_083).abs() < 1e-5);
        assert!((t.y.unwrap() + 5.391_111).abs() < 1e-5);
        assert_eq!(t.time, Some(2.5));
        assert_eq!(t.priority, Some(1));
    }

    #[test]
    fn coordinates_optional() {
        let t = form("Survey field", "", "", "", "", "").to_new_target().unwrap();
        assert_eq!(t.system, None);
        assert_eq!(t.x, None);
        assert!(form("Half", "ICRS", "10.0", "", "", "").to_new_target().is_err());
    }

    #[test]
    fn field_errors_collected() {
        let errs = form("", "ICRS", "10", "20", "-1", "100").to_new_target().unwrap_err();
        assert_eq!(errs.len(), 3);
    }

    #[test]
    fn target_list_whitespace_and_commas() {
        let list = "# name x y system time priority\n\
                    M82 09:55:52.4 +69:40:47 ICRS 4 1\n\
                    \n\
                    Galactic centre, 0.0, 0.0, galactic, 1.5\n\
                    NGC1333 52.29 31.31   # decimal degrees\n";
        let targets = parse_target_list(list).unwrap();
        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0].name, "M82");
        assert_eq!(targets[0].time, Some(4.0));
        assert_eq!(targets[1].name, "Galactic centre");
        assert_eq!(targets[1].system, Some(CoordSystem::Galactic));
        assert_eq!(targets[1].priority, None);
        assert_eq!(targets[2].system, Some(CoordSystem::Icrs));
        assert_eq!(targets[2].time, None);
    }

    #[test]
    fn quoted_names_may_contain_commas() {
        let list = "\"NGC 1333, core\", 52.29, 31.31, ICRS, 2\n\
                    \"Sgr A*\",266.417,-29.008\n";
        let targets = parse_target_list(list).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].name, "NGC 1333, core");
        assert_eq!(targets[0].time, Some(2.0));
        assert!((targets[0].x.unwrap() - 52.29).abs() < 1e-9);
        assert_eq!(targets[1].name, "Sgr A*");
        assert!((targets[1].y.unwrap() + 29.008).abs() < 1e-9);
    }

    #[test]
    fn target_list_errors_have_line_numbers() {
        let list = "A 10 20\nB 10\nC 10 20 martian\nD 10 95 ICRS\n";
        let errs = parse_target_list(list).unwrap_err();
        assert_eq!(errs.len(), 3, "{errs:?}");
        assert!(errs[0].starts_with("Line 2:"));
        assert!(errs[1].starts_with("Line 3:"));
        assert!(errs[2].starts_with("Line 4:"));
    }

    #[test]
    fn empty_list_rejected() {
        assert!(parse_target_list("# nothing here\n\n").is_err());
    }
}
