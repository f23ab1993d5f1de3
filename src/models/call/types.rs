use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Standard,
    Immediate,
    Multiple,
}

impl CallType {
    pub const ALL: [CallType; 3] = [CallType::Standard, CallType::Immediate, CallType::Multiple];

    pub fn code(self) -> &'static str {
        match self {
            CallType::Standard => "standard",
            CallType::Immediate => "immediate",
            CallType::Multiple => "multiple",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CallType::Standard => "Regular semester",
            CallType::Immediate => "Immediate review",
            CallType::Multiple => "Multiple close dates",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        CallType::ALL.into_iter().find(|t| t.code() == code)
    }
}

/// Word, figure, and page limits for a call's proposal sections.
/// A limit of zero means the section has no limit of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextLimits {
    pub abst_word_lim: i32,
    pub sci_word_lim: i32,
    pub sci_fig_lim: i32,
    pub sci_page_lim: i32,
    pub tech_word_lim: i32,
    pub tech_fig_lim: i32,
    pub tech_page_lim: i32,
    pub capt_word_lim: i32,
}

/// A call joined with its semester and queue.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Call {
    pub id: i64,
    pub semester_id: i64,
    pub semester_code: String,
    pub semester_name: String,
    pub queue_id: i64,
    pub queue_code: String,
    pub queue_name: String,
    pub call_type: String,
    pub date_open: DateTime<Utc>,
    pub date_close: DateTime<Utc>,
    pub abst_word_lim: i32,
    pub sci_word_lim: i32,
    pub sci_fig_lim: i32,
    pub sci_page_lim: i32,
    pub tech_word_lim: i32,
    pub tech_fig_lim: i32,
    pub tech_page_lim: i32,
    pub capt_word_lim: i32,
    pub hidden: bool,
}

impl Call {
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.date_open <= now && now < self.date_close
    }

    pub fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }

    pub fn kind(&self) -> CallType {
        CallType::from_code(&self.call_type).unwrap_or(CallType::Standard)
    }

    pub fn type_label(&self) -> &'static str {
        self.kind().label()
    }

    pub fn limits(&self) -> TextLimits {
        TextLimits {
            abst_word_lim: self.abst_word_lim,
            sci_word_lim: self.sci_word_lim,
            sci_fig_lim: self.sci_fig_lim,
            sci_page_lim: self.sci_page_lim,
            tech_word_lim: self.tech_word_lim,
            tech_fig_lim: self.tech_fig_lim,
            tech_page_lim: self.tech_page_lim,
            capt_word_lim: self.capt_word_lim,
        }
    }

    pub fn title(&self) -> String {
        format!("{} {} ({})", self.semester_name, self.queue_name, self.type_label())
    }

    pub fn open_display(&self) -> String {
        format_datetime(self.date_open)
    }

    pub fn close_display(&self) -> String {
        format_datetime(self.date_close)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CallMidClose {
    pub id: i64,
    pub call_id: i64,
    pub date_close: DateTime<Utc>,
    pub closed: bool,
}

impl CallMidClose {
    pub fn close_display(&self) -> String {
        format_datetime(self.date_close)
    }
}

/// The next deadline a proposal submitted now will be reviewed under:
/// the earliest unclosed intermediate close still in the future, else the
/// final close. `None` once the call has closed.
pub fn next_close(call: &Call, mid_closes: &[CallMidClose], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if now >= call.date_close {
        return None;
    }
    mid_closes
        .iter()
        .filter(|m| !m.closed && m.date_close > now && m.date_close < call.date_close)
        .map(|m| m.date_close)
        .min()
        .or(Some(call.date_close))
}

/// Values for inserting or updating a call.
#[derive(Debug, Clone)]
pub struct NewCall {
    pub semester_id: i64,
    pub queue_id: i64,
    pub call_type: CallType,
    pub date_open: DateTime<Utc>,
    pub date_close: DateTime<Utc>,
    pub limits: TextLimits,
    pub hidden: bool,
}

#[derive(Debug, Deserialize)]
pub struct CallForm {
    pub semester_id: i64,
    pub queue_id: i64,
    pub call_type: String,
    pub date_open: String,
    pub date_close: String,
    pub abst_word_lim: String,
    pub sci_word_lim: String,
    pub sci_fig_lim: String,
    pub sci_page_lim: String,
    pub tech_word_lim: String,
    pub tech_fig_lim: String,
    pub tech_page_lim: String,
    pub capt_word_lim: String,
    #[serde(default)]
    pub hidden: Option<String>,
    pub csrf_token: String,
}

impl CallForm {
    /// Validate the form; all problems are reported together.
    pub fn to_new_call(&self) -> Result<NewCall, Vec<String>> {
        let mut errors = Vec::new();

        let call_type = CallType::from_code(&self.call_type);
        if call_type.is_none() {
            errors.push("Unknown call type".to_string());
        }
        let date_open = parse_form_datetime(&self.date_open)
            .map_err(|e| errors.push(format!("Opening date: {e}")))
            .ok();
        let date_close = parse_form_datetime(&self.date_close)
            .map_err(|e| errors.push(format!("Closing date: {e}")))
            .ok();
        if let (Some(open), Some(close)) = (date_open, date_close) {
            if close <= open {
                errors.push("The call must close after it opens".to_string());
            }
        }

        let mut limit = |value: &str, label: &str| -> i32 {
            match value.trim().parse::<i32>() {
                Ok(n) if n >= 0 => n,
                _ => {
                    errors.push(format!("{label} must be a whole number, zero for no limit"));
                    0
                }
            }
        };
        let limits = TextLimits {
            abst_word_lim: limit(&self.abst_word_lim, "Abstract word limit"),
            sci_word_lim: limit(&self.sci_word_lim, "Scientific justification word limit"),
            sci_fig_lim: limit(&self.sci_fig_lim, "Scientific justification figure limit"),
            sci_page_lim: limit(&self.sci_page_lim, "Scientific justification page limit"),
            tech_word_lim: limit(&self.tech_word_lim, "Technical justification word limit"),
            tech_fig_lim: limit(&self.tech_fig_lim, "Technical justification figure limit"),
            tech_page_lim: limit(&self.tech_page_lim, "Technical justification page limit"),
            capt_word_lim: limit(&self.capt_word_lim, "Caption word limit"),
        };

        match (call_type, date_open, date_close) {
            (Some(call_type), Some(date_open), Some(date_close)) if errors.is_empty() => Ok(NewCall {
                semester_id: self.semester_id,
                queue_id: self.queue_id,
                call_type,
                date_open,
                date_close,
                limits,
                hidden: self.hidden.is_some(),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MidCloseForm {
    pub date_close: String,
    pub csrf_token: String,
}

/// Accepts "YYYY-MM-DD HH:MM", "YYYY-MM-DDTHH:MM" (datetime-local inputs), or a bare date (midnight), in UTC.
pub fn parse_form_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("\"{value}\" is not a date (YYYY-MM-DD HH:MM)"))
}

pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn call(open: DateTime<Utc>, close: DateTime<Utc>) -> Call {
        Call {
            id: 1,
            semester_id: 1,
            semester_code: "26B".into(),
            semester_name: "2026B".into(),
            queue_id: 1,
            queue_code: "P".into(),
            queue_name: "PI".into(),
            call_type: "multiple".into(),
            date_open: open,
            date_close: close,
            abst_word_lim: 200,
            sci_word_lim: 0,
            sci_fig_lim: 4,
            sci_page_lim: 2,
            tech_word_lim: 0,
            tech_fig_lim: 2,
            tech_page_lim: 1,
            capt_word_lim: 100,
            hidden: false,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap()
    }

    fn mid(day: u32, closed: bool) -> CallMidClose {
        CallMidClose { id: day as i64, call_id: 1, date_close: at(day), closed }
    }

    #[test]
    fn open_window_is_half_open() {
        let c = call(at(1), at(20));
        assert!(!c.is_open_at(at(1) - chrono::Duration::seconds(1)));
        assert!(c.is_open_at(at(1)));
        assert!(c.is_open_at(at(19)));
        assert!(!c.is_open_at(at(20)));
    }

    #[test]
    fn next_close_prefers_pending_intermediate_dates() {
        let c = call(at(1), at(20));
        let mids = [mid(5, true), mid(10, false), mid(15, false)];
        assert_eq!(next_close(&c, &mids, at(2)), Some(at(10)));
        assert_eq!(next_close(&c, &mids, at(11)), Some(at(15)));
        assert_eq!(next_close(&c, &mids, at(16)), Some(at(20)));
        assert_eq!(next_close(&c, &mids, at(21)), None);
    }

    #[test]
    fn datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 2, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_form_datetime("2026-02-01 09:30"), Ok(expected));
        assert_eq!(parse_form_datetime("2026-02-01T09:30"), Ok(expected));
        assert_eq!(
            parse_form_datetime("2026-02-01"),
            Ok(Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap())
        );
        assert!(parse_form_datetime("01/02/2026").is_err());
    }

    fn form() -> CallForm {
        CallForm {
            semester_id: 1,
            queue_id: 2,
            call_type: "standard".into(),
            date_open: "2026-03-01".into(),
            date_close: "2026-03-20 16:00".into(),
            abst_word_lim: "200".into(),
            sci_word_lim: "0".into(),
            sci_fig_lim: "4".into(),
            sci_page_lim: "2".into(),
            tech_word_lim: "0".into(),
            tech_fig_lim: "2".into(),
            tech_page_lim: "1".into(),
            capt_word_lim: "100".into(),
            hidden: None,
            csrf_token: String::new(),
        }
    }

    #[test]
    fn form_validation() {
        let new = form().to_new_call().unwrap();
        assert_eq!(new.call_type, CallType::Standard);
        assert_eq!(new.limits.sci_fig_lim, 4);
        assert!(!new.hidden);

        let mut bad = form();
        bad.date_close = "2026-02-01".into();
        bad.abst_word_lim = "-5".into();
        bad.call_type = "weekly".into();
        let errors = bad.to_new_call().unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
