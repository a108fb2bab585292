//! Message templates for column values and table names.
//!
//! A template is literal text with `${NAME}` or `$NAME` references. Names resolve to built-in
//! macros first and to message values otherwise; unknown names render as empty text. `$$`
//! renders a single `$`.
//!
//! Built-in macros:
//!
//! | Macro | Output |
//! |---|---|
//! | `SEQNUM` | destination sequence number |
//! | `ISODATE` | `2024-03-01T12:30:45+02:00` |
//! | `DATE` | `Mar  1 12:30:45` |
//! | `UNIXTIME` | seconds since the epoch |
//! | `YEAR`, `MONTH`, `DAY`, `HOUR`, `MIN`, `SEC` | zero-padded components |
//!
//! Date macros use the message timestamp. Prefix them with `R_` for the receive timestamp or
//! `S_` to name the message timestamp explicitly.

use chrono::{DateTime, FixedOffset, Local, Offset, TimeZone, Utc};

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::types::LogMessage;

/// Rendering options shared by all templates of a destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Digits of fractional seconds in `ISODATE` and `UNIXTIME`.
    pub frac_digits: u8,
    /// Zone for column values. Falls back to the process local zone.
    pub send_time_zone: Option<FixedOffset>,
    /// Zone for table names. Falls back to the process local zone.
    pub local_time_zone: Option<FixedOffset>,
}

/// Selects which configured zone a rendering uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeZoneRole {
    Send,
    Local,
}

impl TemplateOptions {
    fn offset_for(&self, role: TimeZoneRole, at: DateTime<Utc>) -> FixedOffset {
        let configured = match role {
            TimeZoneRole::Send => self.send_time_zone,
            TimeZoneRole::Local => self.local_time_zone,
        };

        configured.unwrap_or_else(|| Local.offset_from_utc_datetime(&at.naive_utc()).fix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stamp {
    Event,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateMacro {
    IsoDate,
    Date,
    UnixTime,
    Year,
    Month,
    Day,
    Hour,
    Min,
    Sec,
}

impl DateMacro {
    fn from_name(name: &str) -> Option<Self> {
        let date_macro = match name {
            "ISODATE" => DateMacro::IsoDate,
            "DATE" => DateMacro::Date,
            "UNIXTIME" => DateMacro::UnixTime,
            "YEAR" => DateMacro::Year,
            "MONTH" => DateMacro::Month,
            "DAY" => DateMacro::Day,
            "HOUR" => DateMacro::Hour,
            "MIN" => DateMacro::Min,
            "SEC" => DateMacro::Sec,
            _ => return None,
        };

        Some(date_macro)
    }

    fn render(&self, time: &DateTime<FixedOffset>, frac_digits: u8, out: &mut String) {
        match self {
            DateMacro::IsoDate => {
                out.push_str(&time.format("%Y-%m-%dT%H:%M:%S").to_string());
                push_fraction(time, frac_digits, out);
                out.push_str(&time.format("%:z").to_string());
            }
            DateMacro::Date => out.push_str(&time.format("%b %e %H:%M:%S").to_string()),
            DateMacro::UnixTime => {
                out.push_str(&time.timestamp().to_string());
                push_fraction(time, frac_digits, out);
            }
            DateMacro::Year => out.push_str(&time.format("%Y").to_string()),
            DateMacro::Month => out.push_str(&time.format("%m").to_string()),
            DateMacro::Day => out.push_str(&time.format("%d").to_string()),
            DateMacro::Hour => out.push_str(&time.format("%H").to_string()),
            DateMacro::Min => out.push_str(&time.format("%M").to_string()),
            DateMacro::Sec => out.push_str(&time.format("%S").to_string()),
        }
    }
}

fn push_fraction(time: &DateTime<FixedOffset>, frac_digits: u8, out: &mut String) {
    if frac_digits == 0 {
        return;
    }

    let micros = format!("{:06}", time.timestamp_subsec_micros());
    let digits = usize::from(frac_digits).min(micros.len());
    out.push('.');
    out.push_str(&micros[..digits]);
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    SeqNum,
    Date(Stamp, DateMacro),
    Value(String),
}

impl Segment {
    fn from_name(name: &str) -> Self {
        if name == "SEQNUM" {
            return Segment::SeqNum;
        }

        let (stamp, base) = if let Some(base) = name.strip_prefix("R_") {
            (Stamp::Received, base)
        } else if let Some(base) = name.strip_prefix("S_") {
            (Stamp::Event, base)
        } else {
            (Stamp::Event, name)
        };

        match DateMacro::from_name(base) {
            Some(date_macro) => Segment::Date(stamp, date_macro),
            None => Segment::Value(name.to_string()),
        }
    }
}

/// A compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Compiles `source`, failing on an unterminated or empty `${}` reference.
    pub fn compile(source: &str) -> SinkResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((_, c)) = chars.next() {
            if c != '$' {
                literal.push(c);
                continue;
            }

            let name = match chars.peek() {
                Some((_, '$')) => {
                    chars.next();
                    literal.push('$');
                    continue;
                }
                Some((_, '{')) => {
                    chars.next();
                    let mut name = String::new();
                    let mut terminated = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            terminated = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !terminated {
                        bail!(
                            ErrorKind::TemplateError,
                            "Unterminated template reference",
                            source
                        );
                    }
                    if name.is_empty() {
                        bail!(ErrorKind::TemplateError, "Empty template reference", source);
                    }
                    name
                }
                Some((_, c)) if is_name_char(*c) => {
                    let mut name = String::new();
                    while let Some((_, c)) = chars.peek() {
                        if !is_name_char(*c) {
                            break;
                        }
                        name.push(*c);
                        chars.next();
                    }
                    name
                }
                _ => {
                    literal.push('$');
                    continue;
                }
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::from_name(&name));
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Returns the text the template was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the template for `message`.
    pub fn render(
        &self,
        message: &LogMessage,
        options: &TemplateOptions,
        zone: TimeZoneRole,
        seq_num: i32,
    ) -> String {
        let mut out = String::with_capacity(self.source.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::SeqNum => out.push_str(&seq_num.to_string()),
                Segment::Date(stamp, date_macro) => {
                    let at = match stamp {
                        Stamp::Event => message.timestamp(),
                        Stamp::Received => message.received(),
                    };
                    let time = at.with_timezone(&options.offset_for(zone, at));
                    date_macro.render(&time, options.frac_digits, &mut out);
                }
                Segment::Value(name) => {
                    if let Some(value) = message.value(name) {
                        out.push_str(value);
                    }
                }
            }
        }

        out
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}
