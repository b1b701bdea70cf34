//! Parsers for device shell output.
//!
//! These are pure functions over text. Diagnostic dumps such as
//! `dumpsys battery` are unversioned and differ between vendors, so fields are
//! located by keyword anchors rather than by position. Each field owns an
//! ordered table of [`FieldRule`]s; supporting a new vendor layout means adding
//! a rule, not changing control flow.

/// How a rule recognizes the line carrying a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The text before the first `:` equals this key (case-insensitive).
    Key(&'static str),
    /// Every listed word appears on the line as a whole word.
    Words(&'static [&'static str]),
    /// Some word on the line starts with this prefix.
    Prefix(&'static str),
}

/// Whether a captured integer may carry a leading minus sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Signed,
    Unsigned,
}

/// One matching rule: an anchor plus words that disqualify a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub anchor: Anchor,
    pub exclude: &'static [&'static str],
}

impl FieldRule {
    const fn new(anchor: Anchor) -> Self {
        Self {
            anchor,
            exclude: &[],
        }
    }

    const fn excluding(anchor: Anchor, exclude: &'static [&'static str]) -> Self {
        Self { anchor, exclude }
    }

    /// Returns whether `line` satisfies this rule.
    pub fn matches(&self, line: &str) -> bool {
        let lower = line.to_ascii_lowercase();
        let words = words(&lower);

        if self.exclude.iter().any(|ex| words.contains(ex)) {
            return false;
        }

        match self.anchor {
            Anchor::Key(key) => lower
                .split_once(':')
                .is_some_and(|(k, _)| k.trim() == key),
            Anchor::Words(required) => required.iter().all(|w| words.contains(w)),
            Anchor::Prefix(prefix) => words.iter().any(|w| w.starts_with(prefix)),
        }
    }
}

/// Battery fields read from `dumpsys battery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryField {
    /// Instantaneous current in mA; negative while discharging on most devices.
    Current,
    /// Battery voltage in mV.
    Voltage,
    /// Battery temperature in tenths of a degree Celsius.
    Temperature,
}

const CURRENT_RULES: &[FieldRule] = &[
    FieldRule::new(Anchor::Words(&["current", "now"])),
    FieldRule::new(Anchor::Key("current")),
    FieldRule::excluding(Anchor::Words(&["current"]), &["max"]),
];

const VOLTAGE_RULES: &[FieldRule] = &[
    FieldRule::new(Anchor::Key("voltage")),
    FieldRule::excluding(Anchor::Words(&["voltage"]), &["max"]),
];

const TEMPERATURE_RULES: &[FieldRule] = &[
    FieldRule::new(Anchor::Key("temperature")),
    FieldRule::new(Anchor::Prefix("temp")),
];

impl BatteryField {
    /// Ordered matching rules; earlier rules win over later ones.
    pub fn rules(self) -> &'static [FieldRule] {
        match self {
            BatteryField::Current => CURRENT_RULES,
            BatteryField::Voltage => VOLTAGE_RULES,
            BatteryField::Temperature => TEMPERATURE_RULES,
        }
    }

    pub fn sign(self) -> Sign {
        match self {
            BatteryField::Current | BatteryField::Temperature => Sign::Signed,
            BatteryField::Voltage => Sign::Unsigned,
        }
    }
}

/// Extracts a battery field from `dumpsys battery` output.
pub fn extract(text: &str, field: BatteryField) -> Option<i64> {
    extract_with(text, field.rules(), field.sign())
}

/// Applies `rules` in order to `text`.
///
/// For each rule, the first line that matches it and also carries an integer
/// yields the value. Returns `None` when no rule finds one.
pub fn extract_with(text: &str, rules: &[FieldRule], sign: Sign) -> Option<i64> {
    rules.iter().find_map(|rule| {
        text.lines()
            .filter(|line| rule.matches(line))
            .find_map(|line| first_int(line, sign))
    })
}

/// Splits a lowercased line into alphanumeric words.
fn words(lower: &str) -> Vec<&str> {
    lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Returns the first run of ASCII digits in `text`, with a directly preceding
/// `-` when `sign` is [`Sign::Signed`].
pub fn first_int(text: &str, sign: Sign) -> Option<i64> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let len = bytes[start..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let digits = &text[start..start + len];

    let negative = sign == Sign::Signed && start > 0 && bytes[start - 1] == b'-';
    let value: i64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Returns the first unsigned integer in `text`.
pub fn first_uint(text: &str) -> Option<u64> {
    all_uints(text).into_iter().next()
}

/// Returns every run of ASCII digits in `text` that fits in a `u64`.
pub fn all_uints(text: &str) -> Vec<u64> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Parses the aggregate `cpu` line of `/proc/stat`.
///
/// Returns the cumulative time buckets in kernel order (user, nice, system,
/// idle, iowait, irq, softirq, steal, ...). Returns `None` when the line is not
/// the aggregate line, when any bucket is not a number, or when fewer than five
/// buckets are present.
pub fn parse_cpu_line(line: &str) -> Option<Vec<u64>> {
    let mut parts = line.split_whitespace();
    if parts.next()? != "cpu" {
        return None;
    }

    let buckets = parts
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<u64>>>()?;

    (buckets.len() >= 5).then_some(buckets)
}
