//! Property naming shared by the snapshot builder and the control dispatcher.
//!
//! Roots are `Outlet_<index>`, `Group_<key>` and `Sequence_<name>`; fields are
//! appended after `#`. Parsing recovers the key as the text between the first
//! `_` and the first `#`, so keys must not contain `#`.

pub const OUTLET_PREFIX: &str = "Outlet_";
pub const GROUP_PREFIX: &str = "Group_";
pub const SEQUENCE_PREFIX: &str = "Sequence_";
pub const HASH: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    OutletControl,
    Control,
    Status,
    Cycle,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::OutletControl => "OutletControl",
            Field::Control => "Control",
            Field::Status => "Status",
            Field::Cycle => "Cycle",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Name" => Some(Field::Name),
            "OutletControl" => Some(Field::OutletControl),
            "Control" => Some(Field::Control),
            "Status" => Some(Field::Status),
            "Cycle" => Some(Field::Cycle),
            _ => None,
        }
    }
}

/// Device object a property belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// 1-based outlet index, as a string.
    Outlet(String),
    Group(String),
    Sequence(String),
}

impl Target {
    pub fn outlet(index: usize) -> Self {
        Target::Outlet(index.to_string())
    }

    pub fn key(&self) -> &str {
        match self {
            Target::Outlet(k) | Target::Group(k) | Target::Sequence(k) => k,
        }
    }

    pub fn root(&self) -> String {
        match self {
            Target::Outlet(k) => format!("{OUTLET_PREFIX}{k}"),
            Target::Group(k) => format!("{GROUP_PREFIX}{k}"),
            Target::Sequence(k) => format!("{SEQUENCE_PREFIX}{k}"),
        }
    }

    pub fn property(&self, field: Field) -> String {
        format!("{}{HASH}{}", self.root(), field.as_str())
    }

    /// Inverse of [`Target::property`]. `None` for properties outside the
    /// three roots.
    pub fn parse(property: &str) -> Option<Self> {
        let key = parse_key(property)?.to_string();
        if property.starts_with(OUTLET_PREFIX) {
            Some(Target::Outlet(key))
        } else if property.starts_with(GROUP_PREFIX) {
            Some(Target::Group(key))
        } else if property.starts_with(SEQUENCE_PREFIX) {
            Some(Target::Sequence(key))
        } else {
            None
        }
    }
}

/// Text between the first `_` and the first `#`.
pub fn parse_key(property: &str) -> Option<&str> {
    let start = property.find('_')? + 1;
    let end = property.find(HASH)?;
    if end < start {
        return None;
    }
    Some(&property[start..end])
}

/// Field after the first `#`.
pub fn parse_field(property: &str) -> Option<Field> {
    let (_, field) = property.split_once(HASH)?;
    Field::parse(field)
}

/// Drop a numeric label the device prepends to outlet names (`"3: Spare"`).
pub fn strip_numeric_label(name: &str) -> &str {
    let trimmed = name.trim_start();
    let digits = trimmed.len() - trimmed.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return name;
    }
    match trimmed[digits..].trim_start().strip_prefix(':') {
        Some(rest) if !rest.trim().is_empty() => rest.trim_start(),
        _ => name,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalogUnit {
    /// Reported in amps, published in milliamps.
    Current,
    Voltage,
    Temperature,
}

impl AnalogUnit {
    pub fn classify(channel: &str) -> Option<Self> {
        if channel.contains("Current") || channel.starts_with("LC") {
            Some(AnalogUnit::Current)
        } else if channel.contains("Voltage") || channel.starts_with("LV") {
            Some(AnalogUnit::Voltage)
        } else if channel.contains("T0") || channel.contains("T1") {
            Some(AnalogUnit::Temperature)
        } else {
            None
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            AnalogUnit::Current => "(mA)",
            AnalogUnit::Voltage => "(V)",
            AnalogUnit::Temperature => "(C)",
        }
    }

    pub fn scale(&self) -> f64 {
        match self {
            AnalogUnit::Current => 1000.0,
            AnalogUnit::Voltage | AnalogUnit::Temperature => 1.0,
        }
    }
}

/// Readings at or above this are device glitches and are dropped.
pub const ANALOG_CEILING: f64 = 999.9;

/// Display key for an analog channel, without the unit suffix.
pub fn analog_display_key(channel: &str) -> String {
    if channel.contains("T0") {
        "TemperatureT1".to_string()
    } else if channel.contains("T1") {
        "TemperatureT2".to_string()
    } else {
        channel.to_string()
    }
}

/// Full property name for an analog channel, unit suffix included.
pub fn analog_property(channel: &str) -> String {
    let key = analog_display_key(channel);
    match AnalogUnit::classify(channel) {
        Some(unit) => format!("{key}{}", unit.suffix()),
        None => key,
    }
}

/// Scaled display value, or `None` if the raw reading is unusable.
pub fn analog_value(channel: &str, raw: &str) -> Option<String> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() || value >= ANALOG_CEILING {
        return None;
    }
    match AnalogUnit::classify(channel) {
        Some(AnalogUnit::Current) => Some(
            shift_decimal(raw.trim(), 3)
                .unwrap_or_else(|| display_float(value * AnalogUnit::Current.scale())),
        ),
        _ => Some(raw.trim().to_string()),
    }
}

/// Multiply a plain decimal string by `10^places` without going through
/// `f64`, so no digits are gained or lost. `None` for anything other than
/// `[-]digits[.digits]`.
fn shift_decimal(raw: &str, places: usize) -> Option<String> {
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw),
    };
    let (int, frac) = digits.split_once('.').unwrap_or((digits, ""));
    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (int.is_empty() && frac.is_empty()) || !is_digits(int) || !is_digits(frac) {
        return None;
    }

    let mut frac = frac.to_string();
    while frac.len() < places {
        frac.push('0');
    }
    let (moved, rest) = frac.split_at(places);

    let int = format!("{int}{moved}");
    let int = match int.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let rest = match rest.trim_end_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    Some(format!("{sign}{int}.{rest}"))
}

/// Shortest float text, always with a fractional part.
fn display_float(value: f64) -> String {
    let text = value.to_string();
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{text}.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_and_fields() {
        assert_eq!(Target::outlet(3).property(Field::OutletControl), "Outlet_3#OutletControl");
        assert_eq!(Target::Group("group01".into()).property(Field::Status), "Group_group01#Status");
        assert_eq!(Target::Sequence("Boot".into()).property(Field::Control), "Sequence_Boot#Control");
    }

    #[test]
    fn parse_inverts_formatting() {
        let targets = [
            Target::outlet(1),
            Target::outlet(16),
            Target::Group("1".into()),
            Target::Group("rack_a".into()),
            Target::Sequence("01".into()),
            Target::Sequence("Power Up".into()),
        ];
        for target in targets {
            for field in [Field::Name, Field::Control, Field::Cycle] {
                let property = target.property(field);
                assert_eq!(Target::parse(&property), Some(target.clone()), "{property}");
                assert_eq!(parse_key(&property), Some(target.key()));
                assert_eq!(parse_field(&property), Some(field));
            }
        }
    }

    #[test]
    fn parse_rejects_foreign_properties() {
        assert_eq!(Target::parse("LC1Current(mA)"), None);
        assert_eq!(Target::parse("Outlet_3"), None);
        assert_eq!(Target::parse("Outlets#Name"), None);
        assert_eq!(Target::parse("Device_1#Name"), None);
        assert_eq!(parse_field("Outlet_1#Bogus"), None);
    }

    #[test]
    fn strips_device_numeric_label() {
        assert_eq!(strip_numeric_label("3: Spare"), "Spare");
        assert_eq!(strip_numeric_label("12:Rack Fan"), "Rack Fan");
        assert_eq!(strip_numeric_label("VNOC-QSYS-DSP"), "VNOC-QSYS-DSP");
        assert_eq!(strip_numeric_label("8 Port Switch"), "8 Port Switch");
        assert_eq!(strip_numeric_label("7:"), "7:");
    }

    #[test]
    fn analog_keys_and_units() {
        assert_eq!(analog_property("T0"), "TemperatureT1(C)");
        assert_eq!(analog_property("T1Temperature"), "TemperatureT2(C)");
        assert_eq!(analog_property("LC1Current"), "LC1Current(mA)");
        assert_eq!(analog_property("LV2Voltage"), "LV2Voltage(V)");
        assert_eq!(analog_property("LC2"), "LC2(mA)");
        assert_eq!(analog_property("Humidity"), "Humidity");
    }

    #[test]
    fn current_is_scaled_to_milliamps() {
        assert_eq!(analog_value("LC1Current", "1.0").as_deref(), Some("1000.0"));
        assert_eq!(analog_value("LC1", "0.3452").as_deref(), Some("345.2"));
        assert_eq!(analog_value("LC1", "0.01234").as_deref(), Some("12.34"));
        assert_eq!(analog_value("LC2", "0.25").as_deref(), Some("250.0"));
        assert_eq!(analog_value("LC2", "2").as_deref(), Some("2000.0"));
        assert_eq!(analog_value("LC2", ".5").as_deref(), Some("500.0"));
        assert_eq!(analog_value("LC2", "1e-3").as_deref(), Some("1.0"));
        assert_eq!(analog_value("LV1Voltage", "120.4").as_deref(), Some("120.4"));
    }

    #[test]
    fn glitch_readings_dropped() {
        assert_eq!(analog_value("LV2Voltage", "999.9"), None);
        assert_eq!(analog_value("T0", "1200"), None);
        assert_eq!(analog_value("T1", "n/a"), None);
        assert_eq!(analog_value("T1", "23.5").as_deref(), Some("23.5"));
    }
}
