use indexmap::IndexMap;
use serde::Serialize;

/// Value the host sends for a switch in the "on" position.
pub const ON_VALUE: &str = "1";
pub const OFF_VALUE: &str = "0";

/// State token reported for a group with no outlets assigned.
pub const EMPTY_GROUP_STATE: &str = "?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlType {
    Outlet,
    Group,
    Sequence,
}

impl ControlType {
    pub fn as_device_str(&self) -> &'static str {
        match self {
            ControlType::Outlet => "outlet",
            ControlType::Group => "group",
            ControlType::Sequence => "sequence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    On,
    Off,
    Cycle,
    Run,
}

impl Command {
    pub fn as_device_str(&self) -> &'static str {
        match self {
            Command::On => "on",
            Command::Off => "off",
            Command::Cycle => "cycle",
            Command::Run => "run",
        }
    }
}

/// Device-side state of an outlet or group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    Cycle,
    /// Group without any outlets.
    Empty,
}

impl PowerState {
    pub fn from_device_str(s: &str) -> Option<Self> {
        match s {
            "On" => Some(PowerState::On),
            "Off" => Some(PowerState::Off),
            "Cycle" => Some(PowerState::Cycle),
            EMPTY_GROUP_STATE => Some(PowerState::Empty),
            _ => None,
        }
    }

    pub fn as_device_str(&self) -> &'static str {
        match self {
            PowerState::On => "On",
            PowerState::Off => "Off",
            PowerState::Cycle => "Cycle",
            PowerState::Empty => EMPTY_GROUP_STATE,
        }
    }
}

/// How outlet on/off controls are presented to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlStyle {
    /// 0/1 switch.
    #[default]
    Switch,
    /// On/Off/Cycle dropdown valued with the device state token.
    Dropdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlKind {
    Switch {
        label_on: &'static str,
        label_off: &'static str,
    },
    Button {
        label: &'static str,
        label_pressed: &'static str,
    },
    Dropdown {
        options: &'static [&'static str],
    },
}

/// A property the host can write back through `apply_control`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllableProperty {
    pub name: String,
    pub value: String,
    #[serde(flatten)]
    pub kind: ControlKind,
}

impl ControllableProperty {
    pub fn is_button(&self) -> bool {
        matches!(self.kind, ControlKind::Button { .. })
    }
}

/// Complete set of properties published to the host after a poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub statistics: IndexMap<String, String>,
    pub historical: IndexMap<String, String>,
    pub controls: Vec<ControllableProperty>,
}

impl Snapshot {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.statistics.get(name).map(String::as_str)
    }

    pub fn historical(&self, name: &str) -> Option<&str> {
        self.historical.get(name).map(String::as_str)
    }

    pub fn control(&self, name: &str) -> Option<&ControllableProperty> {
        self.controls.iter().find(|c| c.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.statistics.is_empty() && self.historical.is_empty() && self.controls.is_empty()
    }
}

/// Events emitted after a poll or control changed what the host sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    PropertyChanged {
        name: String,
        old: Option<String>,
        new: String,
    },
    PropertyRemoved {
        name: String,
        old: String,
    },
    HistoricalSample {
        name: String,
        value: String,
    },
    ControlApplied {
        property: String,
        command: Command,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_state_tokens() {
        assert_eq!(PowerState::from_device_str("On"), Some(PowerState::On));
        assert_eq!(PowerState::from_device_str("?"), Some(PowerState::Empty));
        assert_eq!(PowerState::from_device_str("on"), None);
        assert_eq!(PowerState::Cycle.as_device_str(), "Cycle");
    }

    #[test]
    fn control_serialises_flat() {
        let control = ControllableProperty {
            name: "Outlet_1#Cycle".into(),
            value: "0".into(),
            kind: ControlKind::Button {
                label: "Cycle",
                label_pressed: "Cycling",
            },
        };
        let json = serde_json::to_value(&control).unwrap();
        assert_eq!(json["type"], "button");
        assert_eq!(json["label_pressed"], "Cycling");
        assert_eq!(json["name"], "Outlet_1#Cycle");
        assert!(control.is_button());
    }
}
