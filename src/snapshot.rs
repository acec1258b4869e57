use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::naming::{analog_property, analog_value, strip_numeric_label, Field, Target};
use crate::types::*;

pub const OUTLET_OPTIONS: &[&str] = &["On", "Off", "Cycle"];
pub const NO_OUTLETS_IN_GROUP: &str = "No outlets in group";
pub const NONE: &str = "None";

const BUTTON_IDLE: &str = "0";

fn switch(name: String, on: bool) -> ControllableProperty {
    ControllableProperty {
        name,
        value: if on { ON_VALUE } else { OFF_VALUE }.to_string(),
        kind: ControlKind::Switch {
            label_on: "On",
            label_off: "Off",
        },
    }
}

fn button(name: String, label: &'static str, label_pressed: &'static str) -> ControllableProperty {
    ControllableProperty {
        name,
        value: BUTTON_IDLE.to_string(),
        kind: ControlKind::Button {
            label,
            label_pressed,
        },
    }
}

fn dropdown(name: String, options: &'static [&'static str], value: &str) -> ControllableProperty {
    ControllableProperty {
        name,
        value: value.to_string(),
        kind: ControlKind::Dropdown { options },
    }
}

/// Accumulates one poll cycle's properties. Nothing is published until
/// [`SnapshotBuilder::finish`].
pub(crate) struct SnapshotBuilder<'a> {
    style: ControlStyle,
    historical_names: &'a HashSet<String>,
    statistics: IndexMap<String, String>,
    historical: IndexMap<String, String>,
    controls: Vec<ControllableProperty>,
}

impl<'a> SnapshotBuilder<'a> {
    pub fn new(style: ControlStyle, historical_names: &'a HashSet<String>) -> Self {
        Self {
            style,
            historical_names,
            statistics: IndexMap::new(),
            historical: IndexMap::new(),
            controls: Vec::new(),
        }
    }

    /// Last write wins; a control name appears once.
    fn add_control(&mut self, control: ControllableProperty) {
        self.controls.retain(|c| c.name != control.name);
        self.statistics
            .insert(control.name.clone(), control.value.clone());
        self.controls.push(control);
    }

    pub fn outlet(&mut self, index: usize, name: &str, state: Option<&str>) {
        let target = Target::outlet(index);
        self.statistics.insert(
            target.property(Field::Name),
            strip_numeric_label(name).to_string(),
        );

        let control_name = target.property(Field::OutletControl);
        match self.style {
            ControlStyle::Switch => {
                let on = state.and_then(PowerState::from_device_str) == Some(PowerState::On);
                self.add_control(switch(control_name, on));
            }
            ControlStyle::Dropdown => match state {
                Some(s) if OUTLET_OPTIONS.contains(&s) => {
                    self.add_control(dropdown(control_name, OUTLET_OPTIONS, s));
                }
                _ => {
                    self.statistics.insert(control_name, NONE.to_string());
                }
            },
        }

        self.add_control(button(target.property(Field::Cycle), "Cycle", "Cycling"));
    }

    pub fn group(&mut self, key: &str, name: &str, state: &str) {
        let target = Target::Group(key.to_string());
        self.statistics
            .insert(target.property(Field::Name), name.to_string());

        match PowerState::from_device_str(state) {
            Some(PowerState::Empty) => {
                self.statistics
                    .insert(target.property(Field::Status), NO_OUTLETS_IN_GROUP.to_string());
            }
            parsed => {
                self.statistics
                    .insert(target.property(Field::Status), state.to_string());
                self.add_control(switch(
                    target.property(Field::Control),
                    parsed == Some(PowerState::On),
                ));
            }
        }

        self.add_control(button(target.property(Field::Cycle), "Cycle", "Cycling"));
    }

    pub fn sequence(&mut self, name: &str) {
        let target = Target::Sequence(name.to_string());
        self.statistics
            .insert(target.property(Field::Name), name.to_string());
        self.add_control(button(target.property(Field::Control), "Run", "Running"));
    }

    pub fn analog(&mut self, channel: &str, raw: &str) {
        let property = analog_property(channel);
        let Some(value) = analog_value(channel, raw) else {
            debug!(channel, raw, "dropping invalid analog reading");
            return;
        };
        if self.historical_names.contains(&property) {
            trace!(%property, %value, "historical reading");
            self.historical.insert(property, value);
        } else {
            self.statistics.insert(property, value);
        }
    }

    pub fn finish(self) -> Snapshot {
        Snapshot {
            statistics: self.statistics,
            historical: self.historical,
            controls: self.controls,
        }
    }
}

/// Everything one poll cycle retrieved from the device.
pub(crate) struct DeviceView<'a> {
    pub outlet_names: &'a IndexMap<String, String>,
    pub group_names: &'a IndexMap<String, String>,
    pub outlet_states: &'a IndexMap<String, String>,
    pub group_states: &'a IndexMap<String, String>,
    pub analog: &'a IndexMap<String, String>,
}

pub(crate) fn build_snapshot(
    view: &DeviceView<'_>,
    sequences: &[String],
    historical_names: &HashSet<String>,
    style: ControlStyle,
) -> Snapshot {
    let mut builder = SnapshotBuilder::new(style, historical_names);

    for (i, (key, name)) in view.outlet_names.iter().enumerate() {
        let state = view.outlet_states.get(key).map(String::as_str);
        builder.outlet(i + 1, name, state);
    }

    for (key, name) in view.group_names {
        let state = view
            .group_states
            .get(key)
            .map(String::as_str)
            .unwrap_or(EMPTY_GROUP_STATE);
        builder.group(key, name, state);
    }

    for name in sequences {
        builder.sequence(name);
    }

    for (channel, raw) in view.analog {
        builder.analog(channel, raw);
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn build(
        outlets: &[(&str, &str)],
        outlet_states: &[(&str, &str)],
        groups: &[(&str, &str)],
        group_states: &[(&str, &str)],
        analog: &[(&str, &str)],
        historical: &[&str],
    ) -> Snapshot {
        let outlet_names = map(outlets);
        let outlet_states = map(outlet_states);
        let group_names = map(groups);
        let group_states = map(group_states);
        let analog = map(analog);
        let historical: HashSet<String> = historical.iter().map(|s| s.to_string()).collect();
        let view = DeviceView {
            outlet_names: &outlet_names,
            group_names: &group_names,
            outlet_states: &outlet_states,
            group_states: &group_states,
            analog: &analog,
        };
        build_snapshot(&view, &["Boot".to_string()], &historical, ControlStyle::Switch)
    }

    #[test]
    fn outlets_numbered_in_device_order() {
        let snap = build(
            &[("7", "3: Spare"), ("2", "Router")],
            &[("7", "On"), ("2", "Off")],
            &[],
            &[],
            &[],
            &[],
        );
        assert_eq!(snap.get("Outlet_1#Name"), Some("Spare"));
        assert_eq!(snap.get("Outlet_1#OutletControl"), Some("1"));
        assert_eq!(snap.get("Outlet_2#Name"), Some("Router"));
        assert_eq!(snap.get("Outlet_2#OutletControl"), Some("0"));
        assert!(snap.control("Outlet_2#Cycle").unwrap().is_button());
        assert!(snap.get("Outlet_1#Status").is_none());
    }

    #[test]
    fn empty_group_has_no_switch() {
        let snap = build(&[], &[], &[("g1", "Rack")], &[("g1", "?")], &[], &[]);
        assert_eq!(snap.get("Group_g1#Status"), Some(NO_OUTLETS_IN_GROUP));
        assert!(snap.control("Group_g1#Control").is_none());
        assert!(snap.control("Group_g1#Status").is_none());
        assert!(snap.control("Group_g1#Cycle").is_some());
    }

    #[test]
    fn group_switch_mirrors_status() {
        let snap = build(&[], &[], &[("g1", "Rack")], &[("g1", "On")], &[], &[]);
        assert_eq!(snap.get("Group_g1#Name"), Some("Rack"));
        assert_eq!(snap.get("Group_g1#Status"), Some("On"));
        assert_eq!(snap.control("Group_g1#Control").unwrap().value, "1");
    }

    #[test]
    fn sequences_get_run_button() {
        let snap = build(&[], &[], &[], &[], &[], &[]);
        assert_eq!(snap.get("Sequence_Boot#Name"), Some("Boot"));
        let control = snap.control("Sequence_Boot#Control").unwrap();
        assert_eq!(
            control.kind,
            ControlKind::Button {
                label: "Run",
                label_pressed: "Running"
            }
        );
    }

    #[test]
    fn analog_routing_and_ceiling() {
        let snap = build(
            &[],
            &[],
            &[],
            &[],
            &[("LC1Current", "1.0"), ("LV1Voltage", "999.9"), ("T0", "21.5")],
            &["TemperatureT1(C)", "LV1Voltage(V)", "NotAChannel"],
        );
        assert_eq!(snap.get("LC1Current(mA)"), Some("1000.0"));
        assert!(snap.get("LV1Voltage(V)").is_none());
        assert!(snap.historical("LV1Voltage(V)").is_none());
        assert_eq!(snap.historical("TemperatureT1(C)"), Some("21.5"));
        assert!(snap.get("TemperatureT1(C)").is_none());
    }

    #[test]
    fn duplicate_control_keeps_last() {
        let historical = HashSet::new();
        let mut builder = SnapshotBuilder::new(ControlStyle::Switch, &historical);
        builder.outlet(1, "A", Some("Off"));
        builder.outlet(1, "A", Some("On"));
        let snap = builder.finish();
        let matching: Vec<_> = snap
            .controls
            .iter()
            .filter(|c| c.name == "Outlet_1#OutletControl")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].value, "1");
        assert_eq!(snap.get("Outlet_1#OutletControl"), Some("1"));
    }

    #[test]
    fn dropdown_style_uses_state_tokens() {
        let historical = HashSet::new();
        let mut builder = SnapshotBuilder::new(ControlStyle::Dropdown, &historical);
        builder.outlet(1, "A", Some("Cycle"));
        builder.outlet(2, "B", Some("Locked"));
        let snap = builder.finish();
        let control = snap.control("Outlet_1#OutletControl").unwrap();
        assert_eq!(control.value, "Cycle");
        assert_eq!(control.kind, ControlKind::Dropdown { options: OUTLET_OPTIONS });
        assert!(snap.control("Outlet_2#OutletControl").is_none());
        assert_eq!(snap.get("Outlet_2#OutletControl"), Some(NONE));
    }
}
