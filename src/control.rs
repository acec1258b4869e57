use crate::naming::{parse_field, Field, Target};
use crate::types::{Command, ControlKind, PowerState, Snapshot, OFF_VALUE, ON_VALUE};

/// A host control request resolved to a device command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ControlRequest {
    pub target: Target,
    pub command: Command,
}

fn is_on_value(value: &str) -> bool {
    let value = value.trim();
    value == ON_VALUE || value.eq_ignore_ascii_case("on")
}

/// Map a property write onto a device command. `None` for properties that
/// do not address a controllable outlet, group or sequence.
pub(crate) fn resolve(property: &str, value: &str) -> Option<ControlRequest> {
    let target = Target::parse(property)?;
    let field = parse_field(property)?;

    let command = match (&target, field) {
        (Target::Sequence(_), Field::Control) => Command::Run,
        (Target::Sequence(_), _) => return None,
        (_, Field::Cycle) => Command::Cycle,
        (Target::Outlet(_), Field::OutletControl) | (Target::Group(_), Field::Control) => {
            if value.trim().eq_ignore_ascii_case("cycle") {
                Command::Cycle
            } else if is_on_value(value) {
                Command::On
            } else {
                Command::Off
            }
        }
        _ => return None,
    };

    Some(ControlRequest { target, command })
}

/// Overwrite the value of a switch or dropdown after the device accepted the
/// command. Buttons are momentary and stay untouched. A group switch also
/// moves the group's `#Status`. Returns the properties whose value changed.
pub(crate) fn patch(snapshot: &mut Snapshot, property: &str, value: &str) -> Vec<String> {
    let Some(control) = snapshot.controls.iter_mut().find(|c| c.name == property) else {
        return Vec::new();
    };
    let (value, on) = match control.kind {
        ControlKind::Button { .. } => return Vec::new(),
        ControlKind::Switch { .. } if is_on_value(value) => (ON_VALUE, true),
        ControlKind::Switch { .. } => (OFF_VALUE, false),
        ControlKind::Dropdown { .. } => (value, false),
    };
    if control.value == value {
        return Vec::new();
    }
    control.value = value.to_string();
    snapshot
        .statistics
        .insert(property.to_string(), value.to_string());
    let mut changed = vec![property.to_string()];

    if let (Some(target @ Target::Group(_)), Some(Field::Control)) =
        (Target::parse(property), parse_field(property))
    {
        let status = target.property(Field::Status);
        let state = if on { PowerState::On } else { PowerState::Off };
        let previous = snapshot
            .statistics
            .insert(status.clone(), state.as_device_str().to_string());
        if previous.as_deref() != Some(state.as_device_str()) {
            changed.push(status);
        }
    }
    changed
}
