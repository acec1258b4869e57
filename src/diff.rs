use serde_json::Value;

use crate::types::{Event, Snapshot};

/// Recursive JSON diff; collects `(path, old, new)` for every changed leaf.
pub(crate) fn diff_json(
    previous: &Value,
    current: &Value,
    path_prefix: &str,
    changes: &mut Vec<(String, Value, Value)>,
) {
    match (previous, current) {
        (Value::Object(prev_map), Value::Object(curr_map)) => {
            for (key, curr_val) in curr_map {
                let path = if path_prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{path_prefix}.{key}")
                };
                match prev_map.get(key) {
                    Some(prev_val) => diff_json(prev_val, curr_val, &path, changes),
                    None => {
                        if curr_val.is_object() {
                            diff_json(&Value::Object(serde_json::Map::new()), curr_val, &path, changes);
                        } else {
                            changes.push((path, Value::Null, curr_val.clone()));
                        }
                    }
                }
            }
            for (key, prev_val) in prev_map {
                if !curr_map.contains_key(key) {
                    let path = if path_prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{path_prefix}.{key}")
                    };
                    changes.push((path, prev_val.clone(), Value::Null));
                }
            }
        }
        (prev, curr) if prev != curr => {
            changes.push((path_prefix.to_string(), prev.clone(), curr.clone()));
        }
        _ => {}
    }
}

/// Events describing how `current` differs from `previous`.
pub(crate) fn snapshot_events(previous: &Snapshot, current: &Snapshot) -> Vec<Event> {
    let mut events = Vec::new();

    for (name, new) in &current.statistics {
        let old = previous.statistics.get(name);
        if old != Some(new) {
            events.push(Event::PropertyChanged {
                name: name.clone(),
                old: old.cloned(),
                new: new.clone(),
            });
        }
    }

    for (name, old) in &previous.statistics {
        if !current.statistics.contains_key(name) {
            events.push(Event::PropertyRemoved {
                name: name.clone(),
                old: old.clone(),
            });
        }
    }

    for (name, value) in &current.historical {
        events.push(Event::HistoricalSample {
            name: name.clone(),
            value: value.clone(),
        });
    }

    events
}
