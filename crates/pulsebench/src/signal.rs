use crate::{BenchError, HashMap};

/// Handle to a signal of the simulated design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SignalRef(pub(crate) usize);

/// Transition direction an edge wait reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    Rising,
    Falling,
    /// Any value change.
    Any,
}

impl Edge {
    pub fn matches(self, old: u64, new: u64) -> bool {
        match self {
            Edge::Rising => old == 0 && new != 0,
            Edge::Falling => old != 0 && new == 0,
            Edge::Any => old != new,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

/// A port of the top-level design with its resolved handle.
#[derive(Debug, Clone)]
pub struct NamedSignal {
    pub name: String,
    pub signal: SignalRef,
    pub width: usize,
    pub direction: PortDirection,
}

/// A value change observed during one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub signal: SignalRef,
    pub old: u64,
    pub new: u64,
}

#[derive(Debug)]
struct Entry {
    name: String,
    width: usize,
    direction: PortDirection,
    value: u64,
}

#[derive(Debug, Default)]
pub(crate) struct SignalTable {
    entries: Vec<Entry>,
    by_name: HashMap<String, SignalRef>,
}

fn mask(width: usize) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

impl SignalTable {
    /// Declares a port. Declaring the same name again with the same shape
    /// returns the existing handle.
    pub(crate) fn declare(
        &mut self,
        name: &str,
        width: usize,
        direction: PortDirection,
    ) -> Result<SignalRef, BenchError> {
        if let Some(&signal) = self.by_name.get(name) {
            let entry = &self.entries[signal.0];
            if entry.width != width || entry.direction != direction {
                return Err(BenchError::SignalRedeclared {
                    name: name.to_string(),
                    width,
                    previous: entry.width,
                });
            }
            return Ok(signal);
        }
        let signal = SignalRef(self.entries.len());
        self.entries.push(Entry {
            name: name.to_string(),
            width,
            direction,
            value: 0,
        });
        self.by_name.insert(name.to_string(), signal);
        Ok(signal)
    }

    pub(crate) fn lookup(&self, name: &str) -> Option<SignalRef> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn get(&self, signal: SignalRef) -> u64 {
        self.entries[signal.0].value
    }

    /// Writes `value` truncated to the signal width. Returns the transition
    /// when the stored value actually changed.
    pub(crate) fn set(&mut self, signal: SignalRef, value: u64) -> Option<Transition> {
        let entry = &mut self.entries[signal.0];
        let new = value & mask(entry.width);
        let old = entry.value;
        if old == new {
            return None;
        }
        entry.value = new;
        Some(Transition { signal, old, new })
    }

    pub(crate) fn name(&self, signal: SignalRef) -> &str {
        &self.entries[signal.0].name
    }

    pub(crate) fn named_signals(&self) -> Vec<NamedSignal> {
        self.entries
            .iter()
            .enumerate()
            .map(|(id, entry)| NamedSignal {
                name: entry.name.clone(),
                signal: SignalRef(id),
                width: entry.width,
                direction: entry.direction,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_classification() {
        assert!(Edge::Rising.matches(0, 1));
        assert!(!Edge::Rising.matches(1, 0));
        assert!(Edge::Falling.matches(1, 0));
        assert!(!Edge::Falling.matches(0, 1));
        assert!(Edge::Any.matches(3, 4));
        assert!(!Edge::Any.matches(4, 4));
    }

    #[test]
    fn test_set_truncates_to_width() {
        let mut table = SignalTable::default();
        let compare = table.declare("compare", 8, PortDirection::Input).unwrap();
        let t = table.set(compare, 0x1ff).unwrap();
        assert_eq!(t.new, 0xff);
        assert_eq!(table.get(compare), 0xff);
        assert_eq!(table.set(compare, 0xff), None);
    }

    #[test]
    fn test_redeclaration() {
        let mut table = SignalTable::default();
        let a = table.declare("out", 1, PortDirection::Output).unwrap();
        let b = table.declare("out", 1, PortDirection::Output).unwrap();
        assert_eq!(a, b);
        assert!(matches!(
            table.declare("out", 4, PortDirection::Output),
            Err(BenchError::SignalRedeclared { previous: 1, .. })
        ));
    }
}
