use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Per-key delayed tasks with replace-on-reset semantics. Arming a key that is already
/// pending pushes its deadline out to `now + quiet`.
#[derive(Debug)]
pub struct Debouncer<K, V> {
    quiet: Duration,
    timers: BTreeMap<K, (Instant, V)>,
}

impl<K: Ord + Clone, V> Debouncer<K, V> {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            timers: BTreeMap::new(),
        }
    }

    /// Returns true when an existing timer was reset.
    pub fn arm(&mut self, key: K, value: V, now: Instant) -> bool {
        self.timers.insert(key, (now + self.quiet, value)).is_some()
    }

    /// Removes and returns every entry whose deadline has passed, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(K, V)> {
        let mut due = self
            .timers
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(key, (deadline, _))| (*deadline, key.clone()))
            .collect::<Vec<_>>();
        due.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        due.into_iter()
            .filter_map(|(_, key)| {
                let (_, value) = self.timers.remove(&key)?;
                Some((key, value))
            })
            .collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|(deadline, _)| *deadline).min()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
