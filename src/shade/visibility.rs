//! Notification visibility reporting
//!
//! While the shade is visible to the user, layout changes trigger a sampling
//! pass over the notification stack. Passes are throttled to one per
//! `min_interval`; a burst of layout changes collapses into one pass and the
//! pass always sees the latest layout, so no change is lost.

use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::collaborators::{EntryKey, EntrySource, VisibilitySink};

/// One entry of a visibility delta
#[derive(Debug, Clone, Serialize)]
pub struct NotificationVisibility {
    pub key: EntryKey,
    /// Position in the stack when sampled
    pub rank: usize,
    pub visible: bool,
}

impl NotificationVisibility {
    pub fn new(key: EntryKey, rank: usize, visible: bool) -> Self {
        Self { key, rank, visible }
    }
}

// Rank is informational; two samples of the same row compare equal.
impl PartialEq for NotificationVisibility {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.visible == other.visible
    }
}

impl Eq for NotificationVisibility {}

impl Hash for NotificationVisibility {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.visible.hash(state);
    }
}

/// Throttled visibility sampler
#[derive(Debug)]
pub struct VisibilityReporter {
    min_interval: Duration,
    logging: bool,
    currently_visible: Vec<NotificationVisibility>,
    last_report: Option<Instant>,
    pending: Option<Instant>,
}

impl VisibilityReporter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            logging: false,
            currently_visible: Vec::new(),
            last_report: None,
            pending: None,
        }
    }

    pub fn is_logging(&self) -> bool {
        self.logging
    }

    /// Shade became visible: start listening and sample soon
    pub fn start(&mut self, now: Instant) {
        if self.logging {
            return;
        }
        tracing::debug!("visibility logging started");
        self.logging = true;
        self.on_child_locations_changed(now);
    }

    /// Shade hidden: report everything still visible as gone and reset
    pub fn stop(&mut self, sink: Option<&mut dyn VisibilitySink>) {
        if !self.logging {
            return;
        }
        self.logging = false;
        self.pending = None;
        let no_longer: Vec<_> = self
            .currently_visible
            .drain(..)
            .map(|v| NotificationVisibility::new(v.key, v.rank, false))
            .collect();
        tracing::debug!(flushed = no_longer.len(), "visibility logging stopped");
        if !no_longer.is_empty() {
            deliver(sink, &[], &no_longer);
        }
    }

    /// Layout moved; schedule a pass unless one is already pending
    pub fn on_child_locations_changed(&mut self, now: Instant) {
        if !self.logging || self.pending.is_some() {
            return;
        }
        let at = match self.last_report {
            Some(last) => now.max(last + self.min_interval),
            None => now,
        };
        self.pending = Some(at);
    }

    /// When the pending pass wants to run
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending
    }

    pub fn currently_visible(&self) -> &[NotificationVisibility] {
        &self.currently_visible
    }

    /// Run the pending pass if its time has come. Returns true when a delta
    /// was emitted.
    pub fn run_if_due(
        &mut self,
        now: Instant,
        source: &dyn EntrySource,
        sink: Option<&mut dyn VisibilitySink>,
    ) -> bool {
        match self.pending {
            Some(at) if now >= at => {}
            _ => return false,
        }
        self.pending = None;
        self.sample(now, source, sink)
    }

    fn sample(&mut self, now: Instant, source: &dyn EntrySource, sink: Option<&mut dyn VisibilitySink>) -> bool {
        let visible: Vec<NotificationVisibility> = source
            .active_entries()
            .into_iter()
            .enumerate()
            .filter(|(_, entry)| entry.location.is_visible())
            .map(|(rank, entry)| NotificationVisibility::new(entry.key, rank, true))
            .collect();

        let newly: Vec<_> = visible
            .iter()
            .filter(|v| !self.currently_visible.iter().any(|c| c.key == v.key))
            .cloned()
            .collect();
        let no_longer: Vec<_> = self
            .currently_visible
            .iter()
            .filter(|c| !visible.iter().any(|v| v.key == c.key))
            .map(|c| NotificationVisibility::new(c.key.clone(), c.rank, false))
            .collect();

        if newly.is_empty() && no_longer.is_empty() {
            return false;
        }

        tracing::debug!(newly = newly.len(), no_longer = no_longer.len(), "visibility changed");
        deliver(sink, &newly, &no_longer);
        self.currently_visible = visible;
        self.last_report = Some(now);
        true
    }
}

fn deliver(
    sink: Option<&mut dyn VisibilitySink>,
    newly: &[NotificationVisibility],
    no_longer: &[NotificationVisibility],
) {
    let Some(sink) = sink else {
        tracing::debug!("no visibility sink, dropping delta");
        return;
    };
    if let Err(e) = sink.report_visibility_delta(newly, no_longer) {
        // The next pass reconciles.
        tracing::warn!("Failed to report notification visibility: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::SinkError;
    use crate::shade::collaborators::{ActiveEntry, StackLocation};

    #[derive(Default)]
    struct Stack(RefCell<Vec<ActiveEntry>>);

    impl Stack {
        fn set(&self, rows: &[(&str, StackLocation)]) {
            *self.0.borrow_mut() = rows
                .iter()
                .map(|(key, location)| ActiveEntry {
                    key: (*key).into(),
                    location: *location,
                    height: 64.0,
                })
                .collect();
        }
    }

    impl EntrySource for Stack {
        fn active_entries(&self) -> Vec<ActiveEntry> {
            self.0.borrow().clone()
        }
    }

    type Delta = (Vec<String>, Vec<String>);

    #[derive(Default)]
    struct Recorder {
        deltas: Vec<Delta>,
        fail: bool,
    }

    impl VisibilitySink for Recorder {
        fn report_visibility_delta(
            &mut self,
            newly: &[NotificationVisibility],
            no_longer: &[NotificationVisibility],
        ) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Disconnected);
            }
            let keys = |list: &[NotificationVisibility]| list.iter().map(|v| v.key.to_string()).collect();
            self.deltas.push((keys(newly), keys(no_longer)));
            Ok(())
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    use StackLocation::*;

    #[test]
    fn test_burst_coalesces_into_one_report() {
        let stack = Stack::default();
        let mut sink = Recorder::default();
        let mut reporter = VisibilityReporter::new(ms(500));
        let t0 = Instant::now();

        stack.set(&[("a", MainArea)]);
        reporter.start(t0);
        assert!(reporter.run_if_due(t0, &stack, Some(&mut sink)));

        // Ten layout changes within 100ms
        for i in 0..10 {
            let now = t0 + ms(100 + i * 10);
            reporter.on_child_locations_changed(now);
            stack.set(&[("a", MainArea), ("b", if i % 2 == 0 { MainArea } else { Gone })]);
            assert!(!reporter.run_if_due(now, &stack, Some(&mut sink)));
        }
        stack.set(&[("a", MainArea), ("b", MainArea)]);
        assert_eq!(reporter.next_deadline(), Some(t0 + ms(500)));

        assert!(reporter.run_if_due(t0 + ms(500), &stack, Some(&mut sink)));
        assert_eq!(sink.deltas.len(), 2);
        assert_eq!(sink.deltas[1], (vec!["b".to_string()], vec![]));
    }

    #[test]
    fn test_reports_respect_min_interval() {
        let stack = Stack::default();
        let mut sink = Recorder::default();
        let mut reporter = VisibilityReporter::new(ms(500));
        let t0 = Instant::now();
        let mut now = t0;
        let mut emitted = Vec::new();

        reporter.start(now);
        for i in 0..40u64 {
            stack.set(&[(if i % 2 == 0 { "a" } else { "b" }, MainArea)]);
            reporter.on_child_locations_changed(now);
            if reporter.run_if_due(now, &stack, Some(&mut sink)) {
                emitted.push(now);
            }
            now += ms(70);
        }
        assert!(emitted.len() > 1);
        for pair in emitted.windows(2) {
            assert!(pair[1] - pair[0] >= ms(500));
        }
    }

    #[test]
    fn test_delta_contains_only_changes() {
        let stack = Stack::default();
        let mut sink = Recorder::default();
        let mut reporter = VisibilityReporter::new(ms(500));
        let t0 = Instant::now();

        stack.set(&[("a", MainArea), ("b", BottomStackHidden)]);
        reporter.start(t0);
        reporter.run_if_due(t0, &stack, Some(&mut sink));
        assert_eq!(sink.deltas[0], (vec!["a".to_string()], vec![]));

        stack.set(&[("a", MainArea), ("b", MainArea)]);
        reporter.on_child_locations_changed(t0 + ms(600));
        reporter.run_if_due(t0 + ms(600), &stack, Some(&mut sink));
        assert_eq!(sink.deltas[1], (vec!["b".to_string()], vec![]));

        let ranks: Vec<_> = reporter.currently_visible().iter().map(|v| v.rank).collect();
        assert_eq!(ranks, vec![0, 1]);
    }

    #[test]
    fn test_unchanged_pass_emits_nothing_and_keeps_timestamp() {
        let stack = Stack::default();
        let mut sink = Recorder::default();
        let mut reporter = VisibilityReporter::new(ms(500));
        let t0 = Instant::now();

        stack.set(&[("a", FirstHeadsUp)]);
        reporter.start(t0);
        reporter.run_if_due(t0, &stack, Some(&mut sink));

        reporter.on_child_locations_changed(t0 + ms(600));
        assert!(!reporter.run_if_due(t0 + ms(600), &stack, Some(&mut sink)));

        // Still throttled against the first report, not the empty pass
        reporter.on_child_locations_changed(t0 + ms(700));
        assert_eq!(reporter.next_deadline(), Some(t0 + ms(700)));
        assert_eq!(sink.deltas.len(), 1);
    }

    #[test]
    fn test_stop_flushes_everything_visible() {
        let stack = Stack::default();
        let mut sink = Recorder::default();
        let mut reporter = VisibilityReporter::new(ms(500));
        let t0 = Instant::now();

        stack.set(&[("a", MainArea), ("b", MainArea), ("c", HiddenTop)]);
        assert!(!reporter.is_logging());
        reporter.start(t0);
        assert!(reporter.is_logging());
        reporter.run_if_due(t0, &stack, Some(&mut sink));
        reporter.on_child_locations_changed(t0 + ms(10));

        reporter.stop(Some(&mut sink));
        assert!(!reporter.is_logging());
        assert_eq!(sink.deltas[1], (vec![], vec!["a".to_string(), "b".to_string()]));
        assert!(reporter.currently_visible().is_empty());
        assert_eq!(reporter.next_deadline(), None);

        // Not logging: layout changes are ignored
        reporter.on_child_locations_changed(t0 + ms(20));
        assert_eq!(reporter.next_deadline(), None);
    }

    #[test]
    fn test_sink_failure_still_advances_state() {
        let stack = Stack::default();
        let mut sink = Recorder { fail: true, ..Default::default() };
        let mut reporter = VisibilityReporter::new(ms(500));
        let t0 = Instant::now();

        stack.set(&[("a", MainArea)]);
        reporter.start(t0);
        assert!(reporter.run_if_due(t0, &stack, Some(&mut sink)));
        assert_eq!(reporter.currently_visible().len(), 1);
    }

    #[test]
    fn test_equality_ignores_rank() {
        let a = NotificationVisibility::new("k".into(), 0, true);
        let b = NotificationVisibility::new("k".into(), 5, true);
        let c = NotificationVisibility::new("k".into(), 0, false);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
