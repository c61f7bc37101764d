// src/watch/router.rs

use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, trace};

use crate::config::model::ConfigFile;
use crate::engine::RunRequest;
use crate::watch::patterns::RuleSet;

/// Turns changed paths into coalesced [`RunRequest`]s.
///
/// The first matching change opens a window of `window` length. Every
/// matching change until the window closes adds its tasks to the same
/// pending request, so an editor's write-then-rename burst (or a
/// `git checkout`) produces one rebuild. The router is a plain state machine:
/// callers pass in `now` and ask for [`next_deadline`](Self::next_deadline).
#[derive(Debug)]
pub struct WatchRouter {
    rules: RuleSet,
    window: Duration,
    pending: RunRequest,
    deadline: Option<Instant>,
}

impl WatchRouter {
    pub fn new(rules: RuleSet, window: Duration) -> Self {
        Self {
            rules,
            window,
            pending: RunRequest::default(),
            deadline: None,
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Ok(Self::new(RuleSet::from_config(cfg)?, cfg.coalesce_window))
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The request a single change of `rel_path` would produce, if any.
    pub fn match_path(&self, rel_path: &str) -> Option<RunRequest> {
        let tasks = self.rules.tasks_for(rel_path);
        if tasks.is_empty() {
            None
        } else {
            Some(RunRequest::new(tasks))
        }
    }

    /// Record a change. Returns `false` when no rule matched (nothing is
    /// queued and the window is left as it was).
    pub fn on_path_changed(&mut self, rel_path: &str, now: Instant) -> bool {
        let Some(request) = self.match_path(rel_path) else {
            trace!(path = rel_path, "change matched no watch rule");
            return false;
        };

        debug!(path = rel_path, tasks = ?request.tasks(), "change matched watch rules");
        self.pending.extend(request.tasks().iter().cloned());
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
        true
    }

    /// When the open window closes, if one is open.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Release the pending request once its window has closed.
    pub fn poll(&mut self, now: Instant) -> Option<RunRequest> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.flush(),
            _ => None,
        }
    }

    /// Release the pending request regardless of the window.
    pub fn flush(&mut self) -> Option<RunRequest> {
        self.deadline = None;
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::patterns::WatchRule;

    fn router(window_ms: u64) -> WatchRouter {
        let rules = RuleSet::new(
            vec![
                WatchRule::new("styles/**", ["css"]).unwrap(),
                WatchRule::new("sources.json", ["desktop-js", "mobile-js"]).unwrap(),
                WatchRule::new("source/js/**", ["desktop-js"]).unwrap(),
            ],
            vec!["_package".into(), "_package/**".into()],
        )
        .unwrap();
        WatchRouter::new(rules, Duration::from_millis(window_ms))
    }

    #[test]
    fn unmatched_path_opens_no_window() {
        let mut r = router(100);
        let now = Instant::now();
        assert!(!r.on_path_changed("scripts/app.js", now));
        assert!(r.next_deadline().is_none());
        assert!(r.poll(now + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn request_waits_for_the_window() {
        let mut r = router(100);
        let t0 = Instant::now();
        assert!(r.on_path_changed("styles/index.scss", t0));
        assert!(r.poll(t0 + Duration::from_millis(50)).is_none());

        let req = r.poll(t0 + Duration::from_millis(100)).unwrap();
        assert_eq!(req.tasks(), ["css"]);
        assert!(r.next_deadline().is_none());
    }

    #[test]
    fn window_is_measured_from_the_first_event() {
        let mut r = router(100);
        let t0 = Instant::now();
        r.on_path_changed("styles/a.scss", t0);
        r.on_path_changed("styles/b.scss", t0 + Duration::from_millis(90));
        assert_eq!(r.next_deadline(), Some(t0 + Duration::from_millis(100)));
    }

    #[test]
    fn overlapping_rules_merge() {
        let mut r = router(100);
        let t0 = Instant::now();
        r.on_path_changed("source/js/app.js", t0);
        r.on_path_changed("sources.json", t0);
        let req = r.flush().unwrap();
        assert_eq!(req.tasks(), ["desktop-js", "mobile-js"]);
    }

    #[test]
    fn output_dir_is_ignored() {
        let r = router(100);
        assert!(r.match_path("_package/frontend/css/index.css").is_none());
    }
}
