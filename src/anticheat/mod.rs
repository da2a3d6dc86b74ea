//! Authority Cooldown Gate
//!
//! Applied only when the authority simulates a remote client's actor:
//! - Ability activations must respect the authority cooldown since the
//!   activity's last recorded start (teleport, jetpack) or end (rewind)
//! - Violations are logged, kept in a bounded window, and the activation is
//!   dropped for that tick; nothing else happens to the requester
//!
//! Locally-controlled actors always pass: client prediction is optimistic.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GatedActivity {
    Teleport,
    Rewind,
    Jetpack,
}

impl GatedActivity {
    fn index(self) -> usize {
        match self {
            GatedActivity::Teleport => 0,
            GatedActivity::Rewind => 1,
            GatedActivity::Jetpack => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationSeverity {
    /// Within half a cooldown of legal: plausibly jitter
    Low,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateViolation {
    pub activity: GatedActivity,
    pub severity: ViolationSeverity,
    pub timestamp: f32,
    /// Seconds since the last recorded activity
    pub value: f32,
    /// Required authority cooldown
    pub threshold: f32,
    pub details: String,
}

const DEFAULT_VIOLATION_WINDOW: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityGate {
    last: [Option<f32>; 3],
    violations: VecDeque<GateViolation>,
    window_size: usize,
    pub rejected_total: u32,
}

impl Default for AuthorityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthorityGate {
    pub fn new() -> Self {
        Self {
            last: [None; 3],
            violations: VecDeque::new(),
            window_size: DEFAULT_VIOLATION_WINDOW,
            rejected_total: 0,
        }
    }

    pub fn last(&self, activity: GatedActivity) -> Option<f32> {
        self.last[activity.index()]
    }

    pub fn record(&mut self, activity: GatedActivity, now: f32) {
        self.last[activity.index()] = Some(now);
    }

    /// Pure check; no logging, no bookkeeping
    pub fn would_allow(
        &self,
        activity: GatedActivity,
        now: f32,
        auth_cooldown: f32,
        is_authority_proxy: bool,
    ) -> bool {
        if !is_authority_proxy {
            return true;
        }
        match self.last(activity) {
            None => true,
            Some(last) => now - last > auth_cooldown,
        }
    }

    /// Gate an activation. A rejection is logged and remembered.
    pub fn check(
        &mut self,
        activity: GatedActivity,
        now: f32,
        auth_cooldown: f32,
        is_authority_proxy: bool,
    ) -> bool {
        if self.would_allow(activity, now, auth_cooldown, is_authority_proxy) {
            return true;
        }

        let elapsed = self.last(activity).map_or(f32::INFINITY, |last| now - last);
        let severity = if elapsed > auth_cooldown * 0.5 {
            ViolationSeverity::Low
        } else {
            ViolationSeverity::High
        };
        warn!(
            ?activity,
            ?severity,
            elapsed,
            required = auth_cooldown,
            "activation rejected by authority cooldown"
        );

        self.rejected_total += 1;
        if self.violations.len() >= self.window_size {
            self.violations.pop_front();
        }
        self.violations.push_back(GateViolation {
            activity,
            severity,
            timestamp: now,
            value: elapsed,
            threshold: auth_cooldown,
            details: format!(
                "{:?} after {:.3}s (authority cooldown {:.3}s)",
                activity, elapsed, auth_cooldown
            ),
        });
        false
    }

    pub fn violations(&self) -> impl Iterator<Item = &GateViolation> {
        self.violations.iter()
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn drain_violations(&mut self) -> Vec<GateViolation> {
        self.violations.drain(..).collect()
    }
}
