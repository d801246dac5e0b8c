// Copyright 2025 herald contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Leak diagnostics for subscriptions that were never explicitly disposed.
//!
//! A leak is never an error: auto-pruning already recovers the binding, so a
//! leak cannot crash dispatch. It is reported exactly once per binding via
//! [`log::warn!`], including the subscription's captured creation site, and
//! retained as a [`LeakReport`] so tests and host tooling can inspect it.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;

use crate::event::{BindingId, RemovalReason};

/// Configuration for leak diagnostics, threaded through hub construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Whether leak detection and creation-site capture are enabled.
    ///
    /// Defaults to `true` in debug builds and `false` in release builds,
    /// so release hosts skip the capture cost entirely.
    pub enabled: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: cfg!(debug_assertions),
        }
    }
}

/// A record of one leaked subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeakReport {
    /// Type name of the event the leaked binding listened for.
    pub event_type: &'static str,
    /// Identity of the leaked binding within its bus.
    pub binding: BindingId,
    /// How the binding was removed.
    pub reason: RemovalReason,
    /// The subscription's creation site, when captured.
    pub origin: Option<String>,
}

/// Shared recorder for leak reports. One per hub.
pub(crate) struct Diagnostics {
    config: DiagnosticsConfig,
    reports: RefCell<Vec<LeakReport>>,
}

impl Diagnostics {
    pub(crate) fn new(config: DiagnosticsConfig) -> Self {
        Self {
            config,
            reports: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn enabled(&self) -> bool {
        self.config.enabled
    }

    pub(crate) fn record(&self, report: LeakReport) {
        match &report.origin {
            Some(origin) => log::warn!(
                "leaked subscription to {} ({} via {}); subscribed at {}",
                report.event_type,
                report.binding,
                report.reason,
                origin
            ),
            None => log::warn!(
                "leaked subscription to {} ({} via {})",
                report.event_type,
                report.binding,
                report.reason
            ),
        }
        self.reports.borrow_mut().push(report);
    }

    pub(crate) fn take_reports(&self) -> Vec<LeakReport> {
        std::mem::take(&mut self.reports.borrow_mut())
    }
}
