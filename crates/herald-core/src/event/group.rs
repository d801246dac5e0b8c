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

//! Per-owner aggregation of subscriptions and other disposables.

use std::cell::RefCell;

use crate::event::hub::EventHub;
use crate::event::subscription::{Disposable, EventSubscription};
use crate::event::Event;
use crate::owner::OwnerId;

struct TrackedEntry {
    disposable: Box<dyn Disposable>,
    dispose_on_deactivate: bool,
}

/// Tracks subscriptions (and other disposables) for a single owner.
///
/// Entries are split by the `dispose_on_deactivate` flag:
/// [`dispose_on_deactivate`](SubscriptionGroup::dispose_on_deactivate)
/// releases only flagged entries when the owner is temporarily disabled,
/// while unflagged entries persist until
/// [`dispose_all`](SubscriptionGroup::dispose_all) runs on destruction.
///
/// Each entry is removed from the tracked list before its `dispose` call, so
/// no entry is ever disposed twice even if a disposal panics. Dropping the
/// group disposes everything still tracked.
pub struct SubscriptionGroup {
    hub: EventHub,
    owner: Option<OwnerId>,
    tracked: RefCell<Vec<TrackedEntry>>,
}

impl SubscriptionGroup {
    /// Creates a group whose subscriptions default to `owner`.
    #[must_use]
    pub fn new(hub: EventHub, owner: Option<OwnerId>) -> Self {
        Self {
            hub,
            owner,
            tracked: RefCell::new(Vec::new()),
        }
    }

    /// The owner this group's subscriptions default to.
    #[must_use]
    pub fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    /// Subscribes a handler on the bus for `E`, bound to the group's owner,
    /// and tracks the resulting handle.
    #[track_caller]
    pub fn listen<E: Event>(
        &self,
        handler: impl Fn(&E) + 'static,
        dispose_on_deactivate: bool,
    ) -> EventSubscription<E> {
        let subscription = match self.owner {
            Some(owner) => self.hub.bus::<E>().subscribe_with_owner(handler, owner, true),
            None => self.hub.bus::<E>().subscribe(handler),
        };
        self.track(Box::new(subscription.clone()), dispose_on_deactivate);
        subscription
    }

    /// Subscribes a no-argument handler, bound to the group's owner, and
    /// tracks the resulting handle.
    #[track_caller]
    pub fn listen_signal<E: Event>(
        &self,
        handler: impl Fn() + 'static,
        dispose_on_deactivate: bool,
    ) -> EventSubscription<E> {
        let subscription = match self.owner {
            Some(owner) => self
                .hub
                .bus::<E>()
                .subscribe_signal_with_owner(handler, owner, true),
            None => self.hub.bus::<E>().subscribe_signal(handler),
        };
        self.track(Box::new(subscription.clone()), dispose_on_deactivate);
        subscription
    }

    /// Subscribes a handler bound to an explicit owner instead of the
    /// group's default, and tracks the resulting handle.
    #[track_caller]
    pub fn listen_with_owner<E: Event>(
        &self,
        owner: OwnerId,
        handler: impl Fn(&E) + 'static,
        dispose_on_deactivate: bool,
    ) -> EventSubscription<E> {
        let subscription = self.hub.bus::<E>().subscribe_with_owner(handler, owner, true);
        self.track(Box::new(subscription.clone()), dispose_on_deactivate);
        subscription
    }

    /// Adds an arbitrary disposable to the group's lifecycle management.
    pub fn track(&self, disposable: Box<dyn Disposable>, dispose_on_deactivate: bool) {
        self.tracked.borrow_mut().push(TrackedEntry {
            disposable,
            dispose_on_deactivate,
        });
    }

    /// Disposes entries flagged `dispose_on_deactivate`; unflagged entries
    /// survive and only die with the owner.
    pub fn dispose_on_deactivate(&self) {
        self.dispose_tracked(true);
    }

    /// Disposes every tracked entry, regardless of flag.
    pub fn dispose_all(&self) {
        self.dispose_tracked(false);
    }

    /// Number of entries still tracked.
    #[must_use]
    pub fn tracked_len(&self) -> usize {
        self.tracked.borrow().len()
    }

    fn dispose_tracked(&self, flagged_only: bool) {
        let mut index = self.tracked.borrow().len();
        while index > 0 {
            index -= 1;
            let entry = {
                let mut tracked = self.tracked.borrow_mut();
                if index >= tracked.len() {
                    continue;
                }
                if flagged_only && !tracked[index].dispose_on_deactivate {
                    continue;
                }
                tracked.remove(index)
            };
            entry.disposable.dispose();
        }
    }
}

impl Drop for SubscriptionGroup {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
