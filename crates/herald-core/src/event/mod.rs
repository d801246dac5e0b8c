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

//! The event bus and its subscription lifecycle machinery.
//!
//! The pieces, leaf first:
//! - [`BindingId`]/[`RemovalReason`]/[`EventListener`] — the atomic
//!   subscription record and the ways it can be removed.
//! - [`EventSubscription`] — a clonable handle for manual, idempotent
//!   cancellation.
//! - [`EventBus`] — the per-event-type registry with snapshot dispatch and
//!   dead-owner pruning.
//! - [`EventHub`] — the explicit process-wide registry of buses and owners.
//! - [`SubscriptionGroup`] — aggregates tracked disposables for one owner,
//!   splitting "dispose on deactivate" from "dispose only on destruction".
//! - [`LifecycleTracker`] — the per-tick poller that turns owner state
//!   changes into group disposal.

mod binding;
mod bus;
mod group;
mod hub;
mod subscription;
mod tracker;

pub use self::binding::{BindingId, EventListener, RemovalReason};
pub use self::bus::EventBus;
pub use self::group::SubscriptionGroup;
pub use self::hub::EventHub;
pub use self::subscription::{Disposable, EventSubscription};
pub use self::tracker::{dispose_all_trackers, LifecycleTracker};

/// Marker capability for event payload types.
///
/// Events are pure data: the bus hands out shared references during dispatch
/// and never mutates or retains them.
pub trait Event: 'static {}
