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

//! # Herald Core
//!
//! A typed event bus with ownership-scoped subscription lifecycles.
//!
//! Publishers and observers communicate through per-event-type registries
//! held by an [`EventHub`], without holding references to each other. Each
//! subscription may be bound to an owner registered in the hub's
//! [`OwnerDirectory`]; when that owner is deactivated or despawned, its
//! subscriptions are torn down automatically instead of leaking, and each
//! forgotten subscription is reported once as a [`LeakReport`].
//!
//! Dispatch is synchronous, single-threaded and allocation-light: `raise`
//! snapshots the live binding list before invoking it, so handlers may
//! freely subscribe and unsubscribe mid-dispatch without affecting the
//! in-flight pass.
//!
//! # Example
//!
//! ```rust
//! use herald_core::{Event, EventHub};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! struct Ping;
//! impl Event for Ping {}
//!
//! let hub = EventHub::new();
//! let bus = hub.bus::<Ping>();
//!
//! let seen = Rc::new(Cell::new(0u32));
//! let observed = Rc::clone(&seen);
//! let subscription = bus.subscribe(move |_: &Ping| observed.set(observed.get() + 1));
//!
//! hub.raise(Ping);
//! assert_eq!(seen.get(), 1);
//!
//! subscription.dispose();
//! hub.raise(Ping);
//! assert_eq!(seen.get(), 1);
//! ```

#![warn(missing_docs)]

pub mod diagnostics;
pub mod event;
pub mod owner;

pub use diagnostics::{DiagnosticsConfig, LeakReport};
pub use event::{
    dispose_all_trackers, BindingId, Disposable, Event, EventBus, EventHub, EventListener,
    EventSubscription, LifecycleTracker, RemovalReason, SubscriptionGroup,
};
pub use owner::{OwnerDirectory, OwnerError, OwnerId};
