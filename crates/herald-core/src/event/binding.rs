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

//! The atomic subscription record held by each bus.

use serde::{Deserialize, Serialize};
use std::any::type_name;
use std::cell::Cell;
use std::fmt;
use std::panic::Location;
use std::rc::Rc;

use crate::diagnostics::{Diagnostics, LeakReport};
use crate::event::Event;
use crate::owner::{OwnerDirectory, OwnerId};

/// Opaque identity of a binding, unique within its bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BindingId(pub(crate) u64);

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding #{}", self.0)
    }
}

/// How a binding was removed from its bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalReason {
    /// The caller disposed it explicitly. Never a leak.
    Manual,
    /// A bus-wide clear removed it (test isolation or host shutdown).
    Cleared,
    /// Auto-pruned because its owner vanished without an explicit
    /// unsubscribe. This is the leak signal.
    OwnerDestroyed,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalReason::Manual => write!(f, "manual dispose"),
            RemovalReason::Cleared => write!(f, "bus clear"),
            RemovalReason::OwnerDestroyed => write!(f, "owner destroyed"),
        }
    }
}

/// A receiver of events of type `E`.
///
/// Both callbacks default to no-ops; implementors override either or both.
/// When both are overridden, [`EventBus::raise`](crate::EventBus::raise)
/// invokes `on_event` first and `on_signal` second for every delivery.
///
/// Closures passed to the `subscribe` family are wrapped into a listener
/// internally; implementing this trait directly is only needed for the
/// [`register`](crate::EventBus::register) path, where listener instances are
/// de-duplicated by identity.
pub trait EventListener<E: Event> {
    /// Called with the event payload.
    fn on_event(&self, event: &E) {
        let _ = event;
    }

    /// Called without the payload, for listeners that only care that the
    /// event fired.
    fn on_signal(&self) {}
}

/// Adapter wrapping plain closures into an [`EventListener`].
pub(crate) struct ClosureListener<E: Event> {
    on_event: Option<Box<dyn Fn(&E)>>,
    on_signal: Option<Box<dyn Fn()>>,
}

impl<E: Event> ClosureListener<E> {
    pub(crate) fn with_event(handler: impl Fn(&E) + 'static) -> Self {
        Self {
            on_event: Some(Box::new(handler)),
            on_signal: None,
        }
    }

    pub(crate) fn with_signal(handler: impl Fn() + 'static) -> Self {
        Self {
            on_event: None,
            on_signal: Some(Box::new(handler)),
        }
    }
}

impl<E: Event> EventListener<E> for ClosureListener<E> {
    fn on_event(&self, event: &E) {
        if let Some(handler) = &self.on_event {
            handler(event);
        }
    }

    fn on_signal(&self) {
        if let Some(handler) = &self.on_signal {
            handler();
        }
    }
}

/// One subscription record: listener, optional owner, lifecycle metadata.
///
/// The bus registry holds the authoritative `Rc` to each binding; groups and
/// subscription handles hold only weak references used to request disposal.
pub(crate) struct Binding<E: Event> {
    id: BindingId,
    listener: Rc<dyn EventListener<E>>,
    owner: Option<OwnerId>,
    auto_prune: bool,
    origin: Option<&'static Location<'static>>,
    disposed: Cell<bool>,
}

impl<E: Event> Binding<E> {
    pub(crate) fn new(
        id: BindingId,
        listener: Rc<dyn EventListener<E>>,
        owner: Option<OwnerId>,
        auto_prune: bool,
        origin: Option<&'static Location<'static>>,
    ) -> Self {
        Self {
            id,
            listener,
            owner,
            auto_prune,
            origin,
            disposed: Cell::new(false),
        }
    }

    pub(crate) fn owner(&self) -> Option<OwnerId> {
        self.owner
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    pub(crate) fn listener_is(&self, other: &Rc<dyn EventListener<E>>) -> bool {
        Rc::ptr_eq(&self.listener, other)
    }

    pub(crate) fn invoke(&self, event: &E) {
        self.listener.on_event(event);
        self.listener.on_signal();
    }

    /// True iff auto-prune is enabled, an owner was supplied, and that owner
    /// is no longer alive.
    pub(crate) fn should_auto_prune(&self, owners: &OwnerDirectory) -> bool {
        self.auto_prune && self.owner.map_or(false, |owner| !owners.is_alive(owner))
    }

    /// Transitions the disposed flag exactly once; repeated calls are no-ops.
    ///
    /// On the first transition, a leak report is emitted when diagnostics are
    /// enabled and the removal was not an explicit dispose: always for
    /// `OwnerDestroyed`, and for `Cleared` only when the clear was unexpected
    /// and the binding's owner could still have disposed it.
    pub(crate) fn mark_disposed(
        &self,
        reason: RemovalReason,
        owner_alive: bool,
        suppress_warnings: bool,
        diagnostics: &Diagnostics,
    ) {
        if self.disposed.replace(true) {
            return;
        }

        let leaked = match reason {
            RemovalReason::Manual => false,
            RemovalReason::OwnerDestroyed => true,
            RemovalReason::Cleared => !suppress_warnings && self.owner.is_some() && owner_alive,
        };

        if leaked && diagnostics.enabled() {
            diagnostics.record(LeakReport {
                event_type: type_name::<E>(),
                binding: self.id,
                reason,
                origin: self.origin.map(|location| location.to_string()),
            });
        }
    }
}
