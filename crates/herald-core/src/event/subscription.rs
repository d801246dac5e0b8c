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

//! Disposable handles returned to subscribers.

use std::rc::Weak;

use crate::event::binding::Binding;
use crate::event::bus::BusCore;
use crate::event::Event;

/// A resource that can be torn down exactly once.
///
/// Repeated `dispose` calls must be no-ops.
/// [`SubscriptionGroup`](crate::SubscriptionGroup) tracks arbitrary
/// disposables through this trait, so non-event resources can share an
/// owner's lifecycle.
pub trait Disposable {
    /// Releases the resource. Idempotent.
    fn dispose(&self);
}

/// A handle to one binding on one bus, used for manual cancellation.
///
/// The handle holds only weak references: it does not keep the binding (or
/// the bus) alive, and dropping it does not unsubscribe. Disposal is explicit
/// via [`dispose`](EventSubscription::dispose), or owner-driven through the
/// group/tracker machinery. The first `dispose` removes the binding from its
/// bus; every later call, including calls through clones, is a no-op.
pub struct EventSubscription<E: Event> {
    bus: Weak<BusCore<E>>,
    binding: Weak<Binding<E>>,
}

impl<E: Event> EventSubscription<E> {
    pub(crate) fn new(bus: Weak<BusCore<E>>, binding: Weak<Binding<E>>) -> Self {
        Self { bus, binding }
    }

    /// Removes the binding from its bus. Idempotent.
    pub fn dispose(&self) {
        self.dispose_inner();
    }

    /// Returns `true` once the binding has been removed, for any reason.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.binding
            .upgrade()
            .map_or(true, |binding| binding.is_disposed())
    }

    fn dispose_inner(&self) {
        let (Some(bus), Some(binding)) = (self.bus.upgrade(), self.binding.upgrade()) else {
            return;
        };
        bus.remove_entry(&binding);
    }
}

impl<E: Event> Clone for EventSubscription<E> {
    fn clone(&self) -> Self {
        Self {
            bus: Weak::clone(&self.bus),
            binding: Weak::clone(&self.binding),
        }
    }
}

impl<E: Event> Disposable for EventSubscription<E> {
    fn dispose(&self) {
        self.dispose_inner();
    }
}
