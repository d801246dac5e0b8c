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

use herald_core::{
    DiagnosticsConfig, Event, EventHub, LifecycleTracker, RemovalReason,
};
use std::cell::Cell;
use std::rc::Rc;

// --- DUMMY EVENTS FOR THIS TEST ---
struct DamageTaken {
    amount: u32,
}
impl Event for DamageTaken {}

struct RoundEnded;
impl Event for RoundEnded {}

fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
    let count = Rc::new(Cell::new(0u32));
    (Rc::clone(&count), count)
}

#[test]
fn full_owner_lifecycle_from_spawn_to_teardown() {
    // --- 1. ARRANGE ---
    // One hub, one tracker, two owners with their own subscription groups.
    let hub = EventHub::with_config(DiagnosticsConfig { enabled: true });
    let tracker = LifecycleTracker::new(hub.clone());

    let player = hub.spawn_owner();
    let enemy = hub.spawn_owner();

    let player_group = tracker.group_for(player);
    let enemy_group = tracker.group_for(enemy);

    let (player_damage, player_damage_seen) = counter();
    player_group.listen(
        move |event: &DamageTaken| player_damage.set(player_damage.get() + event.amount),
        true,
    );

    let (player_rounds, player_rounds_seen) = counter();
    // Survives temporary deactivation; only dies with the owner.
    player_group.listen_signal::<RoundEnded>(
        move || player_rounds.set(player_rounds.get() + 1),
        false,
    );

    let (enemy_damage, enemy_damage_seen) = counter();
    enemy_group.listen(
        move |event: &DamageTaken| enemy_damage.set(enemy_damage.get() + event.amount),
        true,
    );

    // --- 2. ACT / ASSERT, tick by tick ---
    // Tick 1: everyone active, everyone hears the events.
    hub.raise(DamageTaken { amount: 5 });
    hub.raise(RoundEnded);
    tracker.poll();
    assert_eq!(player_damage_seen.get(), 5);
    assert_eq!(enemy_damage_seen.get(), 5);
    assert_eq!(player_rounds_seen.get(), 1);

    // Tick 2: the player is disabled; the flip is observed by this poll and
    // tears down only the dispose-on-deactivate entry.
    hub.set_owner_active(player, false).unwrap();
    tracker.poll();
    hub.raise(DamageTaken { amount: 3 });
    hub.raise(RoundEnded);
    assert_eq!(player_damage_seen.get(), 5);
    assert_eq!(player_rounds_seen.get(), 2);
    assert_eq!(enemy_damage_seen.get(), 8);

    // Tick 3: the enemy is destroyed without unsubscribing. The next raise
    // auto-prunes its binding and records the leak.
    hub.despawn_owner(enemy).unwrap();
    tracker.poll();
    hub.raise(DamageTaken { amount: 2 });
    assert_eq!(enemy_damage_seen.get(), 8);
    assert_eq!(tracker.tracked_owner_count(), 1);

    // The enemy group was disposed by the tracker before the raise touched
    // the bus, so its binding was removed manually and no leak is reported
    // for it; what remains tracked is the player's persistent entry.
    assert!(hub.take_leak_reports().is_empty());

    // --- 3. TEARDOWN ---
    // Global teardown releases the player's persistent subscription too.
    herald_core::dispose_all_trackers();
    hub.raise(RoundEnded);
    assert_eq!(player_rounds_seen.get(), 2);

    hub.clear_all(true);
    assert!(hub.bus::<DamageTaken>().is_empty());
    assert!(hub.bus::<RoundEnded>().is_empty());
    assert!(hub.take_leak_reports().is_empty());
}

#[test]
fn forgotten_subscription_is_pruned_and_reported_once() {
    // --- 1. ARRANGE ---
    // Subscribe directly on the bus, bypassing any group, then lose the
    // handle: the classic leak.
    let hub = EventHub::with_config(DiagnosticsConfig { enabled: true });
    let owner = hub.spawn_owner();

    let (hits, hits_seen) = counter();
    let _forgotten = hub
        .bus::<DamageTaken>()
        .subscribe_with_owner(move |_| hits.set(hits.get() + 1), owner, true);

    // --- 2. ACT ---
    hub.raise(DamageTaken { amount: 1 });
    hub.despawn_owner(owner).unwrap();
    hub.raise(DamageTaken { amount: 1 });
    hub.raise(DamageTaken { amount: 1 });

    // --- 3. ASSERT ---
    assert_eq!(hits_seen.get(), 1);

    let reports = hub.take_leak_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].reason, RemovalReason::OwnerDestroyed);
    let origin = reports[0].origin.as_deref().expect("origin captured");
    assert!(origin.contains("lifecycle_test.rs"));
}
