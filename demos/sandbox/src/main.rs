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

//! A simulated host loop driving the event system end to end: owners spawn,
//! listen through tracker-managed groups, deactivate, and are destroyed,
//! while the tracker poll runs once per tick like a frame update would.

use anyhow::Result;
use herald_core::{
    dispose_all_trackers, DiagnosticsConfig, Event, EventHub, LifecycleTracker,
};

struct DamageTaken {
    target: &'static str,
    amount: u32,
}
impl Event for DamageTaken {}

struct RoundEnded {
    round: u32,
}
impl Event for RoundEnded {}

fn main() -> Result<()> {
    env_logger::init();

    let hub = EventHub::with_config(DiagnosticsConfig { enabled: true });
    let tracker = LifecycleTracker::new(hub.clone());

    let player = hub.spawn_owner();
    let enemy = hub.spawn_owner();

    let player_group = tracker.group_for(player);
    player_group.listen(
        |event: &DamageTaken| log::info!("player sees {} take {} damage", event.target, event.amount),
        true,
    );
    player_group.listen(
        |event: &RoundEnded| log::info!("player scores round {}", event.round),
        false,
    );

    let enemy_group = tracker.group_for(enemy);
    enemy_group.listen(
        |event: &DamageTaken| log::info!("enemy reacts to {} taking damage", event.target),
        true,
    );

    // A subscription made directly on the bus and then forgotten: the hub
    // recovers it by auto-prune and reports the leak below.
    let _forgotten = hub
        .bus::<RoundEnded>()
        .subscribe_signal_with_owner(|| log::info!("enemy hears the round end"), enemy, true);

    for round in 1..=4u32 {
        log::info!("--- tick {round} ---");
        match round {
            2 => {
                log::info!("player deactivates");
                hub.set_owner_active(player, false)?;
            }
            3 => {
                log::info!("enemy is destroyed");
                hub.despawn_owner(enemy)?;
            }
            _ => {}
        }
        tracker.poll();

        hub.raise(DamageTaken {
            target: "enemy",
            amount: 7,
        });
        hub.raise(RoundEnded { round });
    }

    for report in hub.take_leak_reports() {
        log::info!(
            "leak report: {} ({}), subscribed at {}",
            report.event_type,
            report.reason,
            report.origin.as_deref().unwrap_or("<unknown>")
        );
    }

    dispose_all_trackers();
    hub.clear_all(true);
    log::info!("shut down cleanly");
    Ok(())
}
