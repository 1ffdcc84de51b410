//! Basic demonstration of the horde gameplay core.
//!
//! Run with: RUST_LOG=horde_sim=debug cargo run --example basic_demo

use horde_sim::{GameEvent, GameWorld, ItemKind, PrefabId, Weapon};
use tracing_subscriber::EnvFilter;

const PREFABS: &str = r#"[
    { "id": 1, "prefab": {
        "name": "Shambler", "radius": 0.5, "graphics": 10, "destruction_visual": true,
        "kind": { "type": "Enemy", "hit_points": 6, "speed": 1.5, "contact_damage": 2,
                  "experience": { "experience_value": 3, "chance_to_drop": 100 },
                  "loot": 1 } } },
    { "id": 2, "prefab": {
        "name": "Bomber", "radius": 0.5, "graphics": 11,
        "kind": { "type": "Enemy", "hit_points": 4, "speed": 2.5, "contact_damage": 0,
                  "spawn_on_destroy": 3,
                  "fuse": { "delay": 2.0, "damage": 5, "radius": 2.5, "lifetime": 0.2 } } } },
    { "id": 3, "prefab": {
        "name": "Blast", "radius": 0.1,
        "kind": { "type": "Hazard", "damage": 0 } } },
    { "id": 4, "prefab": {
        "name": "Coin", "radius": 0.3,
        "kind": { "type": "Item", "item": { "Coin": { "value": 1 } } } } },
    { "id": 5, "prefab": {
        "name": "Whip", "radius": 1.5,
        "kind": { "type": "Attack", "damage": 3, "hits": 3,
                  "knockback": { "strength": 6.0, "duration": 0.2 } } } }
]"#;

const LOOT: &str = r#"[
    { "id": 1, "table": { "entries": [ { "prefab": 4, "weight": 1 } ] } }
]"#;

const UPGRADES: &str = r#"[
    { "id": 1, "name": "Boots", "levels": [
        [ { "kind": "MoveSpeed", "value": 1.1 } ],
        [ { "kind": "MoveSpeed", "value": 1.25 } ] ] },
    { "id": 2, "name": "Plate", "levels": [
        [ { "kind": "Armor", "value": 1.0 } ] ] },
    { "id": 3, "name": "Spinach", "levels": [
        [ { "kind": "DamageDealt", "value": 1.2 } ],
        [ { "kind": "DamageDealt", "value": 1.5 }, { "kind": "AttackArea", "value": 1.2 } ] ] },
    { "id": 4, "name": "Duplicator", "levels": [
        [ { "kind": "ProjectileCount", "value": 1.0 } ] ] },
    { "id": 5, "name": "Tome", "levels": [
        [ { "kind": "CooldownMultiplier", "value": 0.8 } ] ] },
    { "id": 6, "name": "Heart", "levels": [
        [ { "kind": "Regeneration", "value": 0.5 } ] ] }
]"#;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Horde Sim - Gameplay Core Demo ===\n");

    let mut game = GameWorld::new();
    if let Err(err) = load_content(&mut game) {
        eprintln!("failed to load content: {err}");
        return;
    }

    game.spawn_player(0.0, 0.0, 20);
    // Whip: a short-lived ring around the player, once per second.
    game.equip_weapon(Weapon::new(PrefabId(5), 1.0, 0.0, 0.3));
    for i in 0..8 {
        let angle = (i as f32 / 8.0) * std::f32::consts::TAU;
        let prefab = if i % 4 == 0 { PrefabId(2) } else { PrefabId(1) };
        if let Err(err) = game.spawn_enemy(prefab, 8.0 * angle.cos(), 8.0 * angle.sin()) {
            eprintln!("failed to spawn enemy: {err}");
        }
    }
    game.spawn_item(ItemKind::Crate, 2.0, 0.0);

    println!("Initial state:");
    print_snapshot(&mut game);

    // Run for 10 seconds.
    for frame in 0..600 {
        game.set_player_direction(1.0, 0.0);
        game.step(1.0 / 60.0);

        for event in game.drain_events() {
            println!("  [tick {}] {:?}", game.current_tick(), event);
            if matches!(event, GameEvent::UpgradeOffered { .. }) {
                match game.choose_upgrade(0) {
                    Ok(Some(reward)) => println!("    chose {reward:?}"),
                    Ok(None) => {}
                    Err(err) => eprintln!("    upgrade failed: {err}"),
                }
            }
        }
        game.drain_audio();

        if (frame + 1) % 120 == 0 {
            println!("--- Tick {} (t={:.1}s) ---", game.current_tick(), game.current_time());
            print_snapshot(&mut game);
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    match game.snapshot().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("failed to serialize snapshot: {err}"),
    }
}

fn load_content(game: &mut GameWorld) -> Result<(), horde_sim::ConfigError> {
    game.load_prefabs_json(PREFABS)?;
    game.load_loot_json(LOOT)?;
    game.load_upgrades_json(UPGRADES)?;
    Ok(())
}

fn print_snapshot(game: &mut GameWorld) {
    let snapshot = game.snapshot();
    println!(
        "  hp={}/{} level={} xp={}/{} coins={} defeated={} entities={}{}",
        snapshot.hit_points,
        snapshot.max_hit_points,
        snapshot.level,
        snapshot.experience_into_level,
        snapshot.experience_required,
        snapshot.coins,
        snapshot.enemies_defeated,
        snapshot.entities.len(),
        if snapshot.game_over { " GAME OVER" } else { "" },
    );
}
