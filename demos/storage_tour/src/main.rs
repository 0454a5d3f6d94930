//! Storage tour — a guided walk through the strata storage core.
//!
//! Registers a few component types, spawns entities, attaches plain
//! components, tags, and relationship pairs, routes one component to sparse
//! storage, and inspects where everything landed. Run with
//! `RUST_LOG=strata_storage=trace` to watch tables being created and
//! entities migrating between them.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use strata_component::{Component, Entity, Id};
use strata_storage::{World, WorldConfig};

#[derive(Debug, Default, Clone, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Velocity {
    x: f32,
    y: f32,
}

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

/// Large-ish payload that benefits from a stable address.
#[derive(Debug, Default, Clone)]
struct Inventory {
    items: Vec<String>,
}

impl Component for Inventory {
    fn type_name() -> &'static str {
        "Inventory"
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("storage_tour=info".parse()?))
        .init();

    let mut world = World::with_config(
        WorldConfig::new()
            .with_entity_capacity(1024)
            .with_sparse_page_rows(128),
    );

    // Plain dense components share archetype tables; Inventory goes sparse
    // so its values never move when entities change tables.
    world.register_component::<Position>()?;
    world.register_component::<Velocity>()?;
    let inventory = world.register_component::<Inventory>()?;
    world.set_sparse(inventory)?;

    // Relations are plain entities. ChildOf is exclusive: one parent each.
    let child_of = world.spawn()?;
    let likes = world.spawn()?;
    world.set_exclusive(child_of)?;

    let parent = world.spawn()?;
    world.set(parent, Position { x: 0.0, y: 0.0 })?;

    let hero = world.spawn()?;
    world.set(hero, Position { x: 3.0, y: 4.0 })?;
    world.set(hero, Velocity { x: 1.0, y: 0.0 })?;
    world.set(
        hero,
        Inventory {
            items: vec!["sword".into(), "lantern".into()],
        },
    )?;
    world.add_pair(hero, child_of, parent)?;

    let sidekick = world.spawn()?;
    world.set(sidekick, Position { x: 2.5, y: 4.5 })?;
    world.add_pair(sidekick, child_of, parent)?;
    world.add_pair(sidekick, likes, hero)?;

    info!(
        entities = world.entity_count(),
        tables = world.table_count(),
        "world populated"
    );

    // Typed access.
    if let Some(position) = world.get::<Position>(hero) {
        info!(x = position.x, y = position.y, "hero position");
    }
    if let Some(velocity) = world.get_mut::<Velocity>(hero) {
        velocity.x += 0.5;
    }

    // The hero's table: every id it holds, pairs included.
    if let Some(table) = world.entity_table(hero) {
        info!(
            table = %table.handle(),
            ids = table.ids().len(),
            columns = table.column_count(),
            rows = table.len(),
            "hero's archetype"
        );
    }

    // Sparse values keep their address across table moves.
    let inventory_id = Id::entity(inventory);
    let before = world.get_raw(hero, inventory_id);
    world.add_pair(hero, likes, sidekick)?;
    let after = world.get_raw(hero, inventory_id);
    info!(
        stable = (before == after),
        "inventory address across a table move"
    );

    // Relationship queries.
    for child in [hero, sidekick] {
        let parents: Vec<Entity> = world.relationship_targets(child, child_of).collect();
        info!(child = %child, parents = parents.len(), "child_of targets");
    }
    info!(
        likes = world.relationship_count(sidekick, likes),
        wildcard = world.relationship_count(sidekick, Entity::WILDCARD),
        "sidekick relationships"
    );

    // Exclusive replacement: re-parenting moves, never duplicates.
    let foster = world.spawn()?;
    world.add_pair(hero, child_of, foster)?;
    let parents: Vec<Entity> = world.relationship_targets(hero, child_of).collect();
    info!(parents = parents.len(), "hero re-parented");

    // Teardown. An entity referenced as a pair target stays pinned while any
    // table layout mentions it, so references come out first and emptied
    // tables get purged along the way.
    if let Err(err) = world.despawn(sidekick) {
        info!(error = %err, "despawn refused while still referenced");
    }
    world.remove_pair(hero, likes, sidekick)?;
    world.purge_empty_tables();
    world.despawn(sidekick)?;
    world.purge_empty_tables();
    world.despawn(hero)?;
    let purged = world.purge_empty_tables();
    info!(
        purged,
        entities = world.entity_count(),
        tables = world.table_count(),
        "after teardown"
    );

    Ok(())
}
