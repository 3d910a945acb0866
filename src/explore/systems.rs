//! Movement, projectiles, damage and the victory/defeat stage.

use bevy_ecs::{
    entity::Entity,
    event::EventWriter,
    query::{Has, With, Without},
    system::{Commands, Query, Res, ResMut},
};
use glam::Vec2;
use tracing::{debug, info};

use crate::config::AiTuning;
use crate::explore::components::{
    Agent, AiState, DeltaTime, DefeatTally, ExploreEvent, ExploreStage, Invulnerable, Owner, Player, PlayerHealth,
    PlayerInput, Position, Projectile, ProjectileBundle, Velocity, WorldBounds,
};

/// Applies the host's movement request and spawns a player shot if one was requested.
pub fn player_movement_system(
    mut commands: Commands,
    tuning: Res<AiTuning>,
    mut input: ResMut<PlayerInput>,
    mut events: EventWriter<ExploreEvent>,
    mut player: Query<(&Position, &mut Velocity), With<Player>>,
) {
    let Ok((position, mut velocity)) = player.single_mut() else {
        return;
    };

    velocity.0 = input.direction.normalize_or_zero() * tuning.player_speed;

    if let Some(direction) = input.fire.take() {
        let direction = direction.normalize_or_zero();
        if direction == Vec2::ZERO {
            return;
        }
        commands.spawn(ProjectileBundle {
            projectile: Projectile {
                owner: Owner::Player,
                age: 0.0,
                max_age: tuning.projectile_max_age,
            },
            position: *position,
            velocity: Velocity(direction * tuning.projectile_speed),
        });
        events.write(ExploreEvent::Fired {
            owner: Owner::Player,
            at: position.0,
        });
    }
}

/// Linear motion: `position += velocity * dt`.
pub fn integrate_system(delta_time: Res<DeltaTime>, mut query: Query<(&mut Position, &Velocity)>) {
    for (mut position, velocity) in query.iter_mut() {
        position.0 += velocity.0 * delta_time.seconds;
    }
}

/// Keeps the player and agents inside the world. Projectiles are left alone and expire instead.
pub fn bounds_system(bounds: Res<WorldBounds>, mut query: Query<&mut Position, Without<Projectile>>) {
    for mut position in query.iter_mut() {
        let clamped = bounds.clamp(position.0);
        if clamped != position.0 {
            position.0 = clamped;
        }
    }
}

/// Removes one life and opens an invulnerability window.
fn damage_player(
    commands: &mut Commands,
    player: Entity,
    health: &mut PlayerHealth,
    tuning: &AiTuning,
    events: &mut EventWriter<ExploreEvent>,
) {
    health.lives = health.lives.saturating_sub(1);
    commands.entity(player).insert(Invulnerable::new(tuning.invulnerability));
    debug!(lives = health.lives, "Player damaged");
    events.write(ExploreEvent::PlayerDamaged { lives: health.lives });
}

/// Moves an agent into `Dead`. Returns `false` if it was already dead.
fn kill_agent(agent: &mut Agent, velocity: &mut Velocity, tally: &mut DefeatTally) -> bool {
    if agent.is_dead() {
        return false;
    }
    agent.state = AiState::Dead;
    agent.telegraph = None;
    velocity.0 = Vec2::ZERO;
    tally.defeated += 1;
    true
}

/// Ages projectiles and resolves their hits.
///
/// A projectile is removed when it outlives its maximum age, leaves the world, or hits a
/// valid target. Player shots only affect agents and agent shots only affect the player.
#[allow(clippy::too_many_arguments)]
#[allow(clippy::type_complexity)]
pub fn projectile_system(
    mut commands: Commands,
    tuning: Res<AiTuning>,
    bounds: Res<WorldBounds>,
    delta_time: Res<DeltaTime>,
    mut health: ResMut<PlayerHealth>,
    mut tally: ResMut<DefeatTally>,
    mut events: EventWriter<ExploreEvent>,
    mut projectiles: Query<(Entity, &mut Projectile, &Position)>,
    player: Query<(Entity, &Position, Has<Invulnerable>), With<Player>>,
    mut agents: Query<(Entity, &mut Agent, &Position, &mut Velocity), (Without<Player>, Without<Projectile>)>,
) {
    let player = player.single().ok();
    let mut player_hit = false;

    for (projectile_entity, mut projectile, position) in projectiles.iter_mut() {
        projectile.age += delta_time.seconds;
        if projectile.age > projectile.max_age || !bounds.contains(position.0) {
            commands.entity(projectile_entity).despawn();
            continue;
        }

        match projectile.owner {
            Owner::Player => {
                let target = agents
                    .iter_mut()
                    .find(|(_, agent, agent_position, _)| {
                        !agent.is_dead() && agent_position.0.distance(position.0) <= tuning.hit_radius
                    });
                let Some((agent_entity, mut agent, agent_position, mut velocity)) = target else {
                    continue;
                };

                commands.entity(projectile_entity).despawn();
                agent.hp = agent.hp.saturating_sub(1);
                events.write(ExploreEvent::AgentHit {
                    agent: agent_entity,
                    hp: agent.hp,
                });
                if agent.hp == 0 && kill_agent(&mut agent, &mut velocity, &mut tally) {
                    debug!(agent = ?agent_entity, defeated = tally.defeated, total = tally.total, "Agent defeated");
                    events.write(ExploreEvent::AgentDefeated {
                        agent: agent_entity,
                        at: agent_position.0,
                    });
                }
            }
            Owner::Agent => {
                let Some((player_entity, player_position, invulnerable)) = player else {
                    continue;
                };
                if player_position.0.distance(position.0) > tuning.hit_radius {
                    continue;
                }

                commands.entity(projectile_entity).despawn();
                if !invulnerable && !player_hit {
                    player_hit = true;
                    damage_player(&mut commands, player_entity, &mut health, &tuning, &mut events);
                }
            }
        }
    }
}

/// Damages the player when any living agent touches them outside an invulnerability window.
pub fn contact_damage_system(
    mut commands: Commands,
    tuning: Res<AiTuning>,
    mut health: ResMut<PlayerHealth>,
    mut events: EventWriter<ExploreEvent>,
    player: Query<(Entity, &Position), (With<Player>, Without<Invulnerable>)>,
    agents: Query<(&Agent, &Position), Without<Player>>,
) {
    let Ok((player_entity, player_position)) = player.single() else {
        return;
    };

    let touching = agents
        .iter()
        .any(|(agent, position)| !agent.is_dead() && position.0.distance(player_position.0) <= tuning.contact_radius);
    if touching {
        damage_player(&mut commands, player_entity, &mut health, &tuning, &mut events);
    }
}

/// Counts down invulnerability windows, toggling visibility at a fixed interval.
pub fn invulnerability_system(
    mut commands: Commands,
    tuning: Res<AiTuning>,
    delta_time: Res<DeltaTime>,
    mut events: EventWriter<ExploreEvent>,
    mut query: Query<(Entity, &mut Invulnerable)>,
) {
    for (entity, mut invulnerable) in query.iter_mut() {
        invulnerable.remaining -= delta_time.seconds;
        if invulnerable.remaining <= 0.0 {
            commands.entity(entity).remove::<Invulnerable>();
            if !invulnerable.visible {
                events.write(ExploreEvent::Flicker { visible: true });
            }
            continue;
        }

        // Keep the partial interval so the flicker rate does not drift with the frame rate.
        invulnerable.flicker_timer += delta_time.seconds;
        while invulnerable.flicker_timer >= tuning.flicker_interval {
            invulnerable.flicker_timer -= tuning.flicker_interval;
            invulnerable.visible = !invulnerable.visible;
            events.write(ExploreEvent::Flicker {
                visible: invulnerable.visible,
            });
        }
    }
}

/// Ends the scene once the player is out of lives or every agent is down.
pub fn stage_system(
    mut stage: ResMut<ExploreStage>,
    health: Res<PlayerHealth>,
    tally: Res<DefeatTally>,
    mut events: EventWriter<ExploreEvent>,
) {
    if *stage != ExploreStage::Playing {
        return;
    }

    // Running out of lives wins over a simultaneous last kill.
    let next = if health.lives == 0 {
        ExploreStage::Defeated
    } else if tally.all_defeated() {
        ExploreStage::Victory
    } else {
        return;
    };

    info!(stage = %next, defeated = tally.defeated, total = tally.total, lives = health.lives, "Exploration stage changed");
    *stage = next;
    events.write(ExploreEvent::StageChanged(next));
}
