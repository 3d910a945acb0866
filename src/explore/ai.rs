//! Per-agent state machine: patrol, chase, attack, dead.

use std::f32::consts::TAU;

use bevy_ecs::{
    entity::Entity,
    event::EventWriter,
    query::{With, Without},
    system::{Commands, Query, Res, ResMut},
};
use glam::Vec2;
use rand::Rng;
use tracing::trace;

use crate::config::AiTuning;
use crate::explore::components::{
    Agent, AiState, DeltaTime, ExploreEvent, Facing, Owner, Player, Position, Projectile, ProjectileBundle, SimClock,
    SimRng, Velocity, WorldBounds,
};

/// The state an agent should be in at `distance` from the player.
///
/// `Dead` is absorbing; every other state is decided by the distance alone.
pub fn evaluate(current: AiState, distance: f32, tuning: &AiTuning) -> AiState {
    match current {
        AiState::Dead => AiState::Dead,
        _ if distance < tuning.attack_range => AiState::Attack,
        _ if distance < tuning.detection_range => AiState::Chase,
        _ => AiState::Patrol,
    }
}

/// Picks a patrol waypoint within `radius` of `home`, kept inside `bounds`.
pub fn random_waypoint(rng: &mut impl Rng, home: Vec2, radius: f32, bounds: &WorldBounds) -> Vec2 {
    let angle = rng.random_range(0.0..TAU);
    let distance = if radius > 0.0 { rng.random_range(0.0..=radius) } else { 0.0 };
    bounds.clamp(home + Vec2::from_angle(angle) * distance)
}

/// Re-evaluates every living agent's state and steers it accordingly.
pub fn agent_ai_system(
    tuning: Res<AiTuning>,
    bounds: Res<WorldBounds>,
    mut rng: ResMut<SimRng>,
    mut events: EventWriter<ExploreEvent>,
    player: Query<&Position, With<Player>>,
    mut agents: Query<(Entity, &mut Agent, &Position, &mut Velocity), Without<Player>>,
) {
    let Ok(player_position) = player.single() else {
        return;
    };

    for (entity, mut agent, position, mut velocity) in agents.iter_mut() {
        if agent.is_dead() {
            continue;
        }

        let distance = position.0.distance(player_position.0);
        let next = evaluate(agent.state, distance, &tuning);
        if next != agent.state {
            trace!(?entity, from = %agent.state, to = %next, distance, "Agent state changed");
            events.write(ExploreEvent::StateChanged {
                agent: entity,
                from: agent.state,
                to: next,
            });
            if agent.state == AiState::Attack {
                // Leaving the attack range aborts the wind-up.
                agent.telegraph = None;
            }
            agent.state = next;
        }

        velocity.0 = match agent.state {
            AiState::Patrol => {
                if position.0.distance(agent.patrol_target) <= tuning.waypoint_radius {
                    agent.patrol_target = random_waypoint(&mut rng.0, agent.home, tuning.patrol_radius, &bounds);
                }
                (agent.patrol_target - position.0).normalize_or_zero() * agent.speed * tuning.patrol_speed_factor
            }
            AiState::Chase => (player_position.0 - position.0).normalize_or_zero() * agent.speed,
            AiState::Attack | AiState::Dead => Vec2::ZERO,
        };

        if let Some(facing) = Facing::from_velocity(velocity.0) {
            agent.facing = facing;
        } else if agent.state == AiState::Attack {
            agent.facing = Facing::from_velocity(player_position.0 - position.0).unwrap_or(agent.facing);
        }
    }
}

/// Winds up and fires telegraphed shots for agents in the attack state.
pub fn agent_attack_system(
    mut commands: Commands,
    tuning: Res<AiTuning>,
    clock: Res<SimClock>,
    delta_time: Res<DeltaTime>,
    mut events: EventWriter<ExploreEvent>,
    player: Query<&Position, With<Player>>,
    mut agents: Query<(&mut Agent, &Position), Without<Player>>,
) {
    let Ok(player_position) = player.single() else {
        return;
    };

    for (mut agent, position) in agents.iter_mut() {
        if agent.state != AiState::Attack {
            continue;
        }

        match agent.telegraph {
            Some(remaining) => {
                let remaining = remaining - delta_time.seconds;
                if remaining > 0.0 {
                    agent.telegraph = Some(remaining);
                    continue;
                }

                agent.telegraph = None;
                agent.last_attack = Some(clock.0);
                let direction = (player_position.0 - position.0).normalize_or_zero();
                commands.spawn(ProjectileBundle {
                    projectile: Projectile {
                        owner: Owner::Agent,
                        age: 0.0,
                        max_age: tuning.projectile_max_age,
                    },
                    position: *position,
                    velocity: Velocity(direction * tuning.projectile_speed),
                });
                events.write(ExploreEvent::Fired {
                    owner: Owner::Agent,
                    at: position.0,
                });
            }
            None if agent.can_attack(clock.0) => {
                agent.telegraph = Some(tuning.telegraph);
                events.write(ExploreEvent::Telegraph {
                    at: position.0,
                    duration: tuning.telegraph,
                });
            }
            None => {}
        }
    }
}
