//! The level controller: drives the world from the frame scheduler, turns
//! gameplay events into score state, and handles death, pipes and the goal.

use glam::Vec2;
use tracing::{debug, info, warn};

use brickrun_core::error::{CreateError, LevelError};
use brickrun_core::input::ActionState;
use brickrun_core::level::{load_level, save_level};
use brickrun_core::object::{HasSprite, KindTag, ObjectId, RemoveCause};
use brickrun_core::registry::CommonParams;
use brickrun_core::time::Simulation;
use brickrun_core::world::World;

use crate::camera::Camera;
use crate::config::PlatformerConfig;
use crate::events::{GameEvent, LevelEvent};
use crate::ids::GameObjectId;
use crate::objects::flag::FlagPole;
use crate::objects::player::Player;
use crate::objects::terrain::Pipe;
use crate::registry::{Registry, default_registry};
use crate::scoring::{BRICK_POINTS, KILL_POINTS, POWER_UP_POINTS, ScoreBoard, flag_points};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LevelState {
    Playing,
    /// Player died; the level restarts when the timer runs out.
    Dying { remaining: f32 },
    /// Flag reached and lowered.
    Finished,
    GameOver,
}

pub struct Level {
    config: PlatformerConfig,
    registry: Registry,
    world: World<GameEvent>,
    board: ScoreBoard,
    camera: Camera,
    state: LevelState,
    /// Layout restored on restart.
    layout: String,
    events: Vec<LevelEvent>,
}

impl Level {
    pub fn new(config: PlatformerConfig) -> Self {
        Self {
            registry: default_registry(),
            world: World::new(&config.engine),
            board: ScoreBoard::new(config.starting_lives),
            camera: Camera::new(config.camera.clone()),
            state: LevelState::Playing,
            layout: "[]".to_string(),
            events: Vec::new(),
            config,
        }
    }

    /// Replace the current level with `text`. A level that fails validation
    /// leaves the current one in place; one that fails during creation leaves
    /// the world empty.
    pub fn load(&mut self, text: &str) -> Result<(), LevelError> {
        let ids = load_level(&mut self.world, &self.registry, text)?;
        self.layout = text.to_string();
        self.state = LevelState::Playing;
        self.board.reset_combo();
        self.prepare_player();
        info!(objects = ids.len(), "level started");
        Ok(())
    }

    pub fn save(&self) -> Result<String, LevelError> {
        save_level(&self.world, &self.registry)
    }

    /// Reload the layout from the last load or edit. Score, coins and lives carry over.
    pub fn restart(&mut self) -> Result<(), LevelError> {
        let layout = std::mem::take(&mut self.layout);
        let result = self.load(&layout);
        self.layout = layout;
        result?;
        self.events.push(LevelEvent::Restarted);
        Ok(())
    }

    /// Editor placement through the registration table.
    pub fn place(&mut self, kind: KindTag, params: &CommonParams) -> Result<ObjectId, CreateError> {
        let id = self.registry.place(&mut self.world, kind, params)?;
        if kind == GameObjectId::Player {
            self.prepare_player();
        }
        self.remember_layout();
        Ok(id)
    }

    /// Editor removal. Returns false when `id` is not live.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        let removed = self.world.remove_entity(id, RemoveCause::Editor);
        if removed {
            self.remember_layout();
        }
        removed
    }

    pub fn world(&self) -> &World<GameEvent> {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World<GameEvent> {
        &mut self.world
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn input_mut(&mut self) -> &mut ActionState {
        self.world.input_mut()
    }

    pub fn board(&self) -> &ScoreBoard {
        &self.board
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn state(&self) -> LevelState {
        self.state
    }

    pub fn player(&self) -> Option<ObjectId> {
        self.world
            .directory()
            .first_of_kind(GameObjectId::Player.tag())
    }

    pub fn take_events(&mut self) -> Vec<LevelEvent> {
        std::mem::take(&mut self.events)
    }

    fn remember_layout(&mut self) {
        match save_level(&self.world, &self.registry) {
            Ok(text) => self.layout = text,
            Err(e) => warn!("could not snapshot level layout: {e}"),
        }
    }

    fn prepare_player(&mut self) {
        let Some(id) = self.player() else {
            return;
        };
        let tuning = self.config.player.clone();
        let Some(player) = self.world.get_as_mut::<Player>(id) else {
            return;
        };
        player.set_tuning(tuning);
        let at = player.visual().position;
        self.camera.snap(at);
    }

    fn player_position(&self) -> Option<Vec2> {
        let id = self.player()?;
        self.world
            .get_as::<Player>(id)
            .map(|player| player.visual().position)
    }

    fn process_events(&mut self) {
        let before = self.board.clone();
        for event in self.world.take_events() {
            self.apply(event);
        }
        if self.board.score != before.score {
            self.events.push(LevelEvent::ScoreChanged {
                score: self.board.score,
            });
        }
        if self.board.coins != before.coins {
            self.events.push(LevelEvent::CoinsChanged {
                coins: self.board.coins,
            });
        }
        if self.board.lives != before.lives {
            self.events.push(LevelEvent::LivesChanged {
                lives: self.board.lives,
            });
        }
    }

    fn apply(&mut self, event: GameEvent) {
        match event {
            GameEvent::CoinCollected { .. } => {
                self.board.coin();
            },
            GameEvent::PowerUpCollected { kind } => {
                if kind == GameObjectId::OneUp {
                    self.board.lives += 1;
                } else {
                    self.board.add(POWER_UP_POINTS);
                }
            },
            GameEvent::EnemyStomped { kind, .. } => {
                let award = self.board.stomp();
                debug!(?kind, ?award, combo = self.board.combo(), "stomp");
            },
            GameEvent::EnemyKilled { .. } => self.board.add(KILL_POINTS),
            GameEvent::BrickBroken { .. } => self.board.add(BRICK_POINTS),
            GameEvent::PlayerLanded => self.board.reset_combo(),
            GameEvent::PipeEntered { player, pipe } => self.enter_pipe(player, pipe),
            GameEvent::FlagReached { pole, y } => {
                let fraction = self
                    .world
                    .get_as::<FlagPole>(pole)
                    .map_or(0.0, |p| p.height_fraction(y));
                self.board.add(flag_points(fraction));
            },
            GameEvent::FlagLowered => {
                if self.state == LevelState::Playing {
                    self.state = LevelState::Finished;
                    info!(score = self.board.score, "level complete");
                    self.events.push(LevelEvent::Completed {
                        score: self.board.score,
                    });
                }
            },
            GameEvent::PlayerDied => self.player_died(),
            GameEvent::PlayerHurt
            | GameEvent::BlockBumped { .. }
            | GameEvent::FireballThrown => {},
        }
    }

    fn player_died(&mut self) {
        if self.state != LevelState::Playing {
            return;
        }
        if self.board.lose_life() {
            self.state = LevelState::Dying {
                remaining: self.config.restart_delay_secs,
            };
        } else {
            self.state = LevelState::GameOver;
            self.world.pause();
            info!(score = self.board.score, "game over");
            self.events.push(LevelEvent::GameOver {
                score: self.board.score,
            });
        }
    }

    /// Send the player to the pipe named by the entered pipe's `exit`.
    fn enter_pipe(&mut self, player: ObjectId, pipe: ObjectId) {
        let Some(exit) = self
            .world
            .get_as::<Pipe>(pipe)
            .and_then(|p| p.exit())
            .map(str::to_string)
        else {
            return;
        };
        let target = self
            .world
            .directory()
            .ids_of_kind(GameObjectId::Pipe.tag())
            .into_iter()
            .filter(|id| *id != pipe)
            .filter_map(|id| self.world.get_as::<Pipe>(id))
            .find(|p| p.name() == Some(exit.as_str()))
            .map(Pipe::top);
        let Some(to) = target else {
            warn!(%pipe, %exit, "pipe exit has no matching pipe");
            return;
        };
        let Some(p) = self.world.get_as_mut::<Player>(player) else {
            return;
        };
        p.queue_teleport(to);
        self.camera.snap(to);
        debug!(%player, ?to, "pipe teleport");
        self.events.push(LevelEvent::Teleported { to });
    }
}

impl Simulation for Level {
    fn update(&mut self, dt: f32) {
        self.world.update(dt);
        self.process_events();

        if let LevelState::Dying { remaining } = self.state {
            let remaining = remaining - dt;
            if remaining > 0.0 {
                self.state = LevelState::Dying { remaining };
            } else if let Err(e) = self.restart() {
                warn!("restart failed: {e}");
                self.state = LevelState::GameOver;
                self.events.push(LevelEvent::GameOver {
                    score: self.board.score,
                });
            }
        }

        if self.state == LevelState::Playing
            && let Some(at) = self.player_position()
        {
            self.camera.follow(at, dt);
        }
    }

    fn fixed_update(&mut self) {
        self.world.fixed_update();
        self.process_events();
    }
}
