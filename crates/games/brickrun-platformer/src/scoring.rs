/// Points for consecutive stomps without touching the ground.
///
/// Scoring: 100, 200, 400, 800, 1000, 2000, 4000, 8000, then an extra life per stomp.
pub const STOMP_CHAIN: [u32; 8] = [100, 200, 400, 800, 1000, 2000, 4000, 8000];
pub const COIN_POINTS: u32 = 200;
pub const BRICK_POINTS: u32 = 50;
pub const POWER_UP_POINTS: u32 = 1000;
/// Enemy defeated by a shell, fireball or star.
pub const KILL_POINTS: u32 = 100;
pub const COINS_PER_LIFE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Award {
    Points(u32),
    ExtraLife,
}

/// Award for the `combo`-th stomp in a chain (0-based).
pub fn stomp_award(combo: usize) -> Award {
    match STOMP_CHAIN.get(combo) {
        Some(&points) => Award::Points(points),
        None => Award::ExtraLife,
    }
}

/// Flag bonus by grab height, as a fraction of the pole (0 = bottom, 1 = top).
pub fn flag_points(fraction: f32) -> u32 {
    match fraction {
        f if f >= 0.9 => 5000,
        f if f >= 0.7 => 2000,
        f if f >= 0.5 => 800,
        f if f >= 0.3 => 400,
        _ => 100,
    }
}

/// Running score state of one play session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreBoard {
    pub score: u32,
    pub coins: u32,
    pub lives: u32,
    combo: usize,
}

impl ScoreBoard {
    pub fn new(lives: u32) -> Self {
        Self {
            score: 0,
            coins: 0,
            lives,
            combo: 0,
        }
    }

    pub fn add(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
    }

    /// Score a stomp and extend the chain.
    pub fn stomp(&mut self) -> Award {
        let award = stomp_award(self.combo);
        self.combo += 1;
        match award {
            Award::Points(points) => self.add(points),
            Award::ExtraLife => self.lives += 1,
        }
        award
    }

    pub fn reset_combo(&mut self) {
        self.combo = 0;
    }

    pub fn combo(&self) -> usize {
        self.combo
    }

    /// Returns true when the coin completed a life.
    pub fn coin(&mut self) -> bool {
        self.add(COIN_POINTS);
        self.coins += 1;
        if self.coins >= COINS_PER_LIFE {
            self.coins -= COINS_PER_LIFE;
            self.lives += 1;
            return true;
        }
        false
    }

    /// Returns false when no lives are left.
    pub fn lose_life(&mut self) -> bool {
        self.lives = self.lives.saturating_sub(1);
        self.combo = 0;
        self.lives > 0
    }
}
