use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tileworld_world::{WorldPos, TILE_SIZE};

/// One leg of a scripted walk. Speeds are in tiles per second.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PathStep {
    pub duration: f32,
    #[serde(default)]
    pub move_x: f32,
    #[serde(default)]
    pub move_y: f32,
}

#[derive(Debug, Deserialize)]
struct ScriptedPathFile {
    steps: Vec<PathStep>,
}

/// Replays a looping list of movement steps.
pub struct ScriptedPath {
    steps: Vec<PathStep>,
    index: usize,
    time_in_step: f32,
}

impl ScriptedPath {
    pub fn new(steps: Vec<PathStep>) -> Self {
        let steps = if steps.is_empty() {
            default_loop()
        } else {
            steps
        };
        Self {
            steps,
            index: 0,
            time_in_step: 0.0,
        }
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let file: ScriptedPathFile = serde_json::from_str(&contents)?;
        if file.steps.is_empty() {
            anyhow::bail!("scripted path file contains no steps");
        }
        Ok(Self::new(file.steps))
    }

    /// Move `pos` along the script by `dt` seconds. The script loops.
    pub fn advance(&mut self, dt: f32, pos: WorldPos) -> WorldPos {
        let step = &self.steps[self.index];
        let next = WorldPos::new(
            pos.x + step.move_x * TILE_SIZE * dt,
            pos.y + step.move_y * TILE_SIZE * dt,
        );

        self.time_in_step += dt;
        while self.time_in_step >= self.steps[self.index].duration {
            self.time_in_step -= self.steps[self.index].duration.max(f32::EPSILON);
            self.index = (self.index + 1) % self.steps.len();
        }
        next
    }
}

/// A rectangle several chunks wide, so chunks stream in and out.
fn default_loop() -> Vec<PathStep> {
    let leg = |move_x, move_y| PathStep {
        duration: 20.0,
        move_x,
        move_y,
    };
    vec![leg(4.0, 0.0), leg(0.0, 4.0), leg(-4.0, 0.0), leg(0.0, -4.0)]
}
