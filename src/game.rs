use crate::browser;
use crate::engine;
use crate::engine::input::KeyState;
use crate::engine::{Game, Point, Rect, Renderer, Size};
use crate::sprite::runner::{Runner, RUN_SPEED};
use crate::sprite::{self, Direction, Pose};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::join;
use serde::{Deserialize, Serialize};
use web_sys::HtmlImageElement;

/// ┌────────────────────── Update flow per frame ──────────────────────┐
/// │                                                                   │
/// │   GameLoop ──► Hillside::update ──► Intent::sample(KeyState)      │
/// │                       │                                           │
/// │                       └──► Stage::update(Intent)                  │
/// │                             ├── jump impulse (key-down edge)      │
/// │                             ├── runner tick (frame, integrate,    │
/// │                             │   gravity clamp at the floor)       │
/// │                             ├── dead-zone / scroll resolution     │
/// │                             ├── platform landing checks           │
/// │                             ├── pose selection                    │
/// │                             └── win / lose evaluation             │
/// │                                                                   │
/// └───────────────────────────────────────────────────────────────────┘
pub enum Hillside {
    /// Waiting on the level layout and images; transitions to `Loaded`
    /// exactly once.
    Loading,

    /// Active game with every asset measured and the stage built.
    Loaded(World),
}

pub const VIEWPORT_WIDTH: f32 = 1024.0;
pub const VIEWPORT_HEIGHT: f32 = 576.0;

// camera consts: the band the runner moves through before the world
// scrolls under it instead
const DEAD_ZONE_LEFT: f32 = 100.0;
const DEAD_ZONE_RIGHT: f32 = 400.0;
const PARALLAX: f32 = 0.66;

// key bindings; ArrowDown is reserved and deliberately unbound
const KEY_LEFT: &str = "ArrowLeft";
const KEY_RIGHT: &str = "ArrowRight";
const KEY_JUMP: &str = "Space";

impl Hillside {
    const LEVEL_PATH: &'static str = "level.json";

    pub fn new() -> Self {
        Hillside::Loading
    }

    async fn load_level() -> Result<Level> {
        browser::fetch_json::<Level>(Self::LEVEL_PATH)
            .await
            .with_context(|| format!("Failed to load level layout from : {}", Self::LEVEL_PATH))
    }
}

#[async_trait(?Send)]
impl Game for Hillside {
    async fn initialize(&self) -> Result<Box<dyn Game>> {
        match self {
            Hillside::Loading => {
                let (level, assets) = join!(Self::load_level(), Assets::load());
                let level = level?;
                let assets = assets?;
                let stage = Stage::new(level, assets.measure());
                Ok(Box::new(Hillside::Loaded(World {
                    assets,
                    stage,
                    intent: Intent::default(),
                })))
            }
            Hillside::Loaded(_) => Err(anyhow!("Game is already initialized")),
        }
    }

    fn update(&mut self, keystate: &KeyState) {
        if let Hillside::Loaded(world) = self {
            world.intent = world.intent.sample(keystate);
            if world.intent.jump_started {
                log!("jump");
            }
            match world.stage.update(&world.intent) {
                Some(Outcome::Won) => log!("course clear"),
                Some(Outcome::Lost) => log!("fell off the world, level reset"),
                None => {}
            }
        }
    }

    fn draw(&self, renderer: &Renderer) {
        if let Hillside::Loaded(world) = self {
            let viewport = Rect::new(
                Point { x: 0.0, y: 0.0 },
                Size {
                    width: VIEWPORT_WIDTH,
                    height: VIEWPORT_HEIGHT,
                },
            );
            renderer.clear(&viewport);
            renderer.fill_rect(&viewport, "white");

            // Draw order matters : backdrops -> platforms -> runner
            for backdrop in world.stage.backdrops() {
                renderer
                    .draw_entire_image(world.assets.backdrop(backdrop.kind), &backdrop.body.position);
            }
            for platform in world.stage.platforms() {
                renderer
                    .draw_entire_image(world.assets.platform(platform.kind), &platform.body.position);
            }
            let runner = world.stage.runner();
            runner.draw(renderer, world.assets.strip(runner.pose()));
        }
    }
}

pub struct World {
    assets: Assets,
    stage: Stage,
    intent: Intent,
}

// ==================== Level configuration ====================

/// Level layout, fetched from `level.json`. Platform and backdrop sizes are
/// not part of the layout; they come from the loaded images' intrinsic
/// dimensions. The win threshold is layout data, not a derived quantity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Level {
    pub spawn: Point,
    pub platforms: Vec<PlatformPlacement>,
    pub backdrops: Vec<BackdropPlacement>,
    pub win_offset: f32,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PlatformPlacement {
    pub kind: PlatformKind,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    Ground,
    Ledge,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct BackdropPlacement {
    pub kind: BackdropKind,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackdropKind {
    Background,
    Hills,
}

// ==================== Assets ====================

pub struct Assets {
    ground: HtmlImageElement,
    ledge: HtmlImageElement,
    background: HtmlImageElement,
    hills: HtmlImageElement,
    stand_left: HtmlImageElement,
    stand_right: HtmlImageElement,
    run_left: HtmlImageElement,
    run_right: HtmlImageElement,
}

impl Assets {
    /// Independent resources load simultaneously; total time is the slowest
    /// single image, and any failure aborts startup.
    async fn load() -> Result<Self> {
        let (ground, ledge, background, hills) = join!(
            engine::load_image("images/platform.png"),
            engine::load_image("images/platformSmallTall.png"),
            engine::load_image("images/background.png"),
            engine::load_image("images/hills.png"),
        );
        let (stand_left, stand_right, run_left, run_right) = join!(
            engine::load_image("images/spriteStandLeft.png"),
            engine::load_image("images/spriteStandRight.png"),
            engine::load_image("images/spriteRunLeft.png"),
            engine::load_image("images/spriteRunRight.png"),
        );

        Ok(Assets {
            ground: ground.context("Failed to load images/platform.png")?,
            ledge: ledge.context("Failed to load images/platformSmallTall.png")?,
            background: background.context("Failed to load images/background.png")?,
            hills: hills.context("Failed to load images/hills.png")?,
            stand_left: stand_left.context("Failed to load images/spriteStandLeft.png")?,
            stand_right: stand_right.context("Failed to load images/spriteStandRight.png")?,
            run_left: run_left.context("Failed to load images/spriteRunLeft.png")?,
            run_right: run_right.context("Failed to load images/spriteRunRight.png")?,
        })
    }

    /// Intrinsic pixel dimensions of the world images; body rects are built
    /// from these once at stage construction.
    fn measure(&self) -> AssetSizes {
        AssetSizes {
            ground: Self::size_of(&self.ground),
            ledge: Self::size_of(&self.ledge),
            background: Self::size_of(&self.background),
            hills: Self::size_of(&self.hills),
        }
    }

    fn size_of(image: &HtmlImageElement) -> Size {
        Size {
            width: image.width() as f32,
            height: image.height() as f32,
        }
    }

    fn platform(&self, kind: PlatformKind) -> &HtmlImageElement {
        match kind {
            PlatformKind::Ground => &self.ground,
            PlatformKind::Ledge => &self.ledge,
        }
    }

    fn backdrop(&self, kind: BackdropKind) -> &HtmlImageElement {
        match kind {
            BackdropKind::Background => &self.background,
            BackdropKind::Hills => &self.hills,
        }
    }

    fn strip(&self, pose: Pose) -> &HtmlImageElement {
        match pose {
            Pose::StandLeft => &self.stand_left,
            Pose::StandRight => &self.stand_right,
            Pose::RunLeft => &self.run_left,
            Pose::RunRight => &self.run_right,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AssetSizes {
    pub ground: Size,
    pub ledge: Size,
    pub background: Size,
    pub hills: Size,
}

impl AssetSizes {
    fn platform(&self, kind: PlatformKind) -> Size {
        match kind {
            PlatformKind::Ground => self.ground,
            PlatformKind::Ledge => self.ledge,
        }
    }

    fn backdrop(&self, kind: BackdropKind) -> Size {
        match kind {
            BackdropKind::Background => self.background,
            BackdropKind::Hills => self.hills,
        }
    }
}

// ==================== Input interpretation ====================

/// The per-frame reading of the key map. `last` is the last-pressed
/// direction marker; it only moves on a newly pressed direction key and it
/// survives stage resets, like the key map itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct Intent {
    left: bool,
    right: bool,
    jump_held: bool,
    jump_started: bool,
    last: Option<Direction>,
}

impl Intent {
    /// Pure: previous sample + key map -> next sample. `jump_started` is
    /// the rising edge of the jump key, so a held jump fires exactly once.
    fn sample(&self, keystate: &KeyState) -> Intent {
        let left = keystate.is_pressed(KEY_LEFT);
        let right = keystate.is_pressed(KEY_RIGHT);
        let jump_held = keystate.is_pressed(KEY_JUMP);

        let last = if left && !self.left {
            Some(Direction::Left)
        } else if right && !self.right {
            Some(Direction::Right)
        } else {
            self.last
        };

        Intent {
            left,
            right,
            jump_held,
            jump_started: jump_held && !self.jump_held,
            last,
        }
    }
}

// ==================== Stage ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy)]
pub struct Platform {
    pub kind: PlatformKind,
    pub body: Rect,
}

#[derive(Debug, Clone, Copy)]
pub struct Backdrop {
    pub kind: BackdropKind,
    pub body: Rect,
}

/// The whole mutable game state: runner, world bodies, camera scroll, and
/// the win latch. Owned by the orchestrator; input arrives as an `Intent`
/// argument, never as ambient state. Touches no DOM type.
pub struct Stage {
    runner: Runner,
    platforms: Vec<Platform>,
    backdrops: Vec<Backdrop>,
    scroll_offset: f32,
    won: bool,
    level: Level,
    sizes: AssetSizes,
}

impl Stage {
    pub fn new(level: Level, sizes: AssetSizes) -> Self {
        let runner = Runner::new(level.spawn);
        let platforms = level
            .platforms
            .iter()
            .map(|placement| Platform {
                kind: placement.kind,
                body: Rect::new(
                    Point {
                        x: placement.x,
                        y: placement.y,
                    },
                    sizes.platform(placement.kind),
                ),
            })
            .collect();
        let backdrops = level
            .backdrops
            .iter()
            .map(|placement| Backdrop {
                kind: placement.kind,
                body: Rect::new(
                    Point {
                        x: placement.x,
                        y: placement.y,
                    },
                    sizes.backdrop(placement.kind),
                ),
            })
            .collect();

        Stage {
            runner,
            platforms,
            backdrops,
            scroll_offset: 0.0,
            won: false,
            level,
            sizes,
        }
    }

    /// Full reset to the level-defined origins; the only recovery path,
    /// taken on the lose condition.
    fn reset(&mut self) {
        *self = Stage::new(self.level.clone(), self.sizes);
    }

    pub fn update(&mut self, intent: &Intent) -> Option<Outcome> {
        if intent.jump_started {
            self.runner.jump();
        }

        self.runner.update(VIEWPORT_HEIGHT);
        self.resolve_scroll(intent);

        for platform in &self.platforms {
            if self.runner.lands_on(&platform.body) {
                self.runner.halt_fall();
            }
        }

        let next = sprite::next_pose(self.runner.pose(), intent.left, intent.right, intent.last);
        self.runner.assume(next);

        if !self.won && self.scroll_offset > self.level.win_offset {
            self.won = true;
            return Some(Outcome::Won);
        }
        if self.runner.bounding_box().bottom() > VIEWPORT_HEIGHT {
            self.reset();
            return Some(Outcome::Lost);
        }
        None
    }

    /// Exactly one regime per frame, first match wins:
    /// 1. right held inside the dead zone -> run right,
    /// 2. left held inside the dead zone (or against the world's left edge
    ///    while unscrolled) -> run left,
    /// 3. otherwise stand still and scroll the world under the runner;
    ///    `scroll_offset` never drops below zero.
    fn resolve_scroll(&mut self, intent: &Intent) {
        let x = self.runner.context().position.x;

        if intent.right && x < DEAD_ZONE_RIGHT {
            self.runner.set_horizontal_velocity(RUN_SPEED);
        } else if intent.left && (x > DEAD_ZONE_LEFT || (self.scroll_offset == 0.0 && x > 0.0)) {
            self.runner.set_horizontal_velocity(-RUN_SPEED);
        } else {
            self.runner.set_horizontal_velocity(0.0);
            if intent.right {
                self.scroll_offset += RUN_SPEED;
                self.shift_world(-RUN_SPEED);
            } else if intent.left && self.scroll_offset > 0.0 {
                self.scroll_offset -= RUN_SPEED;
                self.shift_world(RUN_SPEED);
            }
        }
    }

    // Platforms move at full scroll speed, backdrops at the parallax
    // fraction.
    fn shift_world(&mut self, delta: f32) {
        for platform in &mut self.platforms {
            platform.body.position.x += delta;
        }
        for backdrop in &mut self.backdrops {
            backdrop.body.position.x += delta * PARALLAX;
        }
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn backdrops(&self) -> &[Backdrop] {
        &self.backdrops
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn one_platform_level(win_offset: f32) -> Level {
        Level {
            spawn: Point { x: 100.0, y: 300.0 },
            platforms: vec![PlatformPlacement {
                kind: PlatformKind::Ground,
                x: 0.0,
                y: 470.0,
            }],
            backdrops: vec![BackdropPlacement {
                kind: BackdropKind::Hills,
                x: -1.0,
                y: -1.0,
            }],
            win_offset,
        }
    }

    /// One effectively endless runway so horizontal tests never fall off.
    fn runway_sizes() -> AssetSizes {
        AssetSizes {
            ground: Size {
                width: 100_000.0,
                height: 125.0,
            },
            ledge: Size {
                width: 291.0,
                height: 227.0,
            },
            background: Size {
                width: 11_643.0,
                height: 732.0,
            },
            hills: Size {
                width: 7_545.0,
                height: 592.0,
            },
        }
    }

    fn narrow_sizes() -> AssetSizes {
        AssetSizes {
            ground: Size {
                width: 200.0,
                height: 20.0,
            },
            ..runway_sizes()
        }
    }

    fn intent_right() -> Intent {
        Intent {
            left: false,
            right: true,
            jump_held: false,
            jump_started: false,
            last: Some(Direction::Right),
        }
    }

    fn intent_left() -> Intent {
        Intent {
            left: true,
            right: false,
            jump_held: false,
            jump_started: false,
            last: Some(Direction::Left),
        }
    }

    #[test]
    fn the_opening_drop_rests_on_the_first_platform() {
        let mut stage = Stage::new(one_platform_level(1.0e9), narrow_sizes());
        let idle = Intent::default();

        stage.update(&idle);
        assert_relative_eq!(stage.runner().bounding_box().bottom(), 470.0);
        assert_relative_eq!(stage.runner().context().velocity.y, 0.0);

        // continued gravity never pushes the runner through the platform
        for _ in 0..120 {
            stage.update(&idle);
            assert_relative_eq!(stage.runner().bounding_box().bottom(), 470.0);
            assert_relative_eq!(stage.runner().context().velocity.y, 0.0);
        }
    }

    #[test]
    fn the_dead_zone_caps_direct_movement_then_scrolls() {
        let mut stage = Stage::new(one_platform_level(1.0e9), runway_sizes());
        let right = intent_right();

        // first frame only primes the horizontal velocity
        stage.update(&right);
        let mut previous_x = stage.runner().context().position.x;
        assert_relative_eq!(previous_x, 100.0);

        while stage.runner().context().position.x < DEAD_ZONE_RIGHT {
            assert_relative_eq!(stage.scroll_offset(), 0.0);
            stage.update(&right);
            let x = stage.runner().context().position.x;
            assert_relative_eq!(x, previous_x + RUN_SPEED);
            previous_x = x;
        }

        // the frame that reached the boundary already scrolled once
        assert_relative_eq!(previous_x, DEAD_ZONE_RIGHT);
        assert_relative_eq!(stage.scroll_offset(), RUN_SPEED);

        for step in 1..=10 {
            stage.update(&right);
            assert_relative_eq!(stage.runner().context().position.x, DEAD_ZONE_RIGHT);
            assert_relative_eq!(stage.scroll_offset(), RUN_SPEED * (1.0 + step as f32));
        }
    }

    #[test]
    fn the_scroll_offset_never_goes_negative() {
        let mut stage = Stage::new(one_platform_level(1.0e9), runway_sizes());
        let right = intent_right();
        let left = intent_left();

        for _ in 0..70 {
            stage.update(&right);
        }
        assert!(stage.scroll_offset() > 0.0);

        for _ in 0..200 {
            stage.update(&left);
            assert!(stage.scroll_offset() >= 0.0);
        }
        assert_relative_eq!(stage.scroll_offset(), 0.0);
        assert!(stage.runner().context().position.x >= 0.0);
    }

    #[test]
    fn one_scroll_frame_shifts_the_world_and_its_mirror_restores_it() {
        let mut stage = Stage::new(one_platform_level(1.0e9), runway_sizes());
        stage.runner.context_mut().position.x = DEAD_ZONE_RIGHT;
        let platform_x = stage.platforms()[0].body.position.x;
        let backdrop_x = stage.backdrops()[0].body.position.x;

        stage.update(&intent_right());
        assert_relative_eq!(stage.scroll_offset(), RUN_SPEED);
        assert_relative_eq!(stage.platforms()[0].body.position.x, platform_x - RUN_SPEED);
        assert_relative_eq!(
            stage.backdrops()[0].body.position.x,
            backdrop_x - RUN_SPEED * PARALLAX,
            epsilon = 1.0e-4
        );

        stage.runner.context_mut().position.x = DEAD_ZONE_LEFT;
        stage.update(&intent_left());
        assert_relative_eq!(stage.scroll_offset(), 0.0);
        assert_relative_eq!(
            stage.platforms()[0].body.position.x,
            platform_x,
            epsilon = 1.0e-4
        );
        assert_relative_eq!(
            stage.backdrops()[0].body.position.x,
            backdrop_x,
            epsilon = 1.0e-4
        );
    }

    #[test]
    fn falling_out_of_the_world_resets_the_stage() {
        let mut stage = Stage::new(one_platform_level(1.0e9), runway_sizes());
        let pristine = Stage::new(one_platform_level(1.0e9), runway_sizes());

        for _ in 0..70 {
            stage.update(&intent_right());
        }
        assert!(stage.platforms()[0].body.position.x < pristine.platforms()[0].body.position.x);

        stage.runner.context_mut().position.y = 600.0;
        let outcome = stage.update(&Intent::default());

        assert_eq!(outcome, Some(Outcome::Lost));
        assert_relative_eq!(stage.scroll_offset(), 0.0);
        assert_eq!(stage.runner().context().position, pristine.level.spawn);
        assert_relative_eq!(
            stage.platforms()[0].body.position.x,
            pristine.platforms()[0].body.position.x
        );
        assert_relative_eq!(
            stage.backdrops()[0].body.position.x,
            pristine.backdrops()[0].body.position.x
        );
    }

    #[test]
    fn scrolling_past_the_win_offset_wins_exactly_once() {
        let mut stage = Stage::new(one_platform_level(20.0), runway_sizes());
        let right = intent_right();

        let mut outcomes = Vec::new();
        for _ in 0..120 {
            if let Some(outcome) = stage.update(&right) {
                outcomes.push(outcome);
            }
        }
        assert_eq!(outcomes, vec![Outcome::Won]);
    }

    #[test]
    fn running_right_then_stopping_leaves_the_runner_standing_right() {
        let mut stage = Stage::new(one_platform_level(1.0e9), runway_sizes());
        for _ in 0..3 {
            stage.update(&intent_right());
        }
        assert_eq!(stage.runner().pose(), Pose::RunRight);
        assert_relative_eq!(stage.runner().width(), 127.875);

        let released = Intent {
            last: Some(Direction::Right),
            ..Intent::default()
        };
        stage.update(&released);
        assert_eq!(stage.runner().pose(), Pose::StandRight);
        assert_relative_eq!(stage.runner().width(), 66.0);
    }

    #[test]
    fn jump_triggers_only_on_the_key_down_edge() {
        let mut keystate = KeyState::new();
        keystate.set_pressed(KEY_JUMP);

        let first = Intent::default().sample(&keystate);
        assert!(first.jump_held && first.jump_started);

        let second = first.sample(&keystate);
        assert!(second.jump_held && !second.jump_started);

        keystate.set_released(KEY_JUMP);
        let third = second.sample(&keystate);
        assert!(!third.jump_held && !third.jump_started);

        keystate.set_pressed(KEY_JUMP);
        let fourth = third.sample(&keystate);
        assert!(fourth.jump_started);
    }

    #[test]
    fn the_last_direction_marker_follows_newly_pressed_keys() {
        let mut keystate = KeyState::new();
        keystate.set_pressed(KEY_RIGHT);
        let intent = Intent::default().sample(&keystate);
        assert!(intent.right);
        assert_eq!(intent.last, Some(Direction::Right));

        // both held; the newer press takes the marker
        keystate.set_pressed(KEY_LEFT);
        let intent = intent.sample(&keystate);
        assert_eq!(intent.last, Some(Direction::Left));

        // releasing a key does not move the marker
        keystate.set_released(KEY_LEFT);
        let intent = intent.sample(&keystate);
        assert_eq!(intent.last, Some(Direction::Left));
    }
}
