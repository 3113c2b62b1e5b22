#[cfg(debug_assertions)]
use crate::engine::DebugDraw;
use crate::engine::{Point, Rect, Renderer, Size};
use crate::sprite::Pose;
use web_sys::HtmlImageElement;

// physics consts
pub(crate) const RUN_SPEED: f32 = 5.0;
const GRAVITY: f32 = 1.0;
const JUMP_IMPULSE: f32 = 25.0;
const SPAWN_FALL_SPEED: f32 = 20.0;
const HEIGHT: f32 = 150.0;

/// Physics and display counters shared by every pose: the animation frame,
/// the transform, and the velocity integrated into it each tick.
#[derive(Debug, Clone, Copy)]
pub struct RunnerContext {
    pub frame: u8,
    pub position: Point,
    pub velocity: Point,
}

impl RunnerContext {
    /// One tick: advance the render frame, integrate velocity, then either
    /// keep accelerating the fall or halt it at the world floor. `cycle` is
    /// the current pose's animation length; `frame` never reaches it.
    pub fn update(mut self, cycle: u8, floor: f32) -> Self {
        self.frame = if self.frame + 1 >= cycle {
            0
        } else {
            self.frame + 1
        };

        self.position.x += self.velocity.x;
        self.position.y += self.velocity.y;

        if self.position.y + HEIGHT + self.velocity.y <= floor {
            self.velocity.y += GRAVITY;
        } else {
            self.velocity.y = 0.0;
        }

        self
    }

    // Reset to frame 0 on a pose switch: cycle lengths differ per pose and
    // a stale index would sample past the end of the shorter strip.
    fn reset_frame(mut self) -> Self {
        self.frame = 0;
        self
    }

    fn with_horizontal_velocity(mut self, x: f32) -> Self {
        self.velocity.x = x;
        self
    }

    fn with_jump_impulse(mut self) -> Self {
        self.velocity.y -= JUMP_IMPULSE;
        self
    }

    fn halted(mut self) -> Self {
        self.velocity.y = 0.0;
        self
    }
}

pub struct Runner {
    context: RunnerContext,
    pose: Pose,
}

impl Runner {
    pub fn new(spawn: Point) -> Self {
        Runner {
            context: RunnerContext {
                frame: 0,
                position: spawn,
                velocity: Point {
                    x: 0.0,
                    y: SPAWN_FALL_SPEED,
                },
            },
            pose: Pose::StandRight,
        }
    }

    pub fn update(&mut self, floor: f32) {
        self.context = self.context.update(self.pose.metadata().cycle, floor);
    }

    pub fn jump(&mut self) {
        self.context = self.context.with_jump_impulse();
    }

    pub fn set_horizontal_velocity(&mut self, x: f32) {
        self.context = self.context.with_horizontal_velocity(x);
    }

    /// Rest on a platform: descent stops, position is left where the tick
    /// put it.
    pub fn halt_fall(&mut self) {
        self.context = self.context.halted();
    }

    /// Take on a pose; switching restarts the animation cycle and changes
    /// the displayed width to the new pose's logical width.
    pub fn assume(&mut self, pose: Pose) {
        if pose != self.pose {
            self.pose = pose;
            self.context = self.context.reset_frame();
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn context(&self) -> &RunnerContext {
        &self.context
    }

    #[cfg(test)]
    pub(crate) fn context_mut(&mut self) -> &mut RunnerContext {
        &mut self.context
    }

    pub fn width(&self) -> f32 {
        self.pose.metadata().logical_width
    }

    pub fn bounding_box(&self) -> Rect {
        Rect::new(
            self.context.position,
            Size {
                width: self.width(),
                height: HEIGHT,
            },
        )
    }

    /// True when this tick's fall lands the runner on `platform`: bottom
    /// edge at or above the platform top, one more step of the current
    /// velocity reaching or crossing it, and horizontal overlap.
    pub fn lands_on(&self, platform: &Rect) -> bool {
        let bottom = self.context.position.y + HEIGHT;
        bottom <= platform.position.y
            && bottom + self.context.velocity.y >= platform.position.y
            && self.context.position.x + self.width() >= platform.position.x
            && self.context.position.x <= platform.right()
    }

    pub fn draw(&self, renderer: &Renderer, strip: &HtmlImageElement) {
        let metadata = self.pose.metadata();
        renderer.draw_sprite(
            strip,
            &Rect::new(
                Point {
                    x: metadata.crop_width * f32::from(self.context.frame),
                    y: 0.0,
                },
                Size {
                    width: metadata.crop_width,
                    height: metadata.crop_height,
                },
            ),
            &self.bounding_box(),
        );

        #[cfg(debug_assertions)]
        self.bounding_box().draw_debug(renderer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FLOOR: f32 = 576.0;

    fn airborne_context() -> RunnerContext {
        RunnerContext {
            frame: 0,
            position: Point { x: 100.0, y: 100.0 },
            velocity: Point { x: 0.0, y: 0.0 },
        }
    }

    #[test]
    fn gravity_accelerates_the_fall_by_one_each_tick() {
        let mut context = airborne_context();
        for tick in 1..=5 {
            context = context.update(60, FLOOR);
            assert_relative_eq!(context.velocity.y, tick as f32);
        }
    }

    #[test]
    fn velocity_integrates_into_position() {
        let mut context = airborne_context();
        context.velocity = Point { x: 5.0, y: 20.0 };
        context = context.update(60, FLOOR);
        assert_relative_eq!(context.position.x, 105.0);
        assert_relative_eq!(context.position.y, 120.0);
    }

    #[test]
    fn descent_halts_when_the_next_step_would_pass_the_floor() {
        let mut context = airborne_context();
        // bottom edge at 570, one step of 10 projects past the floor
        context.position.y = 420.0;
        context.velocity.y = 10.0;
        context = context.update(60, FLOOR);
        assert_relative_eq!(context.velocity.y, 0.0);
    }

    #[test]
    fn frame_wraps_at_the_run_cycle() {
        let mut context = airborne_context();
        context.frame = 28;
        context = context.update(30, FLOOR);
        assert_eq!(context.frame, 29);
        context = context.update(30, FLOOR);
        assert_eq!(context.frame, 0);
    }

    #[test]
    fn frame_wraps_at_the_stand_cycle() {
        let mut context = airborne_context();
        context.frame = 59;
        context = context.update(60, FLOOR);
        assert_eq!(context.frame, 0);
    }

    #[test]
    fn frame_stays_inside_the_cycle_over_many_ticks() {
        let mut context = airborne_context();
        for _ in 0..200 {
            context = context.update(30, FLOOR);
            assert!(context.frame < 30);
        }
    }

    #[test]
    fn jump_applies_the_upward_impulse() {
        let mut runner = Runner::new(Point { x: 100.0, y: 300.0 });
        runner.halt_fall();
        runner.jump();
        assert_relative_eq!(runner.context().velocity.y, -25.0);
    }

    #[test]
    fn assuming_a_new_pose_resets_the_frame_and_width() {
        let mut runner = Runner::new(Point { x: 100.0, y: 300.0 });
        runner.context_mut().frame = 17;
        assert_relative_eq!(runner.width(), 66.0);

        runner.assume(Pose::RunRight);
        assert_eq!(runner.context().frame, 0);
        assert_relative_eq!(runner.width(), 127.875);
    }

    #[test]
    fn assuming_the_same_pose_keeps_the_frame() {
        let mut runner = Runner::new(Point { x: 100.0, y: 300.0 });
        runner.context_mut().frame = 17;
        runner.assume(Pose::StandRight);
        assert_eq!(runner.context().frame, 17);
    }

    #[test]
    fn lands_on_a_platform_the_fall_is_about_to_reach() {
        let runner = Runner::new(Point { x: 100.0, y: 300.0 });
        let platform = Rect::new(
            Point { x: 0.0, y: 470.0 },
            Size {
                width: 200.0,
                height: 20.0,
            },
        );
        // bottom at 450, falling 20 per tick
        assert!(runner.lands_on(&platform));
    }

    #[test]
    fn does_not_land_while_still_too_high() {
        let mut runner = Runner::new(Point { x: 100.0, y: 100.0 });
        runner.context_mut().velocity.y = 20.0;
        let platform = Rect::new(
            Point { x: 0.0, y: 470.0 },
            Size {
                width: 200.0,
                height: 20.0,
            },
        );
        assert!(!runner.lands_on(&platform));
    }

    #[test]
    fn does_not_land_once_already_past_the_platform_top() {
        let mut runner = Runner::new(Point { x: 100.0, y: 400.0 });
        runner.context_mut().velocity.y = 20.0;
        let platform = Rect::new(
            Point { x: 0.0, y: 470.0 },
            Size {
                width: 200.0,
                height: 20.0,
            },
        );
        // bottom at 550, below the top at 470
        assert!(!runner.lands_on(&platform));
    }

    #[test]
    fn does_not_land_without_horizontal_overlap() {
        let runner = Runner::new(Point { x: 500.0, y: 300.0 });
        let platform = Rect::new(
            Point { x: 0.0, y: 470.0 },
            Size {
                width: 200.0,
                height: 20.0,
            },
        );
        assert!(!runner.lands_on(&platform));
    }
}
