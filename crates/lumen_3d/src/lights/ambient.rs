//! Ambient cubes and their temporal smoothing

use glam::Vec3;
use rand::Rng;
use std::time::{Duration, Instant};

/// Six-sided incident light approximation (+X, -X, +Y, -Y, +Z, -Z)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AmbientCube {
    pub sides: [Vec3; 6],
}

impl AmbientCube {
    pub fn new(sides: [Vec3; 6]) -> Self {
        Self { sides }
    }

    /// The same color from every direction
    pub fn uniform(color: Vec3) -> Self {
        Self { sides: [color; 6] }
    }

    /// Light arriving along a unit normal
    pub fn sample(&self, normal: Vec3) -> Vec3 {
        let sq = normal * normal;
        let x = if normal.x >= 0.0 { self.sides[0] } else { self.sides[1] };
        let y = if normal.y >= 0.0 { self.sides[2] } else { self.sides[3] };
        let z = if normal.z >= 0.0 { self.sides[4] } else { self.sides[5] };
        x * sq.x + y * sq.y + z * sq.z
    }

    pub fn lerp(&self, other: &AmbientCube, t: f32) -> AmbientCube {
        let mut sides = self.sides;
        for (side, target) in sides.iter_mut().zip(other.sides.iter()) {
            *side = side.lerp(*target, t);
        }
        AmbientCube { sides }
    }

    pub fn scaled(&self, factor: f32) -> AmbientCube {
        AmbientCube {
            sides: self.sides.map(|s| s * factor),
        }
    }
}

/// Double-buffered ambient cube blended over a short window
///
/// Each new sample starts a window from the currently displayed cube to the
/// new one, so objects moving between probes never pop.
#[derive(Clone, Debug)]
pub struct AmbientState {
    from: AmbientCube,
    to: AmbientCube,
    start: Instant,
    window: Duration,
}

impl AmbientState {
    pub fn new(cube: AmbientCube, now: Instant) -> Self {
        Self {
            from: cube,
            to: cube,
            start: now,
            window: Duration::ZERO,
        }
    }

    /// Start blending toward `cube` over a random window of `min..=max`
    pub fn update(&mut self, cube: AmbientCube, now: Instant, min: Duration, max: Duration) {
        let window = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        self.update_with_window(cube, now, window);
    }

    /// Start blending toward `cube` over an explicit window
    pub fn update_with_window(&mut self, cube: AmbientCube, now: Instant, window: Duration) {
        self.from = self.sample(now);
        self.to = cube;
        self.start = now;
        self.window = window;
    }

    /// Blend factor in `[0, 1]` at `now`
    pub fn progress(&self, now: Instant) -> f32 {
        if self.window.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f32() / self.window.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// The cube to display at `now`
    pub fn sample(&self, now: Instant) -> AmbientCube {
        self.from.lerp(&self.to, self.progress(now))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Most recently requested cube
    pub fn target(&self) -> &AmbientCube {
        &self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_axis_aligned() {
        let mut sides = [Vec3::ZERO; 6];
        sides[2] = Vec3::ONE;
        let cube = AmbientCube::new(sides);
        assert_eq!(cube.sample(Vec3::Y), Vec3::ONE);
        assert_eq!(cube.sample(Vec3::NEG_Y), Vec3::ZERO);
    }

    #[test]
    fn test_blend_over_window() {
        let t0 = Instant::now();
        let mut state = AmbientState::new(AmbientCube::uniform(Vec3::ZERO), t0);
        state.update_with_window(
            AmbientCube::uniform(Vec3::ONE),
            t0,
            Duration::from_millis(100),
        );

        let mid = state.sample(t0 + Duration::from_millis(50));
        assert!(mid.sides[0].abs_diff_eq(Vec3::splat(0.5), 1e-3));
        let end = state.sample(t0 + Duration::from_millis(500));
        assert_eq!(end.sides[0], Vec3::ONE);
    }

    #[test]
    fn test_random_window_in_range() {
        let t0 = Instant::now();
        let mut state = AmbientState::new(AmbientCube::default(), t0);
        for _ in 0..32 {
            state.update(
                AmbientCube::default(),
                t0,
                Duration::from_millis(100),
                Duration::from_millis(200),
            );
            assert!(state.window() >= Duration::from_millis(100));
            assert!(state.window() <= Duration::from_millis(200));
        }
    }
}
