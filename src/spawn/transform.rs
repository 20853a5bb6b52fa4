//! Random placement of spawned items

use rand::Rng;

use crate::config::{ScaleMode, SpawnConfig, TransformSettings};

/// Sampled transform for one spawned item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Position in canvas pixels
    pub x: f32,
    pub y: f32,
    /// Drawn scale as a fraction (1.0 = 100 %) of the `scale_mode` reference
    pub scale_x: f32,
    pub scale_y: f32,
    /// Rotation in degrees; 0 when rotation is disabled
    pub rotation: f32,
    pub scale_mode: ScaleMode,
    pub canvas_width: u32,
}

impl Placement {
    /// Scale factors relative to the item's natural size.
    ///
    /// In canvas mode the drawn fraction is of the canvas width, so it is
    /// divided by the item's share of that width. Without a known native
    /// width the fraction is used as-is.
    pub fn item_scale(&self, native_width: Option<u32>) -> (f32, f32) {
        match (self.scale_mode, native_width) {
            (ScaleMode::Canvas, Some(width)) if width > 0 => {
                let ratio = self.canvas_width as f32 / width as f32;
                (self.scale_x * ratio, self.scale_y * ratio)
            }
            _ => (self.scale_x, self.scale_y),
        }
    }
}

/// Position rectangle a placement is drawn from, as `((x0, x1), (y0, y1))`.
///
/// Non-positive bounds fall back to the canvas edges; inverted pairs are
/// swapped.
pub fn position_bounds(
    canvas_width: u32,
    canvas_height: u32,
    transform: &TransformSettings,
) -> ((f32, f32), (f32, f32)) {
    let edge = |value: i32, fallback: f32| {
        if value > 0 {
            value as f32
        } else {
            fallback
        }
    };

    let x = ordered(
        edge(transform.min_x, 0.0),
        edge(transform.max_x, canvas_width as f32),
    );
    let y = ordered(
        edge(transform.min_y, 0.0),
        edge(transform.max_y, canvas_height as f32),
    );
    (x, y)
}

/// `(min, max)` with the pair swapped when given inverted
pub fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Draws placements from the configured ranges.
///
/// Every draw inside one `sample` call is independent: x, y, scale x,
/// scale y (unless aspect is preserved) and rotation.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransformSampler;

impl TransformSampler {
    pub fn new() -> Self {
        Self
    }

    /// Sample with the thread-local, OS-seeded generator
    pub fn sample(&self, canvas_width: u32, canvas_height: u32, config: &SpawnConfig) -> Placement {
        self.sample_with(&mut rand::thread_rng(), canvas_width, canvas_height, config)
    }

    pub fn sample_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        canvas_width: u32,
        canvas_height: u32,
        config: &SpawnConfig,
    ) -> Placement {
        let transform = &config.transform;

        let ((x0, x1), (y0, y1)) = position_bounds(canvas_width, canvas_height, transform);
        let x = rng.gen_range(x0..=x1);
        let y = rng.gen_range(y0..=y1);

        let (s0, s1) = ordered(transform.min_scale / 100.0, transform.max_scale / 100.0);
        let scale_x = rng.gen_range(s0..=s1);
        let scale_y = if transform.preserve_aspect {
            scale_x
        } else {
            rng.gen_range(s0..=s1)
        };

        let rotation = if transform.disable_rotation {
            0.0
        } else {
            let (r0, r1) = ordered(transform.min_rotation, transform.max_rotation);
            rng.gen_range(r0..=r1)
        };

        Placement {
            x,
            y,
            scale_x,
            scale_y,
            rotation,
            scale_mode: transform.scale_mode,
            canvas_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config_with(f: impl FnOnce(&mut TransformSettings)) -> SpawnConfig {
        let mut config = SpawnConfig::default();
        f(&mut config.transform);
        config
    }

    fn samples(config: &SpawnConfig, n: usize) -> Vec<Placement> {
        let mut rng = StdRng::seed_from_u64(7);
        let sampler = TransformSampler::new();
        (0..n)
            .map(|_| sampler.sample_with(&mut rng, 1920, 1080, config))
            .collect()
    }

    #[test]
    fn test_inverted_position_range_is_swapped() {
        let config = config_with(|t| {
            t.min_x = 500;
            t.max_x = 100;
        });

        let placements = samples(&config, 500);
        assert!(placements.iter().all(|p| (100.0..=500.0).contains(&p.x)));
        assert!(placements.iter().any(|p| p.x < 150.0));
        assert!(placements.iter().any(|p| p.x > 450.0));
        assert_eq!(
            position_bounds(1920, 1080, &config.transform).0,
            (100.0, 500.0)
        );
    }

    #[test]
    fn test_non_positive_bounds_fall_back_to_canvas() {
        let config = SpawnConfig::default();
        assert_eq!(
            position_bounds(1920, 1080, &config.transform),
            ((0.0, 1920.0), (0.0, 1080.0))
        );

        let config = config_with(|t| {
            t.min_y = 200;
            t.max_y = 0;
        });
        assert_eq!(
            position_bounds(1920, 1080, &config.transform).1,
            (200.0, 1080.0)
        );
    }

    #[test]
    fn test_preserve_aspect_uses_one_draw() {
        let config = SpawnConfig::default();
        for p in samples(&config, 200) {
            assert_eq!(p.scale_x, p.scale_y);
            assert!((0.5..=1.5).contains(&p.scale_x));
        }
    }

    #[test]
    fn test_independent_axes_without_aspect_lock() {
        let config = config_with(|t| t.preserve_aspect = false);
        let placements = samples(&config, 200);
        assert!(placements.iter().any(|p| p.scale_x != p.scale_y));
    }

    #[test]
    fn test_inverted_scale_and_rotation_ranges() {
        let config = config_with(|t| {
            t.min_scale = 200.0;
            t.max_scale = 100.0;
            t.min_rotation = 45.0;
            t.max_rotation = -45.0;
        });

        for p in samples(&config, 200) {
            assert!((1.0..=2.0).contains(&p.scale_x));
            assert!((-45.0..=45.0).contains(&p.rotation));
        }
    }

    #[test]
    fn test_disabled_rotation_is_zero() {
        let config = config_with(|t| t.disable_rotation = true);
        assert!(samples(&config, 100).iter().all(|p| p.rotation == 0.0));
    }

    #[test]
    fn test_degenerate_ranges() {
        let config = config_with(|t| {
            t.min_x = 300;
            t.max_x = 300;
            t.min_scale = 100.0;
            t.max_scale = 100.0;
            t.min_rotation = 90.0;
            t.max_rotation = 90.0;
        });

        let p = samples(&config, 1)[0];
        assert_eq!(p.x, 300.0);
        assert_eq!(p.scale_x, 1.0);
        assert_eq!(p.rotation, 90.0);

        let mut rng = StdRng::seed_from_u64(1);
        let empty_canvas =
            TransformSampler::new().sample_with(&mut rng, 0, 0, &SpawnConfig::default());
        assert_eq!((empty_canvas.x, empty_canvas.y), (0.0, 0.0));
    }

    #[test]
    fn test_item_scale_modes() {
        let native = Placement {
            x: 0.0,
            y: 0.0,
            scale_x: 0.5,
            scale_y: 0.5,
            rotation: 0.0,
            scale_mode: ScaleMode::Native,
            canvas_width: 1920,
        };
        assert_eq!(native.item_scale(Some(640)), (0.5, 0.5));

        let canvas = Placement {
            scale_mode: ScaleMode::Canvas,
            ..native
        };
        // Half the canvas width is 960 px, 1.5x a 640 px wide clip.
        assert_eq!(canvas.item_scale(Some(640)), (1.5, 1.5));
        assert_eq!(canvas.item_scale(None), (0.5, 0.5));
        assert_eq!(canvas.item_scale(Some(0)), (0.5, 0.5));
    }
}
