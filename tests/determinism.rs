use glyphfield::frame_hash::hash_characters;
use glyphfield::pattern::{NoiseOptions, NoisePattern, PermutationTable, RainOptions, RainPattern};
use glyphfield::{compute_region, FontBook, PatternContext, RenderRegion, Spacing, SurfaceSize};
use proptest::prelude::*;

fn region(width: u32, height: u32) -> RenderRegion {
    compute_region(
        SurfaceSize::new(width, height),
        10.0,
        &FontBook::new().face("monospace"),
        &['.', '#'],
        Spacing::default(),
        0,
    )
}

fn animating(region: &RenderRegion, time_ms: f64, animation_time: f32) -> PatternContext<'_> {
    PatternContext {
        time: time_ms,
        delta_time: 1.0 / 30.0,
        animation_time,
        is_animating: true,
        ..PatternContext::still(region)
    }
}

#[test]
fn determinism_noise_with_same_seed_is_stable() {
    let region = region(240, 120);
    let options = NoiseOptions {
        seed: 42,
        ..NoiseOptions::default()
    };
    let first = NoisePattern::new(options.clone());
    let second = NoisePattern::new(options);

    for frame in 0..8 {
        let time = frame as f32 * 0.25;
        let ctx = animating(&region, f64::from(frame) * 250.0, time);
        assert_eq!(
            hash_characters(&first.generate(&ctx)),
            hash_characters(&second.generate(&ctx)),
            "noise frame {frame} should match across instances"
        );
    }
}

#[test]
fn determinism_noise_seeds_change_output() {
    let region = region(240, 120);
    let ctx = PatternContext::still(&region);
    let seeded = |seed| {
        NoisePattern::new(NoiseOptions {
            seed,
            frequency: 0.13,
            ..NoiseOptions::default()
        })
        .generate(&ctx)
    };
    assert_ne!(hash_characters(&seeded(1)), hash_characters(&seeded(2)));
}

#[test]
fn determinism_rain_replays_from_seed() {
    let region = region(300, 200);
    let run = || {
        let mut pattern = RainPattern::new(RainOptions {
            seed: 11,
            ..RainOptions::default()
        });
        pattern.initialize(&region);
        let mut hashes = Vec::new();
        for frame in 0..30 {
            let ctx = animating(&region, f64::from(frame) * 33.0, frame as f32 / 30.0);
            pattern.update(&ctx);
            hashes.push(hash_characters(&pattern.generate(&ctx)));
        }
        hashes
    };
    assert_eq!(run(), run());
}

#[test]
fn region_computation_is_idempotent() {
    let face = FontBook::new().face("X");
    let compute = || {
        compute_region(
            SurfaceSize::new(800, 600),
            16.0,
            &face,
            &['.', ':', '#'],
            Spacing::default(),
            0,
        )
    };
    let first = compute();
    assert_eq!(first, compute());
    assert_eq!(first.columns, 80);
    assert_eq!(first.rows, 31);
}

proptest! {
    #[test]
    fn fractal_noise_stays_in_unit_range(
        x in -500.0f32..500.0,
        y in -500.0f32..500.0,
        z in 0.0f32..100.0,
        frequency in 0.0f32..4.0,
        octaves in 0u32..8,
        persistence in 0.0f32..1.5,
        lacunarity in 0.0f32..4.0,
        seed in 0u64..1_000,
    ) {
        let value = PermutationTable::new(seed)
            .fractal(x, y, z, frequency, octaves, persistence, lacunarity);
        prop_assert!(value.is_finite());
        prop_assert!((-1.0..=1.0).contains(&value), "value {} out of range", value);
    }
}
