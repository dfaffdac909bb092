//! End to end simulation scenarios running the whole pipeline.

use mortar::{
    body::{Body, BodyKey, BodyOptions},
    constraint::ConstraintOptions,
    engine::{Engine, EngineSettings},
    world::Gravity,
};
use vek::Vec2;

/// Fixed timestep in milliseconds, the usual 60 Hz frame.
const DT: f64 = 16.666;

/// Rectangle body centred at a position.
fn rectangle(x: f64, y: f64, width: f64, height: f64, options: BodyOptions) -> Body {
    let (w, h) = (width / 2.0, height / 2.0);
    Body::from_vertices(
        Vec2::new(x, y),
        &[
            Vec2::new(-w, -h),
            Vec2::new(w, -h),
            Vec2::new(w, h),
            Vec2::new(-w, h),
        ],
        options,
    )
    .unwrap()
}

fn static_options() -> BodyOptions {
    BodyOptions {
        is_static: true,
        ..BodyOptions::default()
    }
}

/// A 40x40 box dropped on a static ground comes to rest on its surface.
#[test]
fn falling_box_rests_on_ground() {
    let mut engine = Engine::new(EngineSettings::default());
    engine
        .world_mut()
        .add_body(rectangle(400.0, 600.0, 800.0, 50.0, static_options()));
    let box_key = engine
        .world_mut()
        .add_body(rectangle(400.0, 200.0, 40.0, 40.0, BodyOptions::default()));
    engine.world_mut().body_mut(box_key).unwrap().set_mass(1.0);

    let mut last_positions = Vec::new();
    for step in 0..600 {
        engine.update(DT, 1.0);
        if step >= 500 {
            last_positions.push(engine.world().body(box_key).unwrap().position().y);
        }
    }

    let body = engine.world().body(box_key).unwrap();

    // Resting on top of the ground: 600 - 25 (ground half) - 20 (box half),
    // allowing the slop penetration
    let expected = 600.0 - 25.0 - 20.0;
    assert!(
        (body.position().y - expected).abs() < 1.5,
        "box should rest on the ground surface, got y = {}",
        body.position().y
    );
    assert!(
        body.velocity().magnitude() < 0.5,
        "box should be nearly at rest, got |v| = {}",
        body.velocity().magnitude()
    );

    // The last hundred steps shouldn't move the box
    let min = last_positions.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = last_positions
        .iter()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(
        max - min < 0.1,
        "resting box drifted {} over the last steps",
        max - min
    );
}

/// A column of ten boxes stays upright without drifting sideways.
#[test]
fn stack_stays_within_horizontal_drift() {
    let mut engine = Engine::new(EngineSettings::default());
    engine
        .world_mut()
        .add_body(rectangle(400.0, 545.0, 800.0, 50.0, static_options()));

    let mut boxes: Vec<BodyKey> = Vec::new();
    for level in 0..10 {
        let y = 500.0 - 40.0 * level as f64;
        boxes.push(
            engine
                .world_mut()
                .add_body(rectangle(400.0, y, 40.0, 40.0, BodyOptions::default())),
        );
    }

    for _ in 0..1200 {
        engine.update(DT, 1.0);
    }

    for &key in boxes.iter() {
        let x = engine.world().body(key).unwrap().position().x;
        assert!(
            (x - 400.0).abs() <= 2.0,
            "stacked box drifted to x = {x}"
        );
    }
}

/// A box on a stiff constraint swings under gravity without escaping.
#[test]
fn pendulum_stays_within_reach() {
    let mut engine = Engine::new(EngineSettings::default());
    let bob = engine
        .world_mut()
        .add_body(rectangle(200.0, 300.0, 20.0, 20.0, BodyOptions::default()));
    engine.world_mut().add_constraint(ConstraintOptions {
        body_b: Some(bob),
        point_a: Vec2::new(200.0, 100.0),
        length: Some(200.0),
        stiffness: Some(0.9),
        ..ConstraintOptions::default()
    });

    // Start it swinging sideways
    engine
        .world_mut()
        .body_mut(bob)
        .unwrap()
        .set_velocity(Vec2::new(3.0, 0.0));

    for _ in 0..400 {
        engine.update(DT, 1.0);

        let position = engine.world().body(bob).unwrap().position();
        assert!(
            (position.x - 200.0).abs() <= 200.0,
            "pendulum swung out of reach to x = {}",
            position.x
        );
        assert!(position.y.is_finite() && position.y <= 400.0);
    }
}

/// Start, active and end events fire once each over a touch and separation,
/// and the idle pair is evicted a second later.
#[test]
fn pair_lifecycle_events() {
    let mut engine = Engine::new(EngineSettings::default());
    engine.world_mut().set_gravity(Gravity {
        x: 0.0,
        y: 0.0,
        scale: 0.0,
    });

    engine
        .world_mut()
        .add_body(rectangle(60.0, 0.0, 20.0, 20.0, static_options()));
    let moving = engine.world_mut().add_body(rectangle(
        0.0,
        0.0,
        20.0,
        20.0,
        BodyOptions {
            friction_air: 0.0,
            ..BodyOptions::default()
        },
    ));
    engine
        .world_mut()
        .body_mut(moving)
        .unwrap()
        .set_velocity(Vec2::new(1.0, 0.0));

    let mut starts = 0;
    let mut actives = 0;
    let mut ends = 0;
    let count_events = |engine: &Engine, starts: &mut usize, actives: &mut usize, ends: &mut usize| {
        *starts += engine.pairs().collision_start().len();
        *actives += engine.pairs().collision_active().len();
        *ends += engine.pairs().collision_end().len();
    };

    // Approach and rest against the static box for a while
    for _ in 0..120 {
        engine.update(DT, 1.0);
        count_events(&engine, &mut starts, &mut actives, &mut ends);
    }
    assert_eq!(starts, 1, "collision should start exactly once");
    assert!(actives >= 1, "collision should be active while touching");
    assert_eq!(ends, 0, "collision should not end while touching");

    // Pull the box away again
    engine
        .world_mut()
        .body_mut(moving)
        .unwrap()
        .set_velocity(Vec2::new(-2.0, 0.0));
    for _ in 0..30 {
        engine.update(DT, 1.0);
        count_events(&engine, &mut starts, &mut actives, &mut ends);
    }

    assert_eq!(starts, 1, "collision should not restart");
    assert_eq!(ends, 1, "collision should end exactly once");
    assert_eq!(engine.pairs().len(), 1, "pair lingers in the cache");

    // Idle pairs are evicted after a second of simulation time
    for _ in 0..80 {
        engine.update(DT, 1.0);
    }
    assert!(engine.pairs().is_empty(), "idle pair should be evicted");
}

/// A resting box falls asleep and an applied force wakes it again.
#[test]
fn sleeping_and_waking() {
    let mut engine = Engine::new(EngineSettings {
        enable_sleeping: true,
        ..EngineSettings::default()
    });
    engine
        .world_mut()
        .add_body(rectangle(400.0, 545.0, 800.0, 50.0, static_options()));
    let box_key = engine
        .world_mut()
        .add_body(rectangle(400.0, 480.0, 40.0, 40.0, BodyOptions::default()));

    let mut asleep_at = None;
    for step in 0..600 {
        engine.update(DT, 1.0);
        if engine.world().body(box_key).unwrap().is_sleeping() {
            asleep_at = Some(step);
            break;
        }
    }
    assert!(
        asleep_at.is_some(),
        "box should fall asleep once it stops moving"
    );

    // Poking it wakes it the same step
    let body = engine.world_mut().body_mut(box_key).unwrap();
    let position = body.position();
    body.apply_force(position, Vec2::new(0.0, -0.05));
    engine.update(DT, 1.0);

    assert!(!engine.world().body(box_key).unwrap().is_sleeping());
}

/// Two identically set up engines stay bitwise identical step for step.
#[test]
fn deterministic_replay() {
    let build = || {
        let mut engine = Engine::new(EngineSettings::default());
        engine
            .world_mut()
            .add_body(rectangle(400.0, 600.0, 800.0, 50.0, static_options()));
        let falling = engine
            .world_mut()
            .add_body(rectangle(390.0, 100.0, 40.0, 40.0, BodyOptions::default()));
        let other = engine.world_mut().add_body(rectangle(
            420.0,
            300.0,
            30.0,
            30.0,
            BodyOptions::default(),
        ));
        (engine, falling, other)
    };

    let (mut engine_a, falling_a, other_a) = build();
    let (mut engine_b, falling_b, other_b) = build();

    for _ in 0..400 {
        engine_a.update(DT, 1.0);
        engine_b.update(DT, 1.0);

        for (&key_a, &key_b) in [falling_a, other_a].iter().zip([falling_b, other_b].iter()) {
            let position_a = engine_a.world().body(key_a).unwrap().position();
            let position_b = engine_b.world().body(key_b).unwrap().position();
            assert_eq!(position_a, position_b, "replay diverged");
        }
    }
}

/// Head-on elastic collision between two equal bodies preserves kinetic
/// energy.
///
/// A single-contact impact: one body is rotated into a diamond so its corner
/// meets the other's face, and rotation is locked with an infinite inertia.
#[test]
fn elastic_collision_preserves_energy() {
    let mut engine = Engine::new(EngineSettings {
        velocity_iterations: 8,
        ..EngineSettings::default()
    });
    engine.world_mut().set_gravity(Gravity {
        x: 0.0,
        y: 0.0,
        scale: 0.0,
    });

    let bouncy = BodyOptions {
        restitution: 1.0,
        friction: 0.0,
        friction_static: 0.0,
        friction_air: 0.0,
        ..BodyOptions::default()
    };
    let left = engine
        .world_mut()
        .add_body(rectangle(0.0, 0.0, 20.0, 20.0, bouncy.clone()));
    let right = engine.world_mut().add_body(rectangle(
        60.0,
        0.0,
        20.0,
        20.0,
        BodyOptions {
            angle: std::f64::consts::FRAC_PI_4,
            ..bouncy
        },
    ));

    for &key in [left, right].iter() {
        let body = engine.world_mut().body_mut(key).unwrap();
        body.set_inertia(f64::INFINITY);
    }
    engine
        .world_mut()
        .body_mut(left)
        .unwrap()
        .set_velocity(Vec2::new(2.0, 0.0));
    engine
        .world_mut()
        .body_mut(right)
        .unwrap()
        .set_velocity(Vec2::new(-2.0, 0.0));

    let kinetic_energy = |engine: &Engine, keys: [BodyKey; 2]| {
        keys.iter()
            .map(|&key| {
                let body = engine.world().body(key).unwrap();
                0.5 * body.mass() * body.velocity().magnitude_squared()
            })
            .sum::<f64>()
    };

    let before = kinetic_energy(&engine, [left, right]);
    for _ in 0..40 {
        engine.update(DT, 1.0);
    }
    let after = kinetic_energy(&engine, [left, right]);

    assert!(
        (after - before).abs() / before < 0.02,
        "kinetic energy drifted from {before} to {after}"
    );

    // Both bodies keep their speed, only the direction changed
    for &key in [left, right].iter() {
        let speed = engine.world().body(key).unwrap().velocity().magnitude();
        assert!(
            (speed - 2.0).abs() < 0.1,
            "body should keep its speed, got {speed}"
        );
    }
}

/// A zero mass dynamic body in contact with a static one is clamped by the
/// solvers instead of corrupting the simulation with NaN.
#[test]
fn zero_mass_body_stays_finite() {
    let mut engine = Engine::new(EngineSettings::default());
    engine
        .world_mut()
        .add_body(rectangle(400.0, 545.0, 800.0, 50.0, static_options()));
    let key = engine
        .world_mut()
        .add_body(rectangle(400.0, 490.0, 40.0, 40.0, BodyOptions::default()));

    let body = engine.world_mut().body_mut(key).unwrap();
    body.set_mass(0.0);
    body.set_velocity(Vec2::new(0.0, 2.0));

    for _ in 0..120 {
        engine.update(DT, 1.0);
    }

    let body = engine.world().body(key).unwrap();
    let position = body.position();
    assert!(
        position.x.is_finite() && position.y.is_finite(),
        "zero mass body corrupted the simulation: {position:?}"
    );
    assert!(body.velocity().x.is_finite() && body.velocity().y.is_finite());
}

/// Zero gravity leaves a free body exactly at rest.
#[test]
fn zero_gravity_keeps_rest() {
    let mut engine = Engine::new(EngineSettings::default());
    engine.world_mut().set_gravity(Gravity {
        x: 0.0,
        y: 0.0,
        scale: 0.001,
    });
    let key = engine
        .world_mut()
        .add_body(rectangle(0.0, 0.0, 20.0, 20.0, BodyOptions::default()));

    for _ in 0..60 {
        engine.update(DT, 1.0);
    }

    let body = engine.world().body(key).unwrap();
    assert!(body.velocity().magnitude() < 1e-10);
    assert_eq!(body.position(), Vec2::zero());
}

/// A zero time scale freezes the simulation clock and the bodies.
#[test]
fn zero_time_scale_freezes() {
    let mut engine = Engine::new(EngineSettings {
        time_scale: 0.0,
        ..EngineSettings::default()
    });
    let key = engine
        .world_mut()
        .add_body(rectangle(0.0, 100.0, 20.0, 20.0, BodyOptions::default()));

    for _ in 0..10 {
        engine.update(DT, 1.0);
    }

    assert_eq!(engine.timing().timestamp, 0.0);
    assert_eq!(
        engine.world().body(key).unwrap().position(),
        Vec2::new(0.0, 100.0)
    );
    assert!(engine.pairs().is_empty());
}
