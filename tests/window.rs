use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rpod_analysis::impingement::{
    ConstraintWindowTracker, TimelineWindow, WindowArena, WindowError, WindowQuantity,
};

#[test]
fn window_keeps_both_firings_until_the_third_overflows_it() {
    let mut tracker = ConstraintWindowTracker::new(WindowQuantity::Pressure, 20.0, 1)
        .expect("tracker");

    assert_eq!(tracker.update(10.0, &[5.0]).expect("firing 1"), 0);
    assert_eq!(tracker.update(10.0, &[5.0]).expect("firing 2"), 0);
    assert_eq!(tracker.running_sums(), &[10.0]);
    assert_eq!(tracker.queue_len(), 2);

    assert_eq!(tracker.update(10.0, &[7.0]).expect("firing 3"), 1);
    assert_eq!(tracker.running_sums(), &[12.0]);
    assert_eq!(tracker.timeline().running_duration_s(), 20.0);
}

#[test]
fn fifteen_second_window_evicts_as_soon_as_total_exceeds_it() {
    let mut tracker = ConstraintWindowTracker::new(WindowQuantity::Pressure, 15.0, 1)
        .expect("tracker");

    tracker.update(10.0, &[5.0]).expect("firing 1");
    assert_eq!(tracker.update(10.0, &[5.0]).expect("firing 2"), 1);
    assert_eq!(tracker.running_sums(), &[5.0]);
    assert_eq!(tracker.update(10.0, &[7.0]).expect("firing 3"), 1);
    assert_eq!(tracker.running_sums(), &[7.0]);
    assert_eq!(tracker.queue_len(), 1);
}

#[test]
fn firing_longer_than_window_empties_every_queue() {
    let mut tracker = ConstraintWindowTracker::new(WindowQuantity::HeatFluxLoad, 5.0, 3)
        .expect("tracker");
    tracker.update(2.0, &[1.0, 2.0, 3.0]).expect("short firing");
    let evicted = tracker.update(6.0, &[4.0, 5.0, 6.0]).expect("long firing");

    assert_eq!(evicted, 2);
    assert_eq!(tracker.queue_len(), 0);
    assert!(tracker.timeline().is_empty());
    assert_eq!(tracker.running_sums(), &[0.0, 0.0, 0.0]);
    assert_eq!(tracker.timeline().running_duration_s(), 0.0);
}

#[test]
fn zero_contributions_still_occupy_a_slot() {
    let mut tracker = ConstraintWindowTracker::new(WindowQuantity::Pressure, 3.0, 2)
        .expect("tracker");
    tracker.update(1.0, &[4.0, 0.0]).expect("firing 1");
    tracker.update(1.0, &[0.0, 0.0]).expect("firing 2");
    tracker.update(1.0, &[0.0, 2.0]).expect("firing 3");
    assert_eq!(tracker.running_sums(), &[4.0, 2.0]);

    tracker.update(1.0, &[0.0, 0.0]).expect("firing 4");
    assert_eq!(tracker.running_sums(), &[0.0, 2.0]);
    let face_one: Vec<f64> = tracker.arena().face_values(1).collect();
    assert_eq!(face_one, vec![0.0, 2.0, 0.0]);
}

/// Oldest-first start index of the resident firings after firing `last`.
fn resident_start(durations: &[f64], last: usize, window_size: f64) -> usize {
    (0..=last + 1)
        .find(|&start| durations[start..=last].iter().sum::<f64>() <= window_size)
        .unwrap_or(last + 1)
}

#[test]
fn running_sums_match_brute_force_recomputation() {
    const FACES: usize = 7;
    const FIRINGS: usize = 300;
    const WINDOW: f64 = 25.0;

    let mut rng = StdRng::seed_from_u64(0x5eed_0001);
    let mut tracker = ConstraintWindowTracker::new(WindowQuantity::Pressure, WINDOW, FACES)
        .expect("tracker");
    let mut durations = Vec::with_capacity(FIRINGS);
    let mut rows: Vec<Vec<f64>> = Vec::with_capacity(FIRINGS);

    for firing in 0..FIRINGS {
        let duration = f64::from(rng.gen_range(0..=12_u32));
        let row: Vec<f64> = (0..FACES)
            .map(|_| {
                if rng.gen_bool(0.4) {
                    0.0
                } else {
                    f64::from(rng.gen_range(1..=50_u32))
                }
            })
            .collect();
        durations.push(duration);
        rows.push(row.clone());
        tracker.update(duration, &row).expect("update");

        let start = resident_start(&durations, firing, WINDOW);
        let resident = firing + 1 - start;
        assert_eq!(tracker.queue_len(), resident, "firing {firing}");
        assert_eq!(tracker.timeline().len(), resident, "firing {firing}");
        assert_eq!(
            tracker.timeline().running_duration_s(),
            durations[start..].iter().sum::<f64>(),
            "firing {firing}"
        );
        assert!(tracker.timeline().running_duration_s() <= WINDOW);

        for face in 0..FACES {
            let expected: Vec<f64> = rows[start..].iter().map(|r| r[face]).collect();
            let actual: Vec<f64> = tracker.arena().face_values(face).collect();
            assert_eq!(actual, expected, "face {face} after firing {firing}");
            assert_eq!(
                tracker.running_sums()[face],
                expected.iter().sum::<f64>(),
                "face {face} after firing {firing}"
            );
        }
    }
}

#[test]
fn arena_wraps_and_grows_without_reordering() {
    let mut arena = WindowArena::new(2, 2);
    arena.push_row(&[1.0, 10.0]).expect("row");
    arena.push_row(&[2.0, 20.0]).expect("row");
    arena.evict_oldest(1);
    arena.push_row(&[3.0, 30.0]).expect("row");
    assert_eq!(arena.capacity(), 2);

    // Full and wrapped: the next push doubles the capacity.
    arena.push_row(&[4.0, 40.0]).expect("row");
    assert_eq!(arena.capacity(), 4);
    assert_eq!(arena.face_values(0).collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    assert_eq!(arena.face_values(1).collect::<Vec<_>>(), vec![20.0, 30.0, 40.0]);
    assert_eq!(arena.running_sums(), &[9.0, 90.0]);
    assert_eq!(arena.rows(), vec![vec![2.0, 20.0], vec![3.0, 30.0], vec![4.0, 40.0]]);

    arena.evict_oldest(10);
    assert!(arena.is_empty());
    assert_eq!(arena.running_sums(), &[0.0, 0.0]);
}

#[test]
fn rejected_update_leaves_tracker_untouched() {
    let mut tracker = ConstraintWindowTracker::new(WindowQuantity::Pressure, 10.0, 2)
        .expect("tracker");
    tracker.update(4.0, &[1.0, 1.0]).expect("update");

    let err = tracker.update(4.0, &[1.0]).expect_err("short row");
    assert!(matches!(
        err,
        WindowError::ContributionLength {
            expected: 2,
            found: 1
        }
    ));
    let err = tracker.update(-1.0, &[1.0, 1.0]).expect_err("negative duration");
    assert!(matches!(err, WindowError::InvalidDuration(_)));

    assert_eq!(tracker.queue_len(), 1);
    assert_eq!(tracker.timeline().len(), 1);
    assert_eq!(tracker.running_sums(), &[1.0, 1.0]);
}

#[test]
fn window_size_must_be_positive() {
    assert!(matches!(
        TimelineWindow::new(0.0),
        Err(WindowError::InvalidWindowSize(_))
    ));
    assert!(ConstraintWindowTracker::new(WindowQuantity::HeatFluxLoad, f64::NAN, 1).is_err());
}

#[test]
fn restored_tracker_continues_identically() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut original = ConstraintWindowTracker::new(WindowQuantity::HeatFluxLoad, 9.5, 4)
        .expect("tracker");
    let mut draw = move || {
        let duration = rng.gen_range(0.0..4.0);
        let row: Vec<f64> = (0..4).map(|_| rng.gen_range(0.0..1.0e3)).collect();
        (duration, row)
    };

    for _ in 0..20 {
        let (duration, row) = draw();
        original.update(duration, &row).expect("update");
    }
    let json = serde_json::to_string(&original.state()).expect("encode");
    let mut resumed =
        ConstraintWindowTracker::from_state(serde_json::from_str(&json).expect("decode"), 4)
            .expect("restore");
    assert_eq!(resumed.running_sums(), original.running_sums());

    for _ in 0..20 {
        let (duration, row) = draw();
        let a = original.update(duration, &row).expect("original");
        let b = resumed.update(duration, &row).expect("resumed");
        assert_eq!(a, b);
        assert_eq!(resumed.running_sums(), original.running_sums());
        assert_eq!(resumed.state(), original.state());
    }
}
