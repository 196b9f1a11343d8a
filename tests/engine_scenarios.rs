use std::collections::HashSet;

use assert_matches::assert_matches;
use rand::{rngs::StdRng, SeedableRng};
use reflex::{
    Engine, ManualClock, ManualTimer, Phase, ResponseOutcome, SessionKind, TimerKind,
    TimerOutcome, TrialState,
};

type TestEngine = Engine<ManualClock, ManualTimer>;

fn engine(seed: u64) -> (TestEngine, ManualClock, ManualTimer) {
    let clock = ManualClock::new();
    let timer = ManualTimer::new(clock.clone());
    let engine = Engine::with_rng(clock.clone(), timer.clone(), StdRng::seed_from_u64(seed));
    (engine, clock, timer)
}

fn running(kind: SessionKind, seed: u64) -> (TestEngine, ManualClock, ManualTimer) {
    let (mut engine, clock, timer) = engine(seed);
    engine.start_session(kind).unwrap();
    engine.begin_running().unwrap();
    (engine, clock, timer)
}

/// Fire timers until the stimulus for the current trial is visible
fn show_stimulus(engine: &mut TestEngine, timer: &ManualTimer) -> usize {
    for _ in 0..10 {
        let token = timer.fire_next().expect("a timer should be pending");
        if let TimerOutcome::StimulusShown { trial_index } = engine.on_timer(token) {
            return trial_index;
        }
    }
    panic!("stimulus never shown");
}

#[test]
fn warmup_session_averages_latencies() {
    let (mut engine, clock, timer) = running(SessionKind::Warmup, 1);
    let latencies = [250.0, 300.0, 280.0, 310.0, 270.0];

    let mut outcome = ResponseOutcome::Ignored;
    for latency in latencies {
        show_stimulus(&mut engine, &timer);
        clock.advance(latency);
        outcome = engine.respond_now();
    }

    let result = assert_matches!(outcome, ResponseOutcome::Completed(result) => result);
    assert_eq!(result.kind(), SessionKind::Warmup);
    assert_eq!(result.trials(), 5);
    assert!((result.average_time() - 282.0).abs() < 1e-9);
    assert!((result.best_time() - 250.0).abs() < 1e-6);
    assert!((result.worst_time() - 310.0).abs() < 1e-6);

    assert_eq!(engine.phase(), Phase::Results);
    assert_eq!(engine.result(), Some(&result));
    assert!(timer.pending().is_empty());
}

#[test]
fn full_session_with_early_click_still_records_twenty() {
    let (mut engine, clock, timer) = running(SessionKind::Full, 2);

    // Jump the gun on trial 3
    for _ in 0..2 {
        show_stimulus(&mut engine, &timer);
        clock.advance(300.0);
        engine.respond_now();
    }
    let armed = timer.fire_next().unwrap();
    assert_matches!(
        engine.on_timer(armed),
        TimerOutcome::TrialArmed { trial_index: 2 }
    );
    assert_matches!(
        engine.respond_now(),
        ResponseOutcome::EarlyClick { trial_index: 2 }
    );
    assert!(engine.early_click());
    assert_eq!(engine.session().reaction_times().len(), 2);

    let mut last = ResponseOutcome::Ignored;
    while engine.phase() == Phase::Running {
        show_stimulus(&mut engine, &timer);
        clock.advance(320.0);
        last = engine.respond_now();
    }

    let result = assert_matches!(last, ResponseOutcome::Completed(result) => result);
    assert_eq!(result.trials(), 20);
    assert!(result.reaction_times().iter().all(|rt| *rt >= 0.0));
}

#[test]
fn rapid_double_response_records_once() {
    let (mut engine, clock, timer) = running(SessionKind::Full, 3);
    show_stimulus(&mut engine, &timer);
    clock.advance(275.0);

    assert_matches!(
        engine.respond_now(),
        ResponseOutcome::Recorded { trial_index: 0, .. }
    );
    clock.advance(5.0);
    assert_matches!(engine.respond_now(), ResponseOutcome::Ignored);

    let times = engine.session().reaction_times();
    assert_eq!(times.len(), 1);
    assert!((times[0] - 275.0).abs() < 1e-6);
    assert_eq!(engine.current_trial_index(), 1);
    assert!(!engine.early_click());
}

#[test]
fn reset_mid_trial_drops_pending_onset() {
    let (mut engine, _clock, timer) = running(SessionKind::Full, 4);
    let pending = engine.live_timer().unwrap();
    assert_eq!(pending.kind, TimerKind::StimulusOnset);

    engine.reset();

    assert!(timer.pending().is_empty());
    assert_eq!(engine.on_timer(pending), TimerOutcome::Stale);
    assert_eq!(engine.phase(), Phase::Setup);
    assert!(!engine.stimulus_visible());
}

#[test]
fn reset_then_restart_leaves_no_state_behind() {
    let (mut engine, clock, timer) = running(SessionKind::Full, 5);
    show_stimulus(&mut engine, &timer);
    clock.advance(200.0);
    engine.respond_now();
    let stale = timer.pending()[0];

    engine.reset();
    engine.start_session(SessionKind::Warmup).unwrap();
    engine.begin_running().unwrap();

    assert_eq!(engine.current_trial_index(), 0);
    assert!(engine.session().reaction_times().is_empty());
    assert_eq!(engine.total_trials(), 5);
    assert_eq!(engine.on_timer(stale), TimerOutcome::Stale);
    assert_eq!(engine.trial_state(), TrialState::Armed);
}

#[test]
fn onset_delays_stay_in_window_and_vary() {
    let (mut engine, clock, timer) = running(SessionKind::Full, 6);
    while engine.phase() == Phase::Running {
        show_stimulus(&mut engine, &timer);
        clock.advance(250.0);
        engine.respond_now();
    }

    let delays: Vec<f64> = timer
        .history()
        .into_iter()
        .filter(|(token, _)| token.kind == TimerKind::StimulusOnset)
        .map(|(_, delay)| delay.as_secs_f64() * 1000.0)
        .collect();

    assert_eq!(delays.len(), 20);
    assert!(delays.iter().all(|d| (1000.0..4000.0).contains(d)));
    let distinct: HashSet<u64> = delays.iter().map(|d| d.to_bits()).collect();
    assert!(distinct.len() > 1);
}

#[test]
fn each_trial_produces_exactly_one_latency() {
    let (mut engine, clock, timer) = running(SessionKind::Warmup, 7);
    let mut recorded = Vec::new();

    while engine.phase() == Phase::Running {
        let index = show_stimulus(&mut engine, &timer);
        clock.advance(290.0);
        match engine.respond_now() {
            ResponseOutcome::Recorded { trial_index, .. } => recorded.push(trial_index),
            ResponseOutcome::Completed(_) => recorded.push(index),
            other => panic!("unexpected {other:?}"),
        }
        // extra responses during the pause do nothing
        assert_matches!(engine.respond_now(), ResponseOutcome::Ignored);
    }

    assert_eq!(recorded, vec![0, 1, 2, 3, 4]);
}

#[test]
fn next_session_after_results_starts_clean() {
    let (mut engine, clock, timer) = running(SessionKind::Warmup, 8);
    while engine.phase() == Phase::Running {
        show_stimulus(&mut engine, &timer);
        clock.advance(260.0);
        engine.respond_now();
    }
    assert!(engine.result().is_some());

    engine.reset();
    assert!(engine.result().is_none());
    engine.start_session(SessionKind::Full).unwrap();
    assert_eq!(engine.total_trials(), 20);
    assert_eq!(engine.current_trial_index(), 0);
}

#[test]
fn early_click_during_warning_restarts_the_window() {
    let (mut engine, clock, timer) = running(SessionKind::Full, 9);

    assert_matches!(
        engine.respond_now(),
        ResponseOutcome::EarlyClick { trial_index: 0 }
    );
    assert_eq!(engine.trial_state(), TrialState::EarlyWarning);
    let first_warning = engine.live_timer().unwrap();
    assert_eq!(first_warning.kind, TimerKind::EarlyWarning);

    clock.advance(500.0);
    assert_matches!(
        engine.respond_now(),
        ResponseOutcome::EarlyClick { trial_index: 0 }
    );

    assert_eq!(engine.on_timer(first_warning), TimerOutcome::Stale);
    let pending = timer.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, TimerKind::EarlyWarning);
    assert_ne!(pending[0], first_warning);
    assert_eq!(engine.current_trial_index(), 0);
    assert!(engine.session().reaction_times().is_empty());
    assert!(engine.early_click());

    // the full window runs again from the second click
    let (_, delay) = *timer.history().last().unwrap();
    assert_eq!(delay, std::time::Duration::from_millis(1500));

    let second_warning = timer.fire_next().unwrap();
    assert_matches!(
        engine.on_timer(second_warning),
        TimerOutcome::TrialArmed { trial_index: 0 }
    );
    let pending = timer.pending();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, TimerKind::StimulusOnset);
    assert_eq!(engine.trial_state(), TrialState::Armed);
    assert_eq!(engine.current_trial_index(), 0);
    assert!(!engine.early_click());
}

#[test]
fn latencies_track_trial_index_through_early_and_discarded_responses() {
    let (mut engine, clock, timer) = running(SessionKind::Warmup, 10);
    let in_step = |engine: &TestEngine| {
        assert_eq!(
            engine.session().reaction_times().len(),
            engine.current_trial_index()
        );
    };

    let mut discarded = 0;
    while engine.phase() == Phase::Running {
        let index = engine.current_trial_index();

        assert_matches!(engine.respond_now(), ResponseOutcome::EarlyClick { .. });
        in_step(&engine);
        // warning fires and re-arms the same trial
        let warning = timer.fire_next().unwrap();
        assert_matches!(engine.on_timer(warning), TimerOutcome::TrialArmed { .. });
        in_step(&engine);

        assert_eq!(show_stimulus(&mut engine, &timer), index);
        in_step(&engine);

        // a response stamped before onset is thrown away
        let onset = engine.session().stimulus_onset().unwrap();
        assert_eq!(
            engine.on_response(onset - 1.0),
            ResponseOutcome::Discarded { trial_index: index }
        );
        discarded += 1;
        in_step(&engine);
        assert_eq!(engine.current_trial_index(), index);

        assert_eq!(show_stimulus(&mut engine, &timer), index);
        clock.advance(330.0);
        let outcome = engine.respond_now();
        if engine.phase() == Phase::Running {
            assert_matches!(outcome, ResponseOutcome::Recorded { .. });
            in_step(&engine);
            let pause = timer.fire_next().unwrap();
            engine.on_timer(pause);
            in_step(&engine);
        } else {
            assert_matches!(outcome, ResponseOutcome::Completed(_));
        }
    }

    assert_eq!(discarded, 5);
    let result = engine.result().unwrap();
    assert_eq!(result.trials(), 5);
    assert!(result.reaction_times().iter().all(|rt| (rt - 330.0).abs() < 1e-6));
}
