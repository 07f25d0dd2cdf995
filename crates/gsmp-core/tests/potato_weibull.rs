//! Weibull-timer potatoes: Taylor expansion, integration cutoff and results.
//!
//! Reference values solve the two-state race between an exponential exit at
//! rate r and a Weibull(s, k) timer: P(fire) = ∫ (k/s)(t/s)^(k-1)
//! e^(-(t/s)^k - rt) dt, and the mean time in the potato is
//! (1 - P(fire)) / r.

use gsmp_core::model::{Actmc, Event, EventDistribution};
use gsmp_core::potato::Potato;
use gsmp_core::Error;
use gsmp_math::to_f64;

fn race(scale: f64, shape: f64) -> Actmc {
    race_at(1.0, scale, shape)
}

fn race_at(exit_rate: f64, scale: f64, shape: f64) -> Actmc {
    let mut m = Actmc::new(3);
    m.add_rate(0, 1, exit_rate).unwrap();
    m.add_initial_state(0).unwrap();
    let mut e = Event::new("wear", EventDistribution::Weibull { scale, shape });
    e.add_to_probability(0, 2, 1.0);
    m.add_event(e).unwrap();
    m
}

fn check_race(scale: f64, shape: f64, fire: f64) {
    check_race_at(1.0, scale, shape, 1e-10, 1e-8, fire);
}

fn check_race_at(exit_rate: f64, scale: f64, shape: f64, kappa: f64, tolerance: f64, fire: f64) {
    let m = race_at(exit_rate, scale, shape);
    let mut potato = Potato::new(&m, m.event("wear").unwrap());
    potato.set_kappa(kappa).unwrap();

    let mass: f64 = potato.before_event_distribution(0).unwrap().values().map(to_f64).sum();
    assert!((mass - 1.0).abs() < tolerance, "s={scale} k={shape} r={exit_rate}: before-event mass {mass}");

    let dist = potato.mean_distribution(0).unwrap().clone();
    let fired = to_f64(&dist[&2]);
    let exited = to_f64(&dist[&1]);
    assert!(
        (fired - fire).abs() < tolerance,
        "s={scale} k={shape} r={exit_rate}: P(fire) {fired} vs {fire}"
    );
    assert!((exited - (1.0 - fire)).abs() < tolerance);

    let time = to_f64(&potato.mean_times(0).unwrap()[&0]);
    let expected = (1.0 - fire) / exit_rate;
    assert!((time - expected).abs() < tolerance, "mean time {time} vs {expected}");
}

#[test]
fn test_rayleigh_timer() {
    check_race(1.0, 2.0, 0.454_358_639_234_952_96);
}

#[test]
fn test_fractional_shape() {
    check_race(1.0, 1.5, 0.472_809_575_527_292);
}

#[test]
fn test_wider_scale() {
    check_race(2.0, 2.0, 0.242_127_843_858_688);
}

#[test]
fn test_shape_below_one() {
    check_race_at(1.0, 1.0, 0.8, 1e-6, 2e-6, 0.515_048_824_065_144_6);
}

#[test]
fn test_faster_chain() {
    check_race_at(3.0, 1.0, 2.0, 1e-8, 2e-8, 0.145_007_035_315_736);
}

#[test]
fn test_heavy_tail_out_of_reach_is_an_error() {
    // Weibull(1, 0.5) is still pending at t = 150 with probability above 1e-6
    let m = race(1.0, 0.5);
    let mut potato = Potato::new(&m, m.event("wear").unwrap());
    potato.set_kappa(1e-6).unwrap();

    let err = potato.mean_distribution(0).unwrap_err();
    assert!(matches!(err, Error::NumericalInstability(_)), "{err}");
    let err = potato.mean_times(0).unwrap_err();
    assert!(matches!(err, Error::NumericalInstability(_)), "{err}");
}

#[test]
fn test_precision_and_window() {
    let m = race(1.0, 2.0);
    let mut potato = Potato::new(&m, m.event("wear").unwrap());
    potato.set_kappa(1e-10).unwrap();

    assert_eq!(potato.precision().unwrap().required_digits(), 131);
    let (left, right) = potato.truncation_window().unwrap();
    assert_eq!(left, 0);
    assert!((80..=92).contains(&right), "right = {right}");
}

#[test]
fn test_integration_cutoff_is_sound() {
    let m = race(1.0, 2.0);
    let mut potato = Potato::new(&m, m.event("wear").unwrap());
    potato.set_kappa(1e-10).unwrap();

    let kernel = potato.weibull_kernel().unwrap().expect("weibull kernel");
    assert!(kernel.taylor_size() >= 94);
    let b = to_f64(kernel.ceiling());
    // the exact CDF barely moves between B and 2B
    let cdf = |t: f64| 1.0 - (-(t * t)).exp();
    assert!(cdf(2.0 * b) - cdf(b) < 1e-10, "cutoff {b}");
    assert!(b < 10.0, "cutoff {b}");
}

#[test]
fn test_results_are_cached() {
    let m = race(1.0, 2.0);
    let mut potato = Potato::new(&m, m.event("wear").unwrap());
    potato.set_kappa(1e-10).unwrap();

    let first = potato.mean_times_polynomials(0).unwrap().clone();
    let again = potato.mean_times_polynomials(0).unwrap().clone();
    assert_eq!(first, again);
}
