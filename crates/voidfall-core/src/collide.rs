//! Analytic collision-time solver.
//!
//! Given two bodies moving linearly within a sub-step, finds the earliest
//! time at which their separation equals a target radius by solving the
//! quadratic in `t` arising from `|Δp + t·Δv|² = r²`.
//!
//! The solver is exact about its degenerate cases rather than relying on
//! the quadratic formula's behavior at `a = 0`:
//!
//! - zero relative velocity, already within `r` → time `0`
//! - zero relative velocity, separated → no event
//! - negative discriminant → the trajectories never reach separation `r`
//! - double root → that time
//! - two roots → the smaller non-negative one; when both sit just below
//!   zero from rounding, the larger (closer to zero) is returned and the
//!   caller's `[0, 1]` range check rejects genuinely-past events
//!
//! Returned times are raw; rounding to the shared event-time precision
//! happens when an event is constructed (see [`crate::event::EventTime`]).

use glam::DVec2;

/// Earliest non-negative time at which two linearly moving points reach
/// separation `r`, if their trajectories ever do.
///
/// The returned value may lie outside `[0, 1]`; callers restrict to the
/// sub-step themselves so that already-in-range cases (which solve to a
/// negative entry time) can be distinguished from misses.
#[must_use]
pub fn collision_time(r: f64, pos1: DVec2, pos2: DVec2, vel1: DVec2, vel2: DVec2) -> Option<f64> {
    let dp = pos1 - pos2;
    let dv = vel1 - vel2;

    let a = dv.length_squared();
    let b = 2.0 * dp.dot(dv);
    let c = dp.length_squared() - r * r;

    if a == 0.0 {
        if b == 0.0 {
            if c <= 0.0 {
                // Already within r of each other, and staying there.
                return Some(0.0);
            }
            return None;
        }
        let t = -c / b;
        return (t >= 0.0).then_some(t);
    }

    let disc = b * b - 4.0 * a * c;
    if disc == 0.0 {
        // Grazing contact.
        return Some(-b / (2.0 * a));
    }
    if disc > 0.0 {
        let t1 = -b + disc.sqrt();
        let t2 = -b - disc.sqrt();

        if t1 >= 0.0 && t2 >= 0.0 {
            return Some(t1.min(t2) / (2.0 * a));
        }
        return Some(t1.max(t2) / (2.0 * a));
    }
    None
}
