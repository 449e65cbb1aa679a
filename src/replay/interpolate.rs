//! Dead-reckoning between position frames

use std::collections::BTreeMap;

use super::normalize::{Frame, ParticipantRecord};
use super::Position;

/// Maximum plausible movement speed, in map units per second
pub const DEFAULT_SPEED_CAP: f64 = 1800.0;

/// Find the frames bracketing `t`
///
/// Before the first frame both ends are the first frame, after the last
/// both are the last, and an exact hit returns that frame twice.
pub fn neighbor_frames(frames: &[Frame], t: i64) -> Option<(&Frame, &Frame)> {
    let first = frames.first()?;
    let last = frames.last()?;

    if t <= first.t {
        return Some((first, first));
    }
    if t >= last.t {
        return Some((last, last));
    }

    // Index of the first frame with timestamp >= t; 1..len here
    let idx = frames.partition_point(|f| f.t < t);
    let next = &frames[idx];
    if next.t == t {
        return Some((next, next));
    }
    Some((&frames[idx - 1], next))
}

/// Estimate a position at `t` from two anchors, capped by `speed_cap`
pub fn predict_position(
    prev: Option<Position>,
    next: Option<Position>,
    prev_t: i64,
    next_t: i64,
    t: i64,
    speed_cap: f64,
) -> Option<Position> {
    let (prev, next) = match (prev, next) {
        (None, None) => return None,
        (Some(p), None) => return Some(p),
        (None, Some(n)) => return Some(n),
        (Some(p), Some(n)) => (p, n),
    };

    // No time has passed since the earlier anchor
    let elapsed = t.saturating_sub(prev_t).max(0);
    if elapsed == 0 {
        return Some(prev);
    }

    let span = next_t.saturating_sub(prev_t).max(1) as f64;
    let alpha = (elapsed as f64 / span).clamp(0.0, 1.0);
    let x = lerp(prev.x, next.x, alpha);
    let y = lerp(prev.y, next.y, alpha);

    let dist = prev.distance(&Position::new(x, y));
    let max_dist = speed_cap.max(0.0) * elapsed as f64 / 1000.0;

    if dist <= max_dist {
        return Some(Position::new(x, y));
    }
    if max_dist <= 0.0 {
        return Some(prev);
    }

    let scale = max_dist / dist;
    Some(Position::new(prev.x + (x - prev.x) * scale, prev.y + (y - prev.y) * scale))
}

/// Position of one participant at `t`
pub fn position_at(frames: &[Frame], participant_id: i64, t: i64, speed_cap: f64) -> Option<Position> {
    let (prev, next) = neighbor_frames(frames, t)?;
    predict_position(
        prev.position_of(participant_id),
        next.position_of(participant_id),
        prev.t,
        next.t,
        t,
        speed_cap,
    )
}

/// Positions of every participant at `t`; untracked participants are omitted
pub fn positions_at(
    frames: &[Frame],
    participants: &[ParticipantRecord],
    t: i64,
    speed_cap: f64,
) -> BTreeMap<i64, Position> {
    participants
        .iter()
        .filter_map(|p| position_at(frames, p.id, t, speed_cap).map(|pos| (p.id, pos)))
        .collect()
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::TeamId;
    use proptest::prelude::*;

    fn frame(t: i64, entries: &[(i64, Option<(f64, f64)>)]) -> Frame {
        Frame {
            t,
            positions: entries
                .iter()
                .map(|(id, pos)| (*id, pos.map(|(x, y)| Position::new(x, y))))
                .collect(),
        }
    }

    fn participant(id: i64) -> ParticipantRecord {
        ParticipantRecord {
            id,
            display_name: format!("p{}", id),
            champion_name: "Ahri".to_string(),
            team_id: TeamId::Blue,
            kills: 0,
            deaths: 0,
            assists: 0,
        }
    }

    #[test]
    fn neighbors_at_edges_and_exact() {
        let frames = vec![frame(0, &[]), frame(60_000, &[]), frame(120_000, &[])];

        let (p, n) = neighbor_frames(&frames, -5).unwrap();
        assert_eq!((p.t, n.t), (0, 0));

        let (p, n) = neighbor_frames(&frames, 500_000).unwrap();
        assert_eq!((p.t, n.t), (120_000, 120_000));

        let (p, n) = neighbor_frames(&frames, 60_000).unwrap();
        assert_eq!((p.t, n.t), (60_000, 60_000));

        let (p, n) = neighbor_frames(&frames, 61_000).unwrap();
        assert_eq!((p.t, n.t), (60_000, 120_000));

        let (p, n) = neighbor_frames(&frames, 1).unwrap();
        assert_eq!((p.t, n.t), (0, 60_000));
    }

    #[test]
    fn neighbors_of_empty() {
        assert!(neighbor_frames(&[], 10).is_none());
    }

    #[test]
    fn one_sided_anchor_is_returned_unchanged() {
        let a = Position::new(3.0, 4.0);
        assert_eq!(predict_position(Some(a), None, 0, 1000, 500, 10.0), Some(a));
        assert_eq!(predict_position(None, Some(a), 0, 1000, 500, 10.0), Some(a));
        assert_eq!(predict_position(None, None, 0, 1000, 500, 10.0), None);
    }

    #[test]
    fn midpoint_with_infinite_cap() {
        let frames = vec![
            frame(0, &[(5, Some((0.0, 0.0)))]),
            frame(60_000, &[(5, Some((100.0, 0.0)))]),
        ];
        let pos = position_at(&frames, 5, 30_000, f64::INFINITY).unwrap();
        assert_eq!(pos, Position::new(50.0, 0.0));
    }

    #[test]
    fn speed_cap_limits_displacement() {
        // 10 units/s for 1 s allows 10 units even though the lerp wants 500
        let pos = predict_position(
            Some(Position::new(0.0, 0.0)),
            Some(Position::new(0.0, 1000.0)),
            0,
            2000,
            1000,
            10.0,
        )
        .unwrap();
        assert!((pos.x - 0.0).abs() < 1e-9);
        assert!((pos.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_stays_at_prev() {
        let prev = Position::new(7.0, 7.0);
        let pos = predict_position(Some(prev), Some(Position::new(9.0, 9.0)), 100, 200, 100, 1800.0);
        assert_eq!(pos, Some(prev));
    }

    #[test]
    fn positions_for_all_participants() {
        let frames = vec![
            frame(0, &[(1, Some((0.0, 0.0))), (2, None)]),
            frame(1000, &[(1, Some((10.0, 0.0))), (2, None), (3, Some((5.0, 5.0)))]),
        ];
        let ps = vec![participant(1), participant(2), participant(3), participant(4)];
        let out = positions_at(&frames, &ps, 500, f64::INFINITY);

        assert_eq!(out.get(&1), Some(&Position::new(5.0, 0.0)));
        assert!(!out.contains_key(&2));
        // Only the next anchor exists, so no extrapolation
        assert_eq!(out.get(&3), Some(&Position::new(5.0, 5.0)));
        assert!(!out.contains_key(&4));
    }

    #[test]
    fn extreme_frame_span_is_clamped() {
        let frames = vec![
            frame(i64::MIN, &[(1, Some((0.0, 0.0)))]),
            frame(60_000, &[(1, Some((100.0, 0.0)))]),
        ];
        let pos = position_at(&frames, 1, 30_000, f64::INFINITY).unwrap();
        assert!(pos.x.is_finite() && pos.y.is_finite());

        let far = predict_position(
            Some(Position::new(0.0, 0.0)),
            Some(Position::new(10.0, 0.0)),
            i64::MIN,
            i64::MAX,
            i64::MAX,
            1800.0,
        );
        assert!(far.is_some());
    }

    proptest! {
        #[test]
        fn prop_never_exceeds_cap(
            px in -15_000.0f64..15_000.0,
            py in -15_000.0f64..15_000.0,
            nx in -15_000.0f64..15_000.0,
            ny in -15_000.0f64..15_000.0,
            prev_t in 0i64..3_000_000,
            span in 0i64..120_000,
            offset in -10_000i64..130_000,
            cap in 0.0f64..5_000.0,
        ) {
            let prev = Position::new(px, py);
            let pos = predict_position(
                Some(prev),
                Some(Position::new(nx, ny)),
                prev_t,
                prev_t + span,
                prev_t + offset,
                cap,
            ).unwrap();
            let allowed = cap * offset.max(0) as f64 / 1000.0;
            prop_assert!(prev.distance(&pos) <= allowed + 1e-6);
        }

        #[test]
        fn prop_infinite_cap_is_linear(
            px in -15_000.0f64..15_000.0,
            nx in -15_000.0f64..15_000.0,
            span in 1i64..120_000,
            frac in 0.0f64..=1.0,
        ) {
            let t = (span as f64 * frac) as i64;
            let pos = predict_position(
                Some(Position::new(px, 0.0)),
                Some(Position::new(nx, 0.0)),
                0,
                span,
                t,
                f64::INFINITY,
            ).unwrap();
            let expected = px + (nx - px) * (t as f64 / span as f64);
            prop_assert!((pos.x - expected).abs() < 1e-6);
            prop_assert!(pos.y.abs() < 1e-9);
        }
    }
}
