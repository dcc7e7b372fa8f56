//! Behaviour when the time budget runs out before optimality is proven.

use std::collections::BTreeMap;

use makeup_sched::{RawInput, SchedulerConfig, schedule_exams, verify_schedule};

/// Mycielski graph of the given order: triangle-free with chromatic number
/// `order`. Order 2 is a single edge.
fn mycielski(order: usize) -> (usize, Vec<(usize, usize)>) {
    let mut n = 2;
    let mut edges = vec![(0, 1)];
    for _ in 2..order {
        let mut next = edges.clone();
        for &(a, b) in &edges {
            next.push((n + a, b));
            next.push((n + b, a));
        }
        for v in 0..n {
            next.push((n + v, 2 * n));
        }
        n = 2 * n + 1;
        edges = next;
    }
    (n, edges)
}

#[test]
fn mycielski_sizes() {
    assert_eq!(mycielski(3).0, 5);
    assert_eq!(mycielski(3).1.len(), 5);
    assert_eq!(mycielski(4).1.len(), 20);
    let (n, edges) = mycielski(7);
    assert_eq!((n, edges.len()), (95, 755));
}

#[test]
fn timeout_with_incumbent_is_not_proven_optimal() {
    // One student per edge: subjects are vertices, slots are colours. The
    // seventh-order graph needs 7 slots and the clique bound only sees 2.
    let (n, edges) = mycielski(7);
    let days: Vec<String> = (1..=12).map(|d| format!("dia{d}")).collect();
    let mut raw = RawInput {
        days: days.clone(),
        ..RawInput::default()
    };
    raw.timetables.insert(
        "A".into(),
        days.iter().map(|day| (day.clone(), vec![0; 8])).collect(),
    );
    let roster: BTreeMap<String, Vec<String>> = edges
        .iter()
        .enumerate()
        .map(|(i, &(a, b))| (format!("aluno{i}"), vec![format!("S{a}"), format!("S{b}")]))
        .collect();
    raw.rosters.insert("A".into(), roster);

    let mut config = SchedulerConfig::default().with_time_limit_secs(0.2);
    config.diagnose_infeasibility = false;

    let (relations, schedule) = schedule_exams(&raw, &config).unwrap();
    assert!(!schedule.proven_optimal);
    assert!(schedule.latest_slot >= 6);
    assert_eq!(schedule.exam_count(), n);
    assert!(verify_schedule(&relations, &schedule, config.max_exams_per_day).is_empty());
}
