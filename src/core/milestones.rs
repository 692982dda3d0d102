use super::types::{Milestone, PERIODS_PER_YEAR, Trajectory};

const ROUND_TARGETS: [f64; 7] = [
    10_000.0,
    25_000.0,
    50_000.0,
    100_000.0,
    250_000.0,
    500_000.0,
    1_000_000.0,
];

/// First period whose value reaches `target`.
pub fn find_milestone(trajectory: &Trajectory, target: f64, label: &str) -> Option<Milestone> {
    let final_value = trajectory.final_value();
    trajectory
        .records
        .iter()
        .enumerate()
        .find(|(_, record)| record.value >= target)
        .map(|(index, record)| Milestone {
            label: label.to_string(),
            index,
            period: record.period,
            year: record.period.div_ceil(PERIODS_PER_YEAR),
            target,
            value: record.value,
            percent_of_final: percent_of(record.value, final_value),
        })
}

/// Capital multiples, round amounts and half of the final value, ordered by
/// the period they are first reached.
pub fn standard_milestones(trajectory: &Trajectory, initial_capital: f64) -> Vec<Milestone> {
    let mut targets: Vec<(f64, String)> = Vec::new();
    if initial_capital > 0.0 {
        for multiple in 2..=10 {
            targets.push((initial_capital * multiple as f64, format!("{multiple}x capital")));
        }
    }
    for amount in ROUND_TARGETS {
        targets.push((amount, format!("{} reached", format_amount(amount))));
    }
    let final_value = trajectory.final_value();
    if final_value > 0.0 {
        targets.push((final_value / 2.0, "half of final value".to_string()));
    }

    let mut seen: Vec<f64> = Vec::with_capacity(targets.len());
    let mut milestones = Vec::new();
    for (target, label) in targets {
        if target <= 0.0 || seen.iter().any(|t| (t - target).abs() <= 1e-9 * target) {
            continue;
        }
        seen.push(target);
        if let Some(m) = find_milestone(trajectory, target, &label) {
            milestones.push(m);
        }
    }

    milestones.sort_by(|a, b| a.period.cmp(&b.period).then(a.target.total_cmp(&b.target)));
    milestones
}

fn percent_of(value: f64, final_value: f64) -> f64 {
    if final_value <= 0.0 {
        return 0.0;
    }
    (value / final_value * 1_000.0).round() / 10.0
}

fn format_amount(amount: f64) -> String {
    if amount >= 1_000_000.0 {
        format!("{}M", amount / 1_000_000.0)
    } else if amount >= 1_000.0 {
        format!("{}k", amount / 1_000.0)
    } else {
        format!("{amount}")
    }
}
