// src/app/health/test.rs

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    use crate::app::health::eval::{CapacityInput, HealthEvaluator, watermark_memory_percent};
    use crate::app::health::types::{Evaluation, Verdict};
    use crate::store::{MetricRecord, stale_after};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn fresh(cells: &[(&str, f64)]) -> HashMap<String, MetricRecord> {
        cells
            .iter()
            .map(|(id, mem)| (id.to_string(), MetricRecord::new(*mem, now())))
            .collect()
    }

    /// Persistent store started long ago, 10000 MiB cells.
    fn run(snapshot: &HashMap<String, MetricRecord>, watermark: &str) -> Evaluation {
        let input = CapacityInput {
            snapshot,
            cell_memory: 10000.0,
            watermark,
            persistent_store: true,
            started_at: now() - TimeDelta::hours(1),
            now: now(),
        };
        let eval = HealthEvaluator::default().evaluate(&input);
        println!(
            "[eval] watermark={watermark:?} status={} verdict={:?} pct={}",
            eval.status_code(),
            eval.verdict,
            eval.report.watermark_memory_percent
        );
        eval
    }

    #[test]
    fn empty_fleet_is_gone() {
        let eval = run(&HashMap::new(), "1");

        assert_eq!(eval.status_code(), 410);
        assert!(!eval.report.healthy);
        assert_eq!(eval.report.message, "I'm sorry Dave I can't show you any data");
        assert_eq!(eval.report.watermark, 1);
        assert_eq!(eval.report.watermark_memory_percent, 0.0);
    }

    #[test]
    fn one_cell_cannot_exceed_a_watermark_of_one() {
        let eval = run(&fresh(&[("1", 6000.0)]), "1");

        assert_eq!(eval.status_code(), 417);
        assert_eq!(eval.verdict, Verdict::TooFewCells);
        assert_eq!(
            eval.report.message,
            "The number of cells needs to exceed the watermark amount!"
        );
        assert_eq!(eval.report.cell_count, 1);
        assert_eq!(eval.report.total_free_memory, 6000.0);
    }

    #[test]
    fn stale_cells_are_left_out_of_the_count() {
        let mut snap = fresh(&[("1", 6000.0)]);
        snap.insert(
            "2".into(),
            MetricRecord::new(6000.0, now() - stale_after() - TimeDelta::seconds(1)),
        );

        let eval = run(&snap, "1");

        assert_eq!(eval.report.cell_count, 1);
        assert_eq!(eval.report.cell_reports.len(), 1);
        assert_eq!(eval.report.cell_reports[0].index, "1");
        assert_eq!(eval.verdict, Verdict::TooFewCells);
    }

    #[test]
    fn two_healthy_cells_are_awesome() {
        let eval = run(&fresh(&[("1", 6321.0), ("2", 6321.0)]), "1");

        assert_eq!(eval.status_code(), 200);
        assert!(eval.report.healthy);
        assert_eq!(eval.report.message, "Everything is awesome!");
        assert_eq!(eval.report.watermark_memory_percent, 26.42);
        assert_eq!(eval.report.total_free_memory, 12642.0);
    }

    #[test]
    fn four_tight_cells_are_fatal() {
        let eval = run(
            &fresh(&[("1", 2100.0), ("2", 2100.0), ("3", 2100.0), ("4", 2100.0)]),
            "1",
        );

        assert_eq!(eval.status_code(), 417);
        assert_eq!(eval.verdict, Verdict::NoMigrationSpace);
        assert!(eval.report.message.starts_with("FATAL"));
        assert_eq!(eval.report.watermark_memory_percent, -5.33);
    }

    #[test]
    fn thin_headroom_is_reported_as_too_low() {
        let eval = run(
            &fresh(&[("1", 3100.0), ("2", 3100.0), ("3", 3100.0), ("4", 3100.0)]),
            "1",
        );

        assert_eq!(eval.status_code(), 417);
        assert_eq!(eval.verdict, Verdict::LowMigrationHeadroom);
        assert_eq!(eval.report.watermark_memory_percent, 8.0);
    }

    #[test]
    fn a_third_of_cells_low_on_memory_fails_before_the_percentage() {
        let eval = run(
            &fresh(&[
                ("1", 4000.0),
                ("2", 4000.0),
                ("3", 4000.0),
                ("4", 4000.0),
                ("5", 2000.0),
                ("6", 2000.0),
            ]),
            "1",
        );

        assert_eq!(eval.status_code(), 417);
        assert_eq!(
            eval.report.message,
            "At least a third of the cells are low on memory!"
        );
        assert_eq!(eval.report.watermark_memory_percent, 0.0);
        let low: Vec<_> = eval
            .report
            .cell_reports
            .iter()
            .filter(|c| c.low_memory)
            .map(|c| c.index.as_str())
            .collect();
        assert_eq!(low, ["5", "6"]);
    }

    #[test]
    fn invalid_watermark_is_a_server_error_with_details() {
        let eval = run(&fresh(&[("1", 6000.0), ("2", 6000.0)]), "invalid");

        assert_eq!(eval.status_code(), 500);
        assert!(
            eval.report
                .message
                .starts_with("Error occurred while calculating cell count: "),
            "got {}",
            eval.report.message
        );
        assert_eq!(eval.report.watermark, 0);
        assert_eq!(eval.report.requested_watermark, "invalid");
        assert_eq!(eval.report.cell_count, 2);
        assert_eq!(eval.report.cell_reports.len(), 2);
    }

    #[test]
    fn invalid_percent_watermark_is_a_server_error() {
        assert_eq!(run(&fresh(&[("1", 6000.0)]), "invalid%").status_code(), 500);
    }

    #[test]
    fn percent_watermark_resolves_against_fresh_cells() {
        let cells: Vec<(String, f64)> = (0..56).map(|i| (format!("c{i:02}"), 9000.0)).collect();
        let refs: Vec<(&str, f64)> = cells.iter().map(|(id, m)| (id.as_str(), *m)).collect();

        let eval = run(&fresh(&refs), "10%");

        assert_eq!(eval.report.watermark, 6);
        assert_eq!(eval.report.requested_watermark, "10%");
        assert_eq!(eval.status_code(), 200);
    }

    #[test]
    fn in_memory_store_asks_for_patience_right_after_start() {
        let snap = HashMap::new();
        let input = CapacityInput {
            snapshot: &snap,
            cell_memory: 10000.0,
            watermark: "1",
            persistent_store: false,
            started_at: now() - TimeDelta::seconds(30),
            now: now(),
        };

        let eval = HealthEvaluator::default().evaluate(&input);
        assert_eq!(eval.status_code(), 417);
        assert_eq!(eval.report.message, "I'm still initialising, please be patient!");

        let later = CapacityInput {
            started_at: now() - TimeDelta::minutes(2),
            ..input
        };
        assert_eq!(HealthEvaluator::default().evaluate(&later).status_code(), 410);
    }

    #[test]
    fn persistent_store_skips_the_grace_period() {
        let snap = HashMap::new();
        let input = CapacityInput {
            snapshot: &snap,
            cell_memory: 10000.0,
            watermark: "1",
            persistent_store: true,
            started_at: now(),
            now: now(),
        };
        assert_eq!(HealthEvaluator::default().evaluate(&input).status_code(), 410);
    }

    #[test]
    fn unknown_cell_memory_waits_instead_of_dividing_by_zero() {
        let snap = fresh(&[("1", 6000.0), ("2", 6000.0)]);
        let input = CapacityInput {
            snapshot: &snap,
            cell_memory: 0.0,
            watermark: "1",
            persistent_store: true,
            started_at: now() - TimeDelta::hours(1),
            now: now(),
        };

        let eval = HealthEvaluator::default().evaluate(&input);
        assert_eq!(eval.status_code(), 417);
        assert_eq!(eval.verdict, Verdict::CellMemoryUnknown);
        assert_eq!(eval.report.watermark_memory_percent, 0.0);
    }

    #[test]
    fn percent_formula_truncates_and_handles_empty_fleet() {
        assert_eq!(watermark_memory_percent(0, 1, 3.0, 1.0), 33.33);
        assert_eq!(watermark_memory_percent(1, 0, 10000.0, 0.0), 0.0);
        assert_eq!(watermark_memory_percent(1, 3, 10000.0, 15000.0), 25.0);
    }

    #[test]
    fn report_serializes_with_wire_field_names() {
        let eval = run(&fresh(&[("1", 6321.0), ("2", 6321.0)]), "1");
        let v = serde_json::to_value(&eval.report).expect("json");

        assert_eq!(v["healthy"], true);
        assert_eq!(v["cellCount"], 2);
        assert_eq!(v["cellMemory"], 10000.0);
        assert_eq!(v["watermark"], 1);
        assert_eq!(v["requested_watermark"], "1");
        assert_eq!(v["totalFreeMemory"], 12642.0);
        assert_eq!(v["WatermarkMemoryPercent"], 26.42);
        assert_eq!(v["details"][0]["index"], "1");
        assert_eq!(v["details"][0]["low_memory"], false);

        let empty = run(&HashMap::new(), "1");
        let v = serde_json::to_value(&empty.report).expect("json");
        assert!(v.get("details").is_none());
    }
}
