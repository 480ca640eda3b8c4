//! Sample generation -> CSV -> loader -> full pipeline integration.

use fleet_insight::acquisition::{self, sample};
use fleet_insight::pipeline::PipelineCoordinator;
use fleet_insight::types::{Column, RunStatus};

#[tokio::test]
async fn generated_batch_round_trips_through_the_full_pipeline() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv_path = dir.path().join("fleet.csv");

    sample::write_csv(&csv_path, 75, 42).expect("write sample");

    let dataset = acquisition::load_csv(&csv_path).expect("load sample");
    assert_eq!(dataset.len(), 75);
    assert!(dataset.profile.ignored_columns.is_empty());
    for &col in Column::numeric() {
        assert!(dataset.columns.has(col), "missing {}", col.name());
    }

    let mut coordinator = PipelineCoordinator::new(None);
    let result = coordinator.run(dataset).await;

    assert_eq!(result.status, RunStatus::Success);
    assert_eq!(result.row_count, 75, "sample rows all survive cleaning");

    let summary = result.summary.expect("summary");
    assert!(summary.avg_health_score.is_some());
    assert!(!summary.machine_type_counts.is_empty());

    // The injected anomalies guarantee the detector finds work.
    let anomalies = result.anomalies.expect("anomalies");
    assert!(anomalies.total_flagged() > 0);

    let report = result.report.expect("report");
    assert!(report.to_uppercase().contains("KPI"));
    assert!(report.len() > 1000);
}

#[tokio::test]
async fn loader_coexists_with_unrecognized_vendor_columns() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv_path = dir.path().join("vendor.csv");

    let mut contents = String::from(
        "Machine_ID,Machine_Type,Installation_Year,Operational_Hours,Temperature_C,\
         Vibration_mms,Sound_dB,Power_Consumption_kW,Spindle_Speed_RPM,Tool_Wear_pct\n",
    );
    for i in 0..15 {
        contents.push_str(&format!(
            "M{:04},CNC,2018,{},{:.1},{:.2},{:.1},{:.1},8000,12.5\n",
            i + 1,
            4000 + i * 100,
            40.0 + i as f64,
            1.0 + i as f64 * 0.1,
            62.0 + i as f64,
            28.0 + i as f64,
        ));
    }
    std::fs::write(&csv_path, contents).expect("write csv");

    let dataset = acquisition::load_csv(&csv_path).expect("load");
    assert_eq!(
        dataset.profile.ignored_columns,
        vec!["Spindle_Speed_RPM", "Tool_Wear_pct"]
    );

    let mut coordinator = PipelineCoordinator::new(None);
    let result = coordinator.run(dataset).await;
    assert_eq!(result.status, RunStatus::Success);
}
