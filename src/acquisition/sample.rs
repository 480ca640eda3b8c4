//! Synthetic fleet batch generation for testing and demos.
//!
//! Produces machine rows whose sensor readings correlate with a hidden health
//! state and age factor, so downstream KPIs and anomaly categories have
//! realistic structure. A handful of extreme readings are injected to keep
//! the anomaly detector exercised.

use chrono::{Datelike, Utc};
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_distr::Exp;
use std::io::Write;
use std::path::Path;
use tracing::info;

use crate::types::{Column, ColumnPresence, MachineDataset, MachineRecord};

/// Sensor envelope for one machine type.
struct TypeSpec {
    name: &'static str,
    temp_range: (f64, f64),
    vib_range: (f64, f64),
    power_range: (f64, f64),
}

const TYPE_SPECS: [TypeSpec; 8] = [
    TypeSpec { name: "CNC", temp_range: (35.0, 75.0), vib_range: (0.5, 4.0), power_range: (15.0, 80.0) },
    TypeSpec { name: "Lathe", temp_range: (30.0, 65.0), vib_range: (0.3, 3.5), power_range: (10.0, 50.0) },
    TypeSpec { name: "Press", temp_range: (25.0, 55.0), vib_range: (1.0, 6.0), power_range: (50.0, 200.0) },
    TypeSpec { name: "Robot", temp_range: (28.0, 50.0), vib_range: (0.2, 2.0), power_range: (5.0, 30.0) },
    TypeSpec { name: "Conveyor", temp_range: (20.0, 45.0), vib_range: (0.1, 1.5), power_range: (3.0, 15.0) },
    TypeSpec { name: "Compressor", temp_range: (40.0, 90.0), vib_range: (0.8, 5.0), power_range: (20.0, 100.0) },
    TypeSpec { name: "Pump", temp_range: (30.0, 70.0), vib_range: (0.4, 3.0), power_range: (8.0, 40.0) },
    TypeSpec { name: "Mill", temp_range: (35.0, 80.0), vib_range: (0.6, 4.5), power_range: (25.0, 120.0) },
];

/// Hidden health state scaling temperature, vibration, and fault counts.
struct HealthState {
    temp_mult: f64,
    vib_mult: f64,
    error_mult: f64,
}

const HEALTH_STATES: [HealthState; 5] = [
    // excellent, good, fair, poor, critical
    HealthState { temp_mult: 0.7, vib_mult: 0.5, error_mult: 0.1 },
    HealthState { temp_mult: 0.85, vib_mult: 0.7, error_mult: 0.3 },
    HealthState { temp_mult: 1.0, vib_mult: 1.0, error_mult: 0.5 },
    HealthState { temp_mult: 1.2, vib_mult: 1.5, error_mult: 0.8 },
    HealthState { temp_mult: 1.4, vib_mult: 2.0, error_mult: 1.0 },
];

const HEALTH_WEIGHTS: [f64; 5] = [0.15, 0.35, 0.30, 0.15, 0.05];

/// Generate a synthetic batch of `n_machines` rows with a fixed seed.
pub fn generate(n_machines: usize, seed: u64) -> MachineDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let current_year = f64::from(Utc::now().year());

    // Unwraps are safe on these fixed parameters; keep them out of the loop.
    let health_pick = WeightedIndex::new(HEALTH_WEIGHTS)
        .unwrap_or_else(|_| WeightedIndex::new([1.0; 5]).expect("uniform weights"));
    let maintenance_gap = Exp::new(1.0 / 60.0).expect("positive lambda");
    let error_burst = Exp::new(0.5).expect("positive lambda");

    let mut machines = Vec::with_capacity(n_machines);

    for i in 0..n_machines {
        let spec = &TYPE_SPECS[rng.gen_range(0..TYPE_SPECS.len())];
        let health = &HEALTH_STATES[health_pick.sample(&mut rng)];

        let installation_year = current_year - rng.gen_range(1.0_f64..=14.0).round();
        let age = current_year - installation_year;
        let age_factor = 1.0 + age * 0.02;

        let max_hours = (age * 365.0 * 24.0 * 0.7).max(1000.0);
        let operational_hours = rng.gen_range(1000.0..=max_hours.max(1000.1));

        let temperature =
            rng.gen_range(spec.temp_range.0..=spec.temp_range.1) * health.temp_mult * age_factor;
        let vibration =
            rng.gen_range(spec.vib_range.0..=spec.vib_range.1) * health.vib_mult * age_factor;
        let sound = 60.0 + vibration * 10.0 + rng.gen_range(-5.0..=5.0);
        let power = rng.gen_range(spec.power_range.0..=spec.power_range.1)
            * (1.0 + health.vib_mult * 0.1);

        let oil_level = rng.gen_range(60.0..=100.0) / age_factor;
        let coolant_level = rng.gen_range(50.0..=100.0) / age_factor;

        let last_maintenance = (maintenance_gap.sample(&mut rng) * age_factor).min(365.0);
        let maintenance_count = (age * rng.gen_range(2.0..=6.0)).round();
        let failure_count = (health.error_mult * age * rng.gen_range(0.5..=2.0)).round();
        let error_codes = (error_burst.sample(&mut rng) * health.error_mult).round();
        let ai_overrides = (error_burst.sample(&mut rng) * health.error_mult * 2.0).round();

        machines.push(MachineRecord {
            machine_id: format!("M{:04}", i + 1),
            machine_type: spec.name.to_string(),
            installation_year: Some(installation_year),
            operational_hours: Some((operational_hours * 10.0).round() / 10.0),
            temperature_c: Some(temperature.clamp(0.0, 150.0)),
            vibration_mms: Some(vibration.clamp(0.0, 50.0)),
            sound_db: Some(sound.clamp(30.0, 120.0)),
            power_consumption_kw: Some(power.clamp(1.0, 500.0)),
            oil_level_pct: Some(oil_level.clamp(0.0, 100.0)),
            coolant_level_pct: Some(coolant_level.clamp(0.0, 100.0)),
            last_maintenance_days_ago: Some(last_maintenance.floor()),
            maintenance_history_count: Some(maintenance_count),
            failure_history_count: Some(failure_count),
            error_codes_last_30_days: Some(error_codes),
            ai_override_events: Some(ai_overrides),
            ..Default::default()
        });
    }

    // Inject a few hard anomalies so detection paths always have work.
    if machines.len() > 5 {
        let n = machines.len();
        machines[rng.gen_range(0..n)].temperature_c = Some(120.5);
        machines[rng.gen_range(0..n)].vibration_mms = Some(15.8);
        machines[rng.gen_range(0..n)].power_consumption_kw = Some(350.0);
        machines[rng.gen_range(0..n)].error_codes_last_30_days = Some(25.0);
        machines[rng.gen_range(0..n)].last_maintenance_days_ago = Some(300.0);
    }

    MachineDataset::from_records(machines, ColumnPresence::all())
}

/// Generate a batch and write it as CSV.
pub fn write_csv(path: &Path, n_machines: usize, seed: u64) -> std::io::Result<()> {
    let dataset = generate(n_machines, seed);
    let mut file = std::fs::File::create(path)?;

    let headers: Vec<&str> = [Column::MachineId, Column::MachineType]
        .iter()
        .chain(Column::numeric())
        .map(|c| c.name())
        .collect();
    writeln!(file, "{}", headers.join(","))?;

    for machine in &dataset.machines {
        let mut cells = vec![machine.machine_id.clone(), machine.machine_type.clone()];
        for &col in Column::numeric() {
            cells.push(
                machine
                    .value(col)
                    .map_or_else(String::new, |v| format!("{v}")),
            );
        }
        writeln!(file, "{}", cells.join(","))?;
    }

    info!(path = %path.display(), machines = dataset.len(), "Sample batch written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_seed_deterministic() {
        let a = generate(30, 42);
        let b = generate(30, 42);
        assert_eq!(a.len(), 30);
        for (x, y) in a.machines.iter().zip(&b.machines) {
            assert_eq!(x.machine_id, y.machine_id);
            assert_eq!(x.temperature_c, y.temperature_c);
            assert_eq!(x.operational_hours, y.operational_hours);
        }
    }

    #[test]
    fn generated_values_stay_in_physical_bounds() {
        let dataset = generate(100, 7);
        for machine in &dataset.machines {
            let temp = machine.temperature_c.expect("temperature present");
            assert!((0.0..=150.0).contains(&temp));
            let hours = machine.operational_hours.expect("hours present");
            assert!(hours >= 1000.0);
            let vib = machine.vibration_mms.expect("vibration present");
            assert!((0.0..=50.0).contains(&vib));
        }
    }

    #[test]
    fn all_recognized_columns_are_present() {
        let dataset = generate(20, 1);
        for &col in Column::numeric() {
            assert!(dataset.columns.has(col), "missing {}", col.name());
        }
    }
}
