use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{NaiveDate, TimeZone, Utc};
use gwo_core::{Department, EmployeeId, EmployeeRecord, GamingMetrics, Level, RecordSet, TeamId};
use gwo_kpi::{KpiCalculator, KpiParameters, KpiQuery};

/// Synthetic studio: `n` employees spread over departments and teams of eight.
fn synthetic_studio(n: usize) -> RecordSet {
    let as_of = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
    let employees = (0..n)
        .map(|i| {
            let department = Department::ALL[i % Department::ALL.len()];
            EmployeeRecord {
                id: EmployeeId::new(format!("emp-{i:05}")),
                department,
                level: Level::ALL[i % Level::ALL.len()],
                team_id: Some(TeamId::new(format!("{department}-{}", i / 8))),
                salary: 60_000.0 + (i % 50) as f64 * 1_000.0,
                satisfaction_score: 1.0 + (i % 10) as f64 * 0.9,
                performance_score: 1.0 + (i % 5) as f64,
                years_experience: (i % 15) as f64,
                hire_date: NaiveDate::from_ymd_opt(2015 + (i % 9) as i32, 1, 1).unwrap(),
                recorded_on: Some(as_of),
                metrics: GamingMetrics {
                    sprint_velocity: Some(20.0 + (i % 30) as f64),
                    bug_fix_rate: Some(60.0 + (i % 40) as f64),
                    innovation_index: Some(40.0 + (i % 60) as f64),
                    crunch_hours_last_month: Some((i % 90) as f64),
                    team_collaboration_score: Some(5.0 + (i % 5) as f64),
                    cross_department_collaborations: Some((i % 7) as u32),
                    ..GamingMetrics::default()
                },
            }
        })
        .collect();
    RecordSet::new(as_of, employees, Vec::new()).unwrap()
}

fn bench_kpi_batch(c: &mut Criterion) {
    let calculator = KpiCalculator::from_params(KpiParameters::default()).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    let mut group = c.benchmark_group("kpi_batch");

    for size in [100usize, 1_000, 10_000] {
        let records = synthetic_studio(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| {
                calculator
                    .compute(black_box(records), &KpiQuery::default(), at)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_department_filter(c: &mut Criterion) {
    let calculator = KpiCalculator::from_params(KpiParameters::default()).unwrap();
    let at = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
    let records = synthetic_studio(5_000);
    let query = KpiQuery::default().with_department(Department::Programming);

    c.bench_function("kpi_batch/programming_only", |b| {
        b.iter(|| calculator.compute(black_box(&records), &query, at).unwrap())
    });
}

criterion_group!(benches, bench_kpi_batch, bench_department_filter);
criterion_main!(benches);
