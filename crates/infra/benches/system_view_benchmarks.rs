use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::{DateTime, Duration, TimeZone, Utc};
use vigil_core::{
    Archive, ArchiveId, ArchiveStatus, JobId, Target, TargetId, Task, TaskId, TaskOp,
    compose_system_view,
};
use vigil_infra::relevance::rules::newly_irrelevant;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// `n` backup runs over 10 jobs, every third one failed, every fifth archive
/// purged.
fn history(target: &Target, n: usize) -> (Vec<Task>, Vec<Archive>) {
    let jobs: Vec<JobId> = (0..10).map(|_| JobId::new()).collect();
    let mut tasks = Vec::with_capacity(n);
    let mut archives = Vec::with_capacity(n);

    for i in 0..n {
        let started = t0() + Duration::minutes(i as i64);
        let ok = i % 3 != 0;
        let mut task = Task::new(
            TaskId::new(),
            target.id,
            TaskOp::Backup,
            if ok { "done" } else { "failed" },
        );
        task.job_id = Some(jobs[i % jobs.len()]);
        task.started_at = Some(started);
        task.ok = ok;

        if ok {
            let mut archive = Archive::new(
                ArchiveId::new(),
                target.id,
                task.id,
                "every-minute",
                started,
                started + Duration::days(7),
            )
            .unwrap();
            if i % 5 == 0 {
                archive.status = ArchiveStatus::Purged;
            }
            task.link_archive(archive.id).unwrap();
            archives.push(archive);
        }
        tasks.push(task);
    }
    (tasks, archives)
}

fn bench_compose_view(c: &mut Criterion) {
    let mut group = c.benchmark_group("compose_system_view");
    let target = Target::new(TargetId::new(), "bench", "fs");

    for size in [100usize, 1_000, 10_000] {
        let (tasks, archives) = history(&target, size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                black_box(compose_system_view(
                    black_box(&target),
                    &[],
                    black_box(&tasks),
                    black_box(&archives),
                ))
            })
        });
    }
    group.finish();
}

fn bench_relevance_rules(c: &mut Criterion) {
    let mut group = c.benchmark_group("newly_irrelevant");
    let target = Target::new(TargetId::new(), "bench", "fs");

    for size in [100usize, 1_000, 10_000] {
        let (tasks, archives) = history(&target, size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(newly_irrelevant(tasks.iter(), archives.iter())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compose_view, bench_relevance_rules);
criterion_main!(benches);
