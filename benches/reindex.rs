use std::time::{Duration, Instant};

use serde_json::{json, Value};

use calindex::config::Config;
use calindex::day_slots::{index_day, DayGrid};
use calindex::protocol::{DayIndexPayload, MonthPatchPayload, MonthResetPayload};
use calindex::scene::MonthScene;

const INSTRUCTORS: usize = 25;
const ENTRIES_PER_MONTH: usize = 6_000;
const PATCHES: usize = 200;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().map_or(0.0, |d| d.as_secs_f64() * 1000.0),
    );
}

fn reservation(i: usize) -> Value {
    let day = 1 + i % 28;
    let minutes = 7 * 60 + (i * 30) % (12 * 60);
    let gearbox = if i % 2 == 0 { "Automat" } else { "Manual" };
    json!({
        "entryKey": format!("r:{i}"),
        "id": format!("r{i}"),
        "startTime": format!("2025-03-{day:02}T{:02}:{:02}:00.000Z", minutes / 60, minutes % 60),
        "instructorId": (i % INSTRUCTORS).to_string(),
        "userId": format!("s{}", i % 900),
        "privateMessage": "Traseu Băneasa – parcare laterală",
        "gearbox": gearbox,
    })
}

fn students() -> Value {
    let map: serde_json::Map<String, Value> = (0..900)
        .map(|i| {
            (
                format!("s{i}"),
                json!({ "firstName": format!("Elev{i}"), "lastName": "Ionescu", "phone": format!("0722 {i:06}") }),
            )
        })
        .collect();
    Value::Object(map)
}

fn main() {
    let config = Config::default();
    println!("calindex reindex bench ({ENTRIES_PER_MONTH} entries, {INSTRUCTORS} instructors)");

    let reset: MonthResetPayload = serde_json::from_value(json!({
        "monthKey": "2025-03",
        "studentsById": students(),
        "reservations": (0..ENTRIES_PER_MONTH).map(reservation).collect::<Vec<_>>(),
    }))
    .expect("reset payload");

    let mut scene = MonthScene::from_config(&config);
    let mut resets = Vec::new();
    for _ in 0..10 {
        let started = Instant::now();
        let index = scene.reset(reset.clone());
        resets.push(started.elapsed());
        assert_eq!(index.events_count, ENTRIES_PER_MONTH);
    }
    print_latency("month reset", &mut resets);

    let mut patches = Vec::new();
    for n in 0..PATCHES {
        let patch: MonthPatchPayload = serde_json::from_value(json!({
            "monthKey": "2025-03",
            "removals": [format!("r:{n}")],
            "upserts": [reservation(ENTRIES_PER_MONTH + n)],
        }))
        .expect("patch payload");
        let started = Instant::now();
        scene.patch(patch).expect("patch applies");
        patches.push(started.elapsed());
    }
    print_latency("month patch (full reindex)", &mut patches);

    let day: DayIndexPayload = serde_json::from_value(json!({
        "selectedYmd": "2025-03-10",
        "instructorIds": (0..INSTRUCTORS).map(|i| i.to_string()).collect::<Vec<_>>(),
        "reservations": (0..ENTRIES_PER_MONTH).map(reservation).collect::<Vec<_>>(),
    }))
    .expect("day payload");
    let grid = DayGrid::default();
    let mut days = Vec::new();
    for _ in 0..100 {
        let started = Instant::now();
        index_day(&day, &grid);
        days.push(started.elapsed());
    }
    print_latency("day slots", &mut days);
}
