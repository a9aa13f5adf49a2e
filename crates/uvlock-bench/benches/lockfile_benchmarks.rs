use criterion::{Criterion, criterion_group, criterion_main};
use std::fs;
use std::hint::black_box;
use uvlock_core::decode::decode;
use uvlock_core::render::render;
use uvlock_core::{Lockfile, ValidateOptions, validate};
use uvlock_test::{fixtures_dir, load_fixture};

const FIXTURES: [&str; 3] = ["expense-tracker.lock", "workspace.lock", "forked.lock"];

fn parsed(fixture: &str) -> Lockfile {
  fixture
    .parse()
    .unwrap_or_else(|e| panic!("Should parse fixture: {e}"))
}

/// Each stage of the pipeline on its own
fn benchmark_stages(c: &mut Criterion) {
  let mut group = c.benchmark_group("stages");

  for fixture_name in FIXTURES {
    let fixture = load_fixture(fixture_name);
    let lockfile = parsed(&fixture);
    let label = fixture_name.trim_end_matches(".lock");

    group.bench_function(format!("toml_table/{label}"), |b| {
      b.iter(|| toml::from_str::<toml::Table>(black_box(&fixture)));
    });
    group.bench_function(format!("decode/{label}"), |b| {
      b.iter(|| decode(black_box(&fixture)));
    });
    group.bench_function(format!("render/{label}"), |b| {
      b.iter(|| render(black_box(&lockfile)));
    });
    group.bench_function(format!("validate/{label}"), |b| {
      let options = ValidateOptions::default();
      b.iter(|| validate(black_box(&lockfile), &options));
    });
  }

  group.finish();
}

/// Text in, checked and re-rendered text out
fn benchmark_round_trip(c: &mut Criterion) {
  let mut group = c.benchmark_group("round_trip");

  for fixture_name in FIXTURES {
    let fixture = load_fixture(fixture_name);
    let file_size = fixture.len();

    group.bench_function(format!("{fixture_name}_({file_size} bytes)"), |b| {
      b.iter(|| {
        let lockfile = parsed(black_box(&fixture));
        let report = validate(&lockfile, &ValidateOptions::default());
        assert!(report.is_ok(), "{fixture_name} should validate");
        lockfile.to_toml()
      });
    });
  }

  group.finish();
}

/// A synthetic lockfile much larger than the fixtures
fn benchmark_large(c: &mut Criterion) {
  let mut group = c.benchmark_group("large");

  let base = load_fixture("expense-tracker.lock");
  let mut lockfile = parsed(&base);
  let template = lockfile.packages[0].clone();
  for i in 0..2_000 {
    let mut package = template.clone();
    package.name = format!("synthetic-{i}")
      .parse()
      .unwrap_or_else(|e| panic!("{e}"));
    lockfile.packages.push(package);
  }
  let text = lockfile.to_toml();

  group.bench_function(format!("parse_({} bytes)", text.len()), |b| {
    b.iter(|| parsed(black_box(&text)));
  });
  group.bench_function("validate", |b| {
    let options = ValidateOptions::default();
    b.iter(|| validate(black_box(&lockfile), &options));
  });

  group.finish();
}

/// Every lockfile in the fixtures directory, invalid ones included
fn benchmark_all_fixtures(c: &mut Criterion) {
  let mut group = c.benchmark_group("all_fixtures");

  let mut fixtures: Vec<_> = [fixtures_dir(), fixtures_dir().join("invalid")]
    .iter()
    .flat_map(|dir| {
      fs::read_dir(dir).unwrap_or_else(|e| panic!("Failed to read {}: {e}", dir.display()))
    })
    .filter_map(|entry| {
      let path = entry.ok()?.path();
      (path.extension()? == "lock").then_some(path)
    })
    .collect();
  fixtures.sort();

  for path in fixtures {
    let fixture = fs::read_to_string(&path).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
    let label = path
      .file_stem()
      .and_then(|stem| stem.to_str())
      .unwrap_or("unknown")
      .replace('-', "_");
    group.bench_function(label, |b| {
      b.iter(|| parsed(black_box(&fixture)));
    });
  }

  group.finish();
}

criterion_group!(
  benches,
  benchmark_stages,
  benchmark_round_trip,
  benchmark_large,
  benchmark_all_fixtures,
);
criterion_main!(benches);
