use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use phago_template::{FieldPath, Template};

fn fixture() -> Template {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("parameters/calibration-parameters.xml");
    Template::load(path).unwrap()
}

fn bench_render(c: &mut Criterion) {
    let template = fixture();
    let fields: Vec<(FieldPath, String)> = [
        ("Simulation/endTime", "150"),
        ("Simulation/Fragment/numFrags", "5000"),
        ("Simulation/Fragment/speedM_Mean", "1.17"),
        ("Simulation/Fragment/meanderMean", "-3"),
        ("Simulation/Fragment/meanderStD", "1.5"),
        ("Simulation/Macrophage/speedM_Mean", "5"),
        ("Simulation/Macrophage/diameter", "14"),
    ]
    .into_iter()
    .map(|(path, value)| (FieldPath::parse(path).unwrap(), value.to_string()))
    .collect();

    c.bench_function("render_seven_fields", |b| {
        b.iter(|| {
            let overrides = fields.iter().map(|(path, value)| (path, value.as_str()));
            black_box(template.render(overrides).unwrap())
        })
    });
}

criterion_group!(benches, bench_render);
criterion_main!(benches);
