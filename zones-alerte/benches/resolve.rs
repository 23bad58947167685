//! Benchmarks de construction et de résolution sur une grille synthétique

use std::time::SystemTime;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geo::{polygon, Geometry};
use zones_alerte::{
    ArreteRaw, ArreteStatus, ResolveQuery, RestrictionRaw, Severity, Snapshot, WaterType, ZoneRaw,
};

/// Grille `side x side` de carrés de 0.1°, un type de ressource par rangée
fn grid(side: i32) -> Vec<ZoneRaw> {
    let mut zones = Vec::with_capacity((side * side) as usize);
    for row in 0..side {
        for col in 0..side {
            let id = row * side + col;
            let x = -4.0 + col as f64 * 0.1;
            let y = 42.0 + row as f64 * 0.1;
            zones.push(ZoneRaw {
                id,
                id_sandre: Some(id),
                code: Some(format!("Z{id}")),
                nom: format!("zone {id}"),
                zone_type: WaterType::ALL[(row % 3) as usize],
                ressource_influencee: false,
                niveau_gravite: Some(Severity::Alerte),
                departement: Some(format!("{:02}", 1 + row % 95)),
                bassin_versant: None,
                geometry: Geometry::Polygon(polygon![
                    (x: x, y: y), (x: x + 0.1, y: y), (x: x + 0.1, y: y + 0.1), (x: x, y: y + 0.1)
                ]),
                restriction: Some(RestrictionRaw {
                    id,
                    arrete: ArreteRaw {
                        id: 1,
                        date_debut: None,
                        date_fin: None,
                        statut: ArreteStatus::Publie,
                        departement: None,
                        chemin_fichier: None,
                        chemin_fichier_arrete_cadre: None,
                    },
                    usages: vec![],
                }),
                communes: vec![format!("{:05}", 1000 + id)],
            });
        }
    }
    zones
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for side in [32, 96] {
        let zones = grid(side);
        group.throughput(Throughput::Elements(zones.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(zones.len()), &zones, |b, zones| {
            b.iter(|| {
                let snapshot =
                    Snapshot::build(1, black_box(zones.clone()), vec![], SystemTime::now())
                        .unwrap();
                black_box(snapshot)
            })
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let snapshot = Snapshot::build(1, grid(96), vec![], SystemTime::now()).unwrap();
    let points: Vec<(f64, f64)> = (0..1000)
        .map(|i| (-4.0 + (i % 97) as f64 * 0.0987, 42.0 + (i % 89) as f64 * 0.1071))
        .collect();

    let mut group = c.benchmark_group("resolve");
    group.throughput(Throughput::Elements(points.len() as u64));
    group.bench_function("by_point", |b| {
        b.iter(|| {
            for &(lon, lat) in &points {
                let _ = black_box(snapshot.resolve(&ResolveQuery::point(lon, lat)));
            }
        })
    });
    group.bench_function("by_commune", |b| {
        b.iter(|| {
            for i in 0..1000 {
                let code = format!("{:05}", 1000 + i * 9);
                let _ = black_box(snapshot.resolve(&ResolveQuery::commune(code)));
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_resolve);
criterion_main!(benches);
