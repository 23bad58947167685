//! Scénarios de résolution sur un jeu de données fixe

use std::time::SystemTime;

use geo::{polygon, Geometry, Intersects, Point};
use zones_alerte::commune::arrondissement_codes;
use zones_alerte::{
    ArreteRaw, ArreteStatus, MunicipalDecree, Profile, ResolveQuery, RestrictionRaw, Severity,
    Snapshot, UsageRaw, WaterType, ZoneError, ZoneRaw, ZoneResolver, ZoneView,
};

fn arrete(id: i32) -> ArreteRaw {
    ArreteRaw {
        id,
        date_debut: Some("2024-07-15".into()),
        date_fin: Some("2024-10-31".into()),
        statut: ArreteStatus::Publie,
        departement: Some("75".into()),
        chemin_fichier: Some(format!("https://files.example/arrete-{id}.pdf")),
        chemin_fichier_arrete_cadre: Some("https://files.example/cadre.pdf".into()),
    }
}

fn usages() -> Vec<UsageRaw> {
    vec![
        UsageRaw {
            id: 1,
            nom: "Arrosage des jardins potagers".into(),
            thematique: "Arroser".into(),
            concerne_particulier: true,
            concerne_entreprise: true,
            concerne_collectivite: true,
            concerne_exploitation: false,
            concerne_esu: true,
            concerne_eso: true,
            concerne_aep: true,
            description_crise: Some("Interdit".into()),
            ..Default::default()
        },
        UsageRaw {
            id: 2,
            nom: "Lavage des véhicules en station".into(),
            thematique: "Nettoyer".into(),
            concerne_entreprise: true,
            concerne_aep: true,
            description_crise: Some("Interdit sauf impératif sanitaire".into()),
            ..Default::default()
        },
    ]
}

fn paris_aep() -> ZoneRaw {
    ZoneRaw {
        id: 100,
        id_sandre: Some(75001),
        code: Some("75_AEP".into()),
        nom: "Paris - eau potable".into(),
        zone_type: WaterType::Aep,
        ressource_influencee: false,
        niveau_gravite: Some(Severity::Crise),
        departement: Some("75".into()),
        bassin_versant: Some("Seine-Normandie".into()),
        geometry: Geometry::Polygon(polygon![
            (x: 2.22, y: 48.81), (x: 2.47, y: 48.81), (x: 2.47, y: 48.91), (x: 2.22, y: 48.91)
        ]),
        restriction: Some(RestrictionRaw {
            id: 10,
            arrete: arrete(1),
            usages: usages(),
        }),
        communes: vec!["75056".into()],
    }
}

fn seine_sou() -> ZoneRaw {
    ZoneRaw {
        id: 101,
        id_sandre: None,
        code: Some("SOU_SEINE".into()),
        nom: "Nappe de l'Albien".into(),
        zone_type: WaterType::Sou,
        ressource_influencee: false,
        niveau_gravite: Some(Severity::Alerte),
        departement: Some("75".into()),
        bassin_versant: None,
        geometry: Geometry::Polygon(polygon![
            (x: 2.0, y: 48.6), (x: 2.8, y: 48.6), (x: 2.8, y: 49.1), (x: 2.0, y: 49.1)
        ]),
        restriction: Some(RestrictionRaw {
            id: 11,
            arrete: arrete(1),
            usages: usages(),
        }),
        communes: vec!["75056".into(), "92012".into()],
    }
}

fn decree() -> MunicipalDecree {
    MunicipalDecree {
        id: 5,
        commune: "75056".into(),
        statut: ArreteStatus::Publie,
        chemin_fichier: Some("https://files.example/am-paris.pdf".into()),
    }
}

fn fixture() -> Snapshot {
    Snapshot::build(1, vec![paris_aep(), seine_sou()], vec![decree()], SystemTime::now())
        .expect("fixture snapshot")
}

#[test]
fn test_paris_point_crise_with_profile() {
    let snapshot = fixture();
    let query = ResolveQuery::point(2.35, 48.85).with_zone_type(WaterType::Aep);
    let views = snapshot.resolve(&query).unwrap();
    assert_eq!(views.len(), 1);
    let zone = views[0].as_zone().unwrap();
    assert_eq!(zone.zone.niveau_gravite, Some(Severity::Crise));
    assert_eq!(zone.zone.usages.len(), 2);
    assert_eq!(zone.zone.usages[1].description, "Interdit sauf impératif sanitaire");

    let views = snapshot
        .resolve(&query.with_profile(Profile::Particulier))
        .unwrap();
    let usages: Vec<i32> = views[0]
        .as_zone()
        .unwrap()
        .zone
        .usages
        .iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(usages, vec![1]);
}

#[test]
fn test_point_outside_everything() {
    let snapshot = fixture();
    assert_eq!(
        snapshot.resolve(&ResolveQuery::point(5.72, 45.18)),
        Err(ZoneError::ZoneNotFound)
    );
}

#[test]
fn test_arrondissement_resolves_like_parent() {
    let snapshot = fixture();
    let by_parent = snapshot.resolve(&ResolveQuery::commune("75056")).unwrap();
    let by_arrondissement = snapshot.resolve(&ResolveQuery::commune("75101")).unwrap();
    assert_eq!(by_parent, by_arrondissement);

    for (code, parent) in arrondissement_codes() {
        let a = snapshot.resolve(&ResolveQuery::commune(code.clone()));
        let b = snapshot.resolve(&ResolveQuery::commune(parent));
        match (a, b) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(ZoneError::NoZoneForMunicipality(_)), Err(ZoneError::NoZoneForMunicipality(_))) => {}
            (a, b) => panic!("{code}: {a:?} vs {b:?}"),
        }
    }
}

#[test]
fn test_decree_placeholder_for_missing_type() {
    let snapshot = fixture();
    let views = snapshot.resolve(&ResolveQuery::commune("75104")).unwrap();
    assert_eq!(views.len(), 3);

    let sup = views
        .iter()
        .find(|v| v.zone_type() == WaterType::Sup)
        .unwrap();
    assert!(matches!(sup, ZoneView::DecreeOnly(_)));
    assert_eq!(
        sup.municipal_decree_file(),
        Some("https://files.example/am-paris.pdf")
    );

    // Les zones réelles portent aussi la référence de l'arrêté municipal
    let aep = views.iter().find(|v| v.zone_type() == WaterType::Aep).unwrap();
    assert_eq!(aep.id(), Some(100));
    assert_eq!(
        aep.municipal_decree_file(),
        Some("https://files.example/am-paris.pdf")
    );
}

#[test]
fn test_decree_only_commune() {
    let mut decree = decree();
    decree.commune = "38185".into();
    let snapshot =
        Snapshot::build(1, vec![paris_aep()], vec![decree], SystemTime::now()).unwrap();
    let views = snapshot.resolve(&ResolveQuery::commune("38185")).unwrap();
    assert_eq!(views.len(), 3);
    assert!(views.iter().all(|v| v.id().is_none()));

    assert_eq!(
        snapshot.resolve(&ResolveQuery::commune("01001")),
        Err(ZoneError::NoZoneForMunicipality("01001".into()))
    );
}

#[test]
fn test_conflict_then_influenced() {
    let mut second = paris_aep();
    second.id = 102;
    let snapshot = Snapshot::build(
        1,
        vec![paris_aep(), second.clone()],
        vec![],
        SystemTime::now(),
    )
    .unwrap();
    let err = snapshot
        .resolve(&ResolveQuery::point(2.35, 48.85))
        .unwrap_err();
    assert!(matches!(err, ZoneError::AmbiguousZoneConflict { .. }));
    assert_eq!(err.http_status(), 500);

    second.ressource_influencee = true;
    let snapshot =
        Snapshot::build(1, vec![paris_aep(), second], vec![], SystemTime::now()).unwrap();
    let views = snapshot.resolve(&ResolveQuery::point(2.35, 48.85)).unwrap();
    assert_eq!(views.len(), 2);
}

#[test]
fn test_prefilter_is_superset_of_exact() {
    // Triangles imbriqués: beaucoup de points dans les bbox sans être dans les polygones
    let zones: Vec<ZoneRaw> = (0..20)
        .map(|i| {
            let x = i as f64 * 0.5;
            let mut z = paris_aep();
            z.id = i;
            z.zone_type = WaterType::ALL[i as usize % 3];
            z.ressource_influencee = true;
            z.geometry = Geometry::Polygon(polygon![
                (x: x, y: 0.), (x: x + 2., y: 0.), (x: x, y: 2.)
            ]);
            z
        })
        .collect();
    let shapes: Vec<(i32, Geometry<f64>)> = zones.iter().map(|z| (z.id, z.geometry.clone())).collect();
    let snapshot = Snapshot::build(1, zones, vec![], SystemTime::now()).unwrap();
    let resolver = ZoneResolver::new(&snapshot);

    for step in 0..60 {
        let lon = step as f64 * 0.19;
        let lat = (step % 11) as f64 * 0.18;
        let candidates: Vec<i32> = resolver.candidates(lon, lat).iter().map(|z| z.id).collect();
        let exact: Vec<i32> = resolver
            .by_point(lon, lat)
            .unwrap()
            .iter()
            .map(|z| z.id)
            .collect();
        let expected: Vec<i32> = shapes
            .iter()
            .filter(|(_, g)| g.intersects(&Point::new(lon, lat)))
            .map(|(id, _)| *id)
            .collect();
        assert!(exact.iter().all(|id| candidates.contains(id)));
        assert_eq!(exact, expected, "point ({lon}, {lat})");
    }
}

#[test]
fn test_zone_by_id_and_departement() {
    let snapshot = fixture();
    assert_eq!(snapshot.zone_by_id(101).unwrap().id(), Some(101));
    assert_eq!(snapshot.zone_by_id(999), Err(ZoneError::ZoneNotFound));

    let zones = snapshot.zones_by_departement("75").unwrap();
    assert_eq!(zones.len(), 2);
    assert_eq!(
        snapshot.zones_by_departement("2A"),
        Err(ZoneError::NoZoneForDepartement("2A".into()))
    );
}

#[test]
fn test_round_trip_builds_are_identical() {
    let a = fixture();
    let b = fixture();
    let all = |s: &Snapshot| {
        s.zones()
            .records()
            .iter()
            .map(|z| s.zone_by_id(z.id).unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(all(&a), all(&b));
    assert_eq!(
        serde_json::to_string(&a.resolve(&ResolveQuery::commune("75056")).unwrap()).unwrap(),
        serde_json::to_string(&b.resolve(&ResolveQuery::commune("75056")).unwrap()).unwrap()
    );
    assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
}

/// Zone de test bordée par l'antiméridien ou proche de la latitude limite
fn edge_zone(id: i32, geometry: Geometry<f64>) -> ZoneRaw {
    ZoneRaw {
        id,
        nom: format!("zone limite {id}"),
        departement: Some("988".into()),
        geometry,
        ..seine_sou()
    }
}

#[test]
fn test_antimeridian_is_not_normalized() {
    // Zone collée à l'antiméridien: les longitudes ne sont pas repliées
    let east = edge_zone(
        900,
        Geometry::Polygon(polygon![
            (x: 179.5, y: -17.0), (x: 179.99, y: -17.0), (x: 179.99, y: -16.0), (x: 179.5, y: -16.0)
        ]),
    );
    let snapshot = Snapshot::build(1, vec![east], vec![], SystemTime::now()).unwrap();
    let resolver = ZoneResolver::new(&snapshot);

    let found = resolver.by_point(179.9, -16.5).unwrap();
    assert_eq!(found.iter().map(|z| z.id).collect::<Vec<_>>(), vec![900]);

    // Même méridien vu de l'autre côté: aucune zone
    assert!(resolver.by_point(-179.9, -16.5).unwrap().is_empty());
    assert!(resolver.candidates(-179.9, -16.5).is_empty());
    assert!(matches!(
        snapshot.resolve(&ResolveQuery::point(-179.9, -16.5)),
        Err(ZoneError::ZoneNotFound)
    ));

    // 180 et -180 sont hors bornes
    for lon in [180.0, -180.0] {
        assert!(matches!(
            resolver.by_point(lon, -16.5),
            Err(ZoneError::InvalidCoordinate { .. })
        ));
    }
}

#[test]
fn test_zone_near_latitude_limit() {
    let polar = edge_zone(
        901,
        Geometry::Polygon(polygon![
            (x: -10.0, y: 84.0), (x: 10.0, y: 84.0), (x: 10.0, y: 86.0), (x: -10.0, y: 86.0)
        ]),
    );
    let snapshot = Snapshot::build(1, vec![polar], vec![], SystemTime::now()).unwrap();
    let resolver = ZoneResolver::new(&snapshot);

    // La géométrie dépasse 85° mais la recherche reste bornée à ]-85, 85[
    assert_eq!(resolver.by_point(0.0, 84.99).unwrap().len(), 1);
    assert!(matches!(
        resolver.by_point(0.0, 85.0),
        Err(ZoneError::InvalidCoordinate { .. })
    ));
    assert!(matches!(
        snapshot.resolve(&ResolveQuery::point(0.0, 85.5)),
        Err(ZoneError::InvalidCoordinate { .. })
    ));
}
