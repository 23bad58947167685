//! Export GeoJSON des zones publiées (streaming avec geozero)

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use zones_alerte::Snapshot;

/// Écrit une FeatureCollection des zones de l'instantané (WGS84)
pub fn write_feature_collection<W: Write>(snapshot: &Snapshot, writer: &mut W) -> Result<usize> {
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::4326"}}}},"features":["#
    )?;

    let mut count = 0;
    for (i, (record, shape)) in snapshot.zones().iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write!(writer, r#"{{"type":"Feature","id":{},"geometry":"#, record.id)?;

        let mut geom_writer = GeoJsonWriter::new(&mut *writer);
        geo::Geometry::MultiPolygon(shape.clone())
            .process_geom(&mut geom_writer)
            .context(format!("Failed to write geometry of zone {}", record.id))?;

        write!(writer, r#","properties":"#)?;
        serde_json::to_writer(&mut *writer, record)?;
        write!(writer, "}}")?;
        count += 1;
    }

    write!(writer, "]}}")?;
    Ok(count)
}

/// Exporte les zones dans un fichier GeoJSON
pub fn export_to_geojson(snapshot: &Snapshot, output_path: &Path) -> Result<usize> {
    let file = File::create(output_path)
        .context(format!("Failed to create file: {}", output_path.display()))?;
    let mut writer = BufWriter::new(file);
    let count = write_feature_collection(snapshot, &mut writer)?;
    writer.flush()?;
    Ok(count)
}
