use crate::collection::{FeatureCollection, geometry_column_name_for};
use crate::conversions::empty_geometry;
use crate::crs::{Crs, WGS84};
use crate::error::Result;
use crate::geometry::{GeometryColumn, is_empty, normalize};
use crate::table::{Column, Table};
use crate::value::Value;
use geojson::{GeoJson, JsonObject, JsonValue};
use std::collections::HashSet;
use std::path::Path;

pub(super) fn read_geojson(path: &Path) -> Result<FeatureCollection> {
    let content = std::fs::read_to_string(path)?;
    from_geojson_str(&content)
}

pub(super) fn write_geojson(collection: &FeatureCollection, path: &Path) -> Result<()> {
    std::fs::write(path, to_geojson_string(collection)?)?;
    Ok(())
}

/// Parse a GeoJSON document into a feature collection.
///
/// A bare geometry or feature becomes a one-row collection. The CRS is
/// WGS84 unless the document carries a legacy `crs` member.
pub fn from_geojson_str(content: &str) -> Result<FeatureCollection> {
    let (features, crs) = match content.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(fc) => {
            let crs = crs_member(fc.foreign_members.as_ref());
            (fc.features, crs)
        }
        GeoJson::Feature(feature) => {
            let crs = crs_member(feature.foreign_members.as_ref());
            (vec![feature], crs)
        }
        GeoJson::Geometry(geometry) => (vec![geojson::Feature::from(geometry)], Crs::Epsg(WGS84)),
    };

    // Union of property names in first-seen order.
    let mut names: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for properties in features.iter().filter_map(|f| f.properties.as_ref()) {
        for name in properties.keys() {
            if seen.insert(name.as_str()) {
                names.push(name.clone());
            }
        }
    }

    let mut geometries = Vec::with_capacity(features.len());
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(features.len()); names.len()];
    for feature in &features {
        geometries.push(match &feature.geometry {
            Some(geometry) => normalize(geo::Geometry::<f64>::try_from(geometry.clone())?),
            None => empty_geometry(),
        });
        for (name, column) in names.iter().zip(columns.iter_mut()) {
            let value = feature
                .properties
                .as_ref()
                .and_then(|properties| properties.get(name))
                .map_or(Value::Null, json_to_value);
            column.push(value);
        }
    }

    let attributes = Table::with_nrow(
        features.len(),
        names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Column::new(name, values))
            .collect(),
    )?;
    let geometry_name = geometry_column_name_for(&attributes);
    FeatureCollection::new(attributes, GeometryColumn::new(geometry_name, crs, geometries))
}

/// Serialize a collection as a GeoJSON `FeatureCollection`.
///
/// Empty geometries are written as `null`. A CRS other than WGS84 is
/// recorded in a legacy `crs` member; readers following RFC 7946 ignore it.
/// An undefined CRS is written without a `crs` member, so it reads back as
/// WGS84.
pub fn to_geojson_string(collection: &FeatureCollection) -> Result<String> {
    let features = collection
        .iter()
        .map(|feature| {
            let properties: JsonObject = feature
                .attributes
                .values()
                .map(|(name, value)| (name.to_string(), value_to_json(value)))
                .collect();
            geojson::Feature {
                bbox: None,
                geometry: (!is_empty(feature.geometry))
                    .then(|| geojson::Geometry::new(geojson::Value::from(feature.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let crs = collection.crs();
    let foreign_members = if crs.equivalent(&Crs::Epsg(WGS84)) {
        None
    } else if let Some(name) = crs_name(crs) {
        log::warn!("GeoJSON expects WGS84; recording {crs} in a legacy crs member");
        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({ "type": "name", "properties": { "name": name } }),
        );
        Some(members)
    } else {
        log::debug!("writing GeoJSON without a CRS");
        None
    };

    let fc = geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    };
    Ok(GeoJson::from(fc).to_string())
}

fn crs_name(crs: &Crs) -> Option<String> {
    match crs {
        Crs::Epsg(code) => Some(format!("urn:ogc:def:crs:EPSG::{code}")),
        Crs::Proj(definition) => Some(definition.clone()),
        Crs::Undefined => None,
    }
}

/// Read `{"crs": {"type": "name", "properties": {"name": ...}}}`.
fn crs_member(foreign_members: Option<&JsonObject>) -> Crs {
    let Some(crs) = foreign_members.and_then(|members| members.get("crs")) else {
        return Crs::Epsg(WGS84);
    };
    let name = crs
        .get("properties")
        .and_then(|properties| properties.get("name"))
        .and_then(JsonValue::as_str);
    match name.map(str::parse::<Crs>) {
        Some(Ok(parsed)) => parsed,
        _ => {
            log::warn!("unrecognized GeoJSON crs member {crs}; CRS left undefined");
            Crs::Undefined
        }
    }
}

fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(v) => Value::Boolean(*v),
        JsonValue::Number(n) => match n.as_i64() {
            Some(v) => Value::Integer(v),
            None => n.as_f64().map_or(Value::Null, Value::Real),
        },
        JsonValue::String(s) => Value::Text(s.clone()),
        // Nested values are kept as their JSON text.
        other => Value::Text(other.to_string()),
    }
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(v) => JsonValue::Bool(*v),
        Value::Integer(v) => JsonValue::from(*v),
        Value::Real(v) => serde_json::Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number),
        Value::Text(v) => JsonValue::String(v.clone()),
        Value::Blob(bytes) => JsonValue::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::tests::cities;
    use crate::error::SfError;
    use crate::geometry::GeometryKind;
    use geo::Point;

    #[test]
    fn reads_mixed_properties() -> crate::Result<()> {
        let fc = from_geojson_str(
            r#"{
                "type": "FeatureCollection",
                "features": [
                    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                     "properties": {"name": "a", "pop": 10}},
                    {"type": "Feature", "geometry": null,
                     "properties": {"pop": 2.5, "tags": ["x", "y"]}}
                ]
            }"#,
        )?;
        assert_eq!(fc.nrow(), 2);
        assert_eq!(fc.crs(), &Crs::Epsg(4326));
        assert_eq!(fc.attributes().column_names(), vec!["name", "pop", "tags"]);
        assert_eq!(fc.attributes().value(1, "name"), Some(&Value::Null));
        assert_eq!(fc.attributes().value(1, "pop"), Some(&Value::Real(2.5)));
        assert_eq!(
            fc.attributes().value(1, "tags"),
            Some(&Value::from(r#"["x","y"]"#))
        );
        assert_eq!(
            fc.geometry().get(0),
            Some(&geo::Geometry::Point(Point::new(1.0, 2.0)))
        );
        assert!(is_empty(&fc.geometry().as_slice()[1]));
        Ok(())
    }

    #[test]
    fn bare_geometry_and_legacy_crs() -> crate::Result<()> {
        let fc = from_geojson_str(r#"{"type": "LineString", "coordinates": [[0, 0], [1, 1]]}"#)?;
        assert_eq!(fc.nrow(), 1);
        assert_eq!(fc.geometry().dominant_kind(), GeometryKind::LineString);

        let fc = from_geojson_str(
            r#"{"type": "FeatureCollection",
                "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
                "features": []}"#,
        )?;
        assert_eq!(fc.crs(), &Crs::Epsg(3857));

        let fc = from_geojson_str(
            r#"{"type": "FeatureCollection",
                "crs": {"type": "link", "properties": {"href": "x"}},
                "features": []}"#,
        )?;
        assert_eq!(fc.crs(), &Crs::Undefined);
        Ok(())
    }

    #[test]
    fn writes_crs_member_only_when_not_wgs84() -> crate::Result<()> {
        let wgs84 = to_geojson_string(&cities())?;
        assert!(!wgs84.contains("\"crs\""));

        let mercator = cities().set_crs(Crs::Epsg(3857));
        let text = to_geojson_string(&mercator)?;
        assert!(text.contains("urn:ogc:def:crs:EPSG::3857"));
        assert_eq!(from_geojson_str(&text)?, mercator);
        Ok(())
    }

    #[test]
    fn geometry_property_keeps_its_name() -> crate::Result<()> {
        let fc = from_geojson_str(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"geometry": "road"},
                 "geometry": {"type": "Point", "coordinates": [1, 2]}}]}"#,
        )?;
        assert_eq!(fc.geometry_column_name(), "geometry.1");
        assert_eq!(fc.attributes().value(0, "geometry"), Some(&Value::from("road")));

        let back = from_geojson_str(&to_geojson_string(&fc)?)?;
        assert_eq!(back, fc);
        Ok(())
    }

    #[test]
    fn undefined_crs_reads_back_as_wgs84() -> crate::Result<()> {
        let text = to_geojson_string(&cities().set_crs(Crs::Undefined))?;
        assert!(!text.contains("\"crs\""));
        assert_eq!(from_geojson_str(&text)?.crs(), &Crs::Epsg(WGS84));
        Ok(())
    }

    #[test]
    fn rejects_invalid_documents() {
        assert!(matches!(
            from_geojson_str(r#"{"type": "Nope"}"#),
            Err(SfError::GeoJson(_))
        ));
    }
}
