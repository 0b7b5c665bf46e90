use crate::conversions::{empty_geometry, to_geo_geometry};
use crate::error::{Result, SfError};
use crate::geometry::is_empty;
use crate::value::Value;
use geo::{BoundingRect, Geometry, Rect};
use std::collections::HashMap;
use std::sync::Arc;
use wkb::reader::Wkb;

/// A single feature with geometry bytes and owned properties.
#[derive(Clone, Debug)]
pub struct GpkgFeature {
    pub(super) id: i64,
    pub(super) geometry: Option<Vec<u8>>,
    pub(super) properties: Vec<Value>,
    pub(super) property_index_by_name: Arc<HashMap<String, usize>>,
}

impl GpkgFeature {
    /// Return the primary key value.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Decode the geometry. A `NULL` geometry decodes to an empty geometry.
    pub fn geometry(&self) -> Result<Geometry<f64>> {
        match &self.geometry {
            Some(bytes) => gpkg_blob_to_geometry(bytes),
            None => Ok(empty_geometry()),
        }
    }

    /// The raw GeoPackage binary, if the geometry is not `NULL`.
    pub fn geometry_blob(&self) -> Option<&[u8]> {
        self.geometry.as_deref()
    }

    /// Look up a property by column name.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.property_index_by_name
            .get(name)
            .and_then(|idx| self.properties.get(*idx))
    }

    /// Properties in layer column order.
    pub fn properties(&self) -> &[Value] {
        &self.properties
    }

    pub(super) fn into_parts(self) -> (Option<Vec<u8>>, Vec<Value>) {
        (self.geometry, self.properties)
    }
}

/// Owned iterator over features.
pub struct GpkgFeatureIterator {
    pub(super) features: std::vec::IntoIter<GpkgFeature>,
}

impl Iterator for GpkgFeatureIterator {
    type Item = GpkgFeature;

    fn next(&mut self) -> Option<Self::Item> {
        self.features.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.features.size_hint()
    }
}

const MAGIC: [u8; 2] = [0x47, 0x50];
const HEADER_LEN: usize = 8;
const FLAG_LITTLE_ENDIAN: u8 = 0b0000_0001;
const FLAG_ENVELOPE_XY: u8 = 0b0000_0010;
const FLAG_EMPTY: u8 = 0b0001_0000;

/// The fixed part of a GeoPackage geometry blob.
// cf. https://www.geopackage.org/spec140/index.html#gpb_format
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct GpkgHeader {
    pub(crate) srs_id: i32,
    /// `[minx, maxx, miny, maxy]` when the blob carries an envelope.
    pub(crate) envelope: Option<[f64; 4]>,
    pub(crate) empty: bool,
    pub(crate) wkb_offset: usize,
}

/// Whether the bytes start like a GeoPackage geometry blob.
pub(crate) fn is_gpkg_blob(b: &[u8]) -> bool {
    b.len() >= HEADER_LEN && b[..2] == MAGIC
}

pub(crate) fn parse_header(b: &[u8]) -> Result<GpkgHeader> {
    if !is_gpkg_blob(b) {
        return Err(SfError::InvalidGpkgGeometryLength {
            len: b.len(),
            minimum: HEADER_LEN,
        });
    }
    let flags = b[3];
    let envelope_size: usize = match flags & 0b0000_1110 {
        0b0000_0000 => 0,  // no envelope
        0b0000_0010 => 32, // [minx, maxx, miny, maxy]
        0b0000_0100 => 48, // [minx, maxx, miny, maxy, minz, maxz]
        0b0000_0110 => 48, // [minx, maxx, miny, maxy, minm, maxm]
        0b0000_1000 => 64, // [minx, maxx, miny, maxy, minz, maxz, minm, maxm]
        _ => return Err(SfError::InvalidGpkgGeometryFlags(flags)),
    };
    let wkb_offset = HEADER_LEN + envelope_size;
    if b.len() < wkb_offset {
        return Err(SfError::InvalidGpkgGeometryEnvelope {
            len: b.len(),
            required: wkb_offset,
        });
    }

    let little_endian = flags & FLAG_LITTLE_ENDIAN != 0;
    let read_f64 = |at: usize| {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&b[at..at + 8]);
        if little_endian {
            f64::from_le_bytes(bytes)
        } else {
            f64::from_be_bytes(bytes)
        }
    };
    let mut srs_bytes = [0u8; 4];
    srs_bytes.copy_from_slice(&b[4..8]);
    let srs_id = if little_endian {
        i32::from_le_bytes(srs_bytes)
    } else {
        i32::from_be_bytes(srs_bytes)
    };
    let envelope = (envelope_size > 0).then(|| {
        [
            read_f64(HEADER_LEN),
            read_f64(HEADER_LEN + 8),
            read_f64(HEADER_LEN + 16),
            read_f64(HEADER_LEN + 24),
        ]
    });

    Ok(GpkgHeader {
        srs_id,
        envelope,
        empty: flags & FLAG_EMPTY != 0,
        wkb_offset,
    })
}

/// Strip GeoPackage header and envelope bytes to access raw WKB.
pub(crate) fn gpkg_blob_to_wkb(b: &[u8]) -> Result<Wkb<'_>> {
    let header = parse_header(b)?;
    Ok(Wkb::try_new(&b[header.wkb_offset..])?)
}

pub(crate) fn gpkg_blob_to_geometry(b: &[u8]) -> Result<Geometry<f64>> {
    let wkb = gpkg_blob_to_wkb(b)?;
    Ok(to_geo_geometry(&wkb))
}

/// Bounds of a blob, read from its envelope when present.
pub(crate) fn gpkg_blob_bounds(b: &[u8]) -> Result<Option<Rect<f64>>> {
    let header = parse_header(b)?;
    if header.empty {
        return Ok(None);
    }
    if let Some([minx, maxx, miny, maxy]) = header.envelope {
        return Ok(Some(Rect::new(
            geo::coord! { x: minx, y: miny },
            geo::coord! { x: maxx, y: maxy },
        )));
    }
    Ok(gpkg_blob_to_geometry(b)?.bounding_rect())
}

/// Encode a geometry as a GeoPackage blob. Empty geometries encode to `None`
/// so they are stored as SQL `NULL`.
///
/// Points are written without an envelope; everything else carries an XY one.
pub(crate) fn geometry_to_gpkg_blob(geometry: &Geometry<f64>, srs_id: i32) -> Result<Option<Vec<u8>>> {
    if is_empty(geometry) {
        return Ok(None);
    }
    let envelope = match geometry {
        Geometry::Point(_) => None,
        other => other.bounding_rect(),
    };

    let mut blob = Vec::with_capacity(HEADER_LEN + 32 + 64);
    let flags = FLAG_LITTLE_ENDIAN | if envelope.is_some() { FLAG_ENVELOPE_XY } else { 0 };
    blob.extend_from_slice(&MAGIC);
    blob.push(0x00); // version 1
    blob.push(flags);
    blob.extend_from_slice(&srs_id.to_le_bytes());
    if let Some(rect) = envelope {
        for v in [rect.min().x, rect.max().x, rect.min().y, rect.max().y] {
            blob.extend_from_slice(&v.to_le_bytes());
        }
    }
    wkb::writer::write_geometry(&mut blob, geometry, &Default::default())?;

    Ok(Some(blob))
}
