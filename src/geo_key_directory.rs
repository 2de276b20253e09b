use std::collections::HashMap;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::error::{Result, TifgridError};
use crate::ifd::{GEO_ASCII_PARAMS, GEO_DOUBLE_PARAMS};

#[derive(Clone, Copy, Debug, PartialEq, TryFromPrimitive, IntoPrimitive, Eq, Hash)]
#[repr(u16)]
pub enum GeoKeyTag {
    // GeoTIFF configuration keys
    ModelType = 1024,
    RasterType = 1025,
    Citation = 1026,

    // Geodetic CRS Parameter Keys
    GeographicType = 2048,
    GeogCitation = 2049,
    GeogGeodeticDatum = 2050,
    GeogPrimeMeridian = 2051,
    GeogLinearUnits = 2052,
    GeogLinearUnitSize = 2053,
    GeogAngularUnits = 2054,
    GeogAngularUnitSize = 2055,
    GeogEllipsoid = 2056,
    GeogSemiMajorAxis = 2057,
    GeogSemiMinorAxis = 2058,
    GeogInvFlattening = 2059,
    GeogAzimuthUnits = 2060,
    GeogPrimeMeridianLong = 2061,

    // Projected CRS Parameter Keys
    ProjectedType = 3072,
    ProjCitation = 3073,
    Projection = 3074,
    ProjCoordTrans = 3075,
    ProjLinearUnits = 3076,
    ProjLinearUnitSize = 3077,
    ProjStdParallel1 = 3078,
    ProjStdParallel2 = 3079,
    ProjNatOriginLong = 3080,
    ProjNatOriginLat = 3081,
    ProjFalseEasting = 3082,
    ProjFalseNorthing = 3083,
    ProjFalseOriginLong = 3084,
    ProjFalseOriginLat = 3085,
    ProjFalseOriginEasting = 3086,
    ProjFalseOriginNorthing = 3087,
    ProjCenterLong = 3088,
    ProjCenterLat = 3089,
    ProjCenterEasting = 3090,
    ProjCenterNorthing = 3091,
    ProjScaleAtNatOrigin = 3092,
    ProjScaleAtCenter = 3093,
    ProjAzimuthAngle = 3094,
    ProjStraightVertPoleLong = 3095,

    // Vertical CRS Parameter Keys (4096-5119)
    Vertical = 4096,
    VerticalCitation = 4097,
    VerticalDatum = 4098,
    VerticalUnits = 4099,
}

/// `GTRasterTypeGeoKey` value for pixel-is-area rasters.
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Value of a single GeoKey after resolving its storage location.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoKeyValue {
    Short(u16),
    Double(Vec<f64>),
    Ascii(String),
}

/// http://docs.opengeospatial.org/is/19-008r4/19-008r4.html#_requirements_class_geokeydirectorytag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoKeyDirectory {
    keys: HashMap<GeoKeyTag, GeoKeyValue>,
}

impl GeoKeyDirectory {
    /// Parse the raw `GeoKeyDirectoryTag` shorts, resolving keys stored in
    /// the double and ASCII parameter tags.
    pub(crate) fn from_tags(
        directory: &[u16],
        double_params: Option<&[f64]>,
        ascii_params: Option<&str>,
    ) -> Result<Self> {
        if directory.len() < 4 {
            return Err(TifgridError::GeoKey("truncated key directory header".into()));
        }
        let key_count = usize::from(directory[3]);
        let entries = &directory[4..];
        if entries.len() < key_count * 4 {
            return Err(TifgridError::GeoKey(format!(
                "directory declares {key_count} keys but holds {} entries",
                entries.len() / 4
            )));
        }

        let mut keys = HashMap::with_capacity(key_count);
        for entry in entries.chunks_exact(4).take(key_count) {
            let [id, location, count, value_offset] = [entry[0], entry[1], entry[2], entry[3]];
            let Ok(tag) = GeoKeyTag::try_from(id) else {
                log::trace!("skipping unknown GeoKey {id}");
                continue;
            };
            let start = usize::from(value_offset);
            let end = start + usize::from(count);
            let value = match location {
                0 => GeoKeyValue::Short(value_offset),
                GEO_DOUBLE_PARAMS => {
                    let doubles = double_params
                        .and_then(|params| params.get(start..end))
                        .ok_or_else(|| {
                            TifgridError::GeoKey(format!("{tag:?} points past double params"))
                        })?;
                    GeoKeyValue::Double(doubles.to_vec())
                }
                GEO_ASCII_PARAMS => {
                    let text = ascii_params
                        .and_then(|params| params.get(start..end))
                        .ok_or_else(|| {
                            TifgridError::GeoKey(format!("{tag:?} points past ASCII params"))
                        })?;
                    GeoKeyValue::Ascii(text.trim_end_matches(['|', '\0']).to_string())
                }
                other => {
                    log::trace!("skipping {tag:?} stored in unsupported tag {other}");
                    continue;
                }
            };
            keys.insert(tag, value);
        }

        Ok(Self { keys })
    }

    pub fn get(&self, tag: GeoKeyTag) -> Option<&GeoKeyValue> {
        self.keys.get(&tag)
    }

    fn short(&self, tag: GeoKeyTag) -> Option<u16> {
        match self.keys.get(&tag) {
            Some(GeoKeyValue::Short(value)) => Some(*value),
            _ => None,
        }
    }

    fn ascii(&self, tag: GeoKeyTag) -> Option<&str> {
        match self.keys.get(&tag) {
            Some(GeoKeyValue::Ascii(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }

    /// Return the EPSG code representing the crs of the image
    pub fn epsg_code(&self) -> Option<u16> {
        self.short(GeoKeyTag::ProjectedType)
            .or_else(|| self.short(GeoKeyTag::GeographicType))
    }

    /// Free-text description of the coordinate system, if any.
    pub fn citation(&self) -> Option<&str> {
        self.ascii(GeoKeyTag::Citation)
            .or_else(|| self.ascii(GeoKeyTag::ProjCitation))
            .or_else(|| self.ascii(GeoKeyTag::GeogCitation))
    }

    /// Projection string stored in the directory: the citation, else
    /// `EPSG:<code>`, else empty.
    pub fn projection(&self) -> String {
        match (self.citation(), self.epsg_code()) {
            (Some(citation), _) => citation.to_string(),
            (None, Some(code)) => format!("EPSG:{code}"),
            (None, None) => String::new(),
        }
    }

    /// Encode `projection` as a key directory and its ASCII params.
    pub(crate) fn encode_projection(projection: &str) -> (Vec<u16>, String) {
        let ascii = format!("{projection}|");
        let mut directory = vec![
            1, // KeyDirectoryVersion
            1, // KeyRevision
            0, // MinorRevision
            2, // NumberOfKeys
        ];
        directory.extend_from_slice(&[GeoKeyTag::RasterType.into(), 0, 1, RASTER_PIXEL_IS_AREA]);
        directory.extend_from_slice(&[
            GeoKeyTag::Citation.into(),
            GEO_ASCII_PARAMS,
            ascii.len() as u16,
            0,
        ]);
        (directory, ascii)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_short_double_and_ascii_keys() {
        let directory = [
            1, 1, 0, 4, //
            1024, 0, 1, 1, //
            2057, GEO_DOUBLE_PARAMS, 1, 1, //
            3072, 0, 1, 32637, //
            3073, GEO_ASCII_PARAMS, 22, 0,
        ];
        let doubles = [0.0, 6_378_137.0];
        let parsed = GeoKeyDirectory::from_tags(
            &directory,
            Some(&doubles[..]),
            Some("WGS 84 / UTM zone 37N|"),
        )
        .unwrap();

        assert_eq!(parsed.get(GeoKeyTag::ModelType), Some(&GeoKeyValue::Short(1)));
        assert_eq!(
            parsed.get(GeoKeyTag::GeogSemiMajorAxis),
            Some(&GeoKeyValue::Double(vec![6_378_137.0]))
        );
        assert_eq!(parsed.epsg_code(), Some(32637));
        assert_eq!(parsed.projection(), "WGS 84 / UTM zone 37N");
    }

    #[test]
    fn falls_back_to_epsg_code() {
        let directory = [1, 1, 0, 1, 2048, 0, 1, 4326];
        let parsed = GeoKeyDirectory::from_tags(&directory, None, None).unwrap();
        assert_eq!(parsed.citation(), None);
        assert_eq!(parsed.projection(), "EPSG:4326");
    }

    #[test]
    fn encoded_projection_parses_back() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 37N",GEOGCS["WGS 84"]]"#;
        let (directory, ascii) = GeoKeyDirectory::encode_projection(wkt);
        let parsed = GeoKeyDirectory::from_tags(&directory, None, Some(&ascii)).unwrap();
        assert_eq!(parsed.projection(), wkt);
        assert_eq!(parsed.get(GeoKeyTag::RasterType), Some(&GeoKeyValue::Short(1)));
    }

    #[test]
    fn rejects_out_of_range_references() {
        let directory = [1, 1, 0, 1, 1026, GEO_ASCII_PARAMS, 40, 0];
        assert!(GeoKeyDirectory::from_tags(&directory, None, Some("short|")).is_err());
        assert!(GeoKeyDirectory::from_tags(&[1, 1, 0], None, None).is_err());
    }
}
