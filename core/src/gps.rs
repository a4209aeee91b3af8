use std::io::Cursor;

use exif::{Exif, In, Reader, Tag, Value};
use thiserror::Error;

use crate::Location;

/// Divisors for degrees, minutes and seconds
const DMS_DIVISION: [f64; 3] = [1.0, 60.0, 3600.0];

/// Reasons why a location could not be extracted from an image
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExifError {
    /// The image has no EXIF data, no GPS tags or unusable GPS values
    #[error("image does not carry GPS location data")]
    NoLocationData,

    /// The payload is not a decodable image
    #[error("unable to decode image: {0}")]
    Decode(String),
}

/// Extracts the location where a photo was taken from its binary contents.
/// Implementations must be deterministic and free of side effects.
pub trait GpsReader: Send + Sync {
    fn extract_gps(&self, image: &[u8]) -> Result<Location, ExifError>;
}

/// A [`GpsReader`] that reads the GPS tags of a JPEG's EXIF data
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifGpsReader;

impl GpsReader for ExifGpsReader {
    fn extract_gps(&self, image: &[u8]) -> Result<Location, ExifError> {
        let exif = Reader::new()
            .read_from_container(&mut Cursor::new(image))
            .map_err(|err| match err {
                exif::Error::NotFound(_) | exif::Error::BlankValue(_) => ExifError::NoLocationData,
                err => ExifError::Decode(err.to_string()),
            })?;

        let lat = coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
        let lng = coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;

        let location = Location::new(lat, lng);
        if !location.is_valid() {
            return Err(ExifError::NoLocationData);
        }
        Ok(location)
    }
}

/// Reads a coordinate given as degrees, minutes and seconds. The coordinate
/// is negated if the reference tag starts with `negative_ref`.
fn coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: u8) -> Result<f64, ExifError> {
    let field = exif
        .get_field(tag, In::PRIMARY)
        .ok_or(ExifError::NoLocationData)?;
    let dms = match &field.value {
        Value::Rational(v) => v.iter().map(|r| r.to_f64()).collect::<Vec<_>>(),
        Value::SRational(v) => v.iter().map(|r| r.to_f64()).collect::<Vec<_>>(),
        _ => return Err(ExifError::NoLocationData),
    };
    if dms.is_empty() || dms.len() > 3 {
        return Err(ExifError::NoLocationData);
    }
    let abs = dms
        .iter()
        .zip(DMS_DIVISION)
        .map(|(x, d)| x / d)
        .sum::<f64>();

    let sign = match exif.get_field(ref_tag, In::PRIMARY).map(|f| &f.value) {
        Some(Value::Ascii(v)) => match v.first().and_then(|s| s.first()) {
            Some(c) if c.eq_ignore_ascii_case(&negative_ref) => -1.0,
            Some(_) => 1.0,
            None => return Err(ExifError::NoLocationData),
        },
        _ => return Err(ExifError::NoLocationData),
    };

    Ok(sign * abs)
}

/// Builders for minimal JPEG files used in tests
#[cfg(test)]
pub(crate) mod test_images {
    fn push_u16(buf: &mut Vec<u8>, v: u16) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    fn push_entry(buf: &mut Vec<u8>, tag: u16, typ: u16, count: u32, value: [u8; 4]) {
        push_u16(buf, tag);
        push_u16(buf, typ);
        push_u32(buf, count);
        buf.extend_from_slice(&value);
    }

    /// Converts decimal degrees to degrees, minutes and seconds expressed as
    /// rationals
    fn dms(v: f64) -> [(u32, u32); 3] {
        let v = v.abs();
        let deg = v.trunc();
        let min = ((v - deg) * 60.0).trunc();
        let sec = ((v - deg) * 60.0 - min) * 60.0;
        [
            (deg as u32, 1),
            (min as u32, 1),
            ((sec * 10_000.0).round() as u32, 10_000),
        ]
    }

    /// A little-endian TIFF structure with an IFD0 that only points to a GPS
    /// IFD containing latitude and longitude
    fn gps_tiff(lat: f64, lng: f64) -> Vec<u8> {
        const GPS_IFD: u32 = 8 + 2 + 12 + 4;
        const LAT_DATA: u32 = GPS_IFD + 2 + 4 * 12 + 4;
        const LNG_DATA: u32 = LAT_DATA + 24;

        let lat_ref = if lat < 0.0 { b'S' } else { b'N' };
        let lng_ref = if lng < 0.0 { b'W' } else { b'E' };

        let mut buf = b"II".to_vec();
        push_u16(&mut buf, 42);
        push_u32(&mut buf, 8);

        // IFD0: GPSInfo pointer
        push_u16(&mut buf, 1);
        push_entry(&mut buf, 0x8825, 4, 1, GPS_IFD.to_le_bytes());
        push_u32(&mut buf, 0);

        // GPS IFD
        push_u16(&mut buf, 4);
        push_entry(&mut buf, 0x0001, 2, 2, [lat_ref, 0, 0, 0]);
        push_entry(&mut buf, 0x0002, 5, 3, LAT_DATA.to_le_bytes());
        push_entry(&mut buf, 0x0003, 2, 2, [lng_ref, 0, 0, 0]);
        push_entry(&mut buf, 0x0004, 5, 3, LNG_DATA.to_le_bytes());
        push_u32(&mut buf, 0);

        for (num, denom) in dms(lat).into_iter().chain(dms(lng)) {
            push_u32(&mut buf, num);
            push_u32(&mut buf, denom);
        }

        buf
    }

    /// A little-endian TIFF structure whose IFD0 only contains an orientation
    /// tag
    fn orientation_tiff() -> Vec<u8> {
        let mut buf = b"II".to_vec();
        push_u16(&mut buf, 42);
        push_u32(&mut buf, 8);
        push_u16(&mut buf, 1);
        push_entry(&mut buf, 0x0112, 3, 1, [1, 0, 0, 0]);
        push_u32(&mut buf, 0);
        buf
    }

    fn jpeg_with_app1(tiff: &[u8], padding: usize) -> Vec<u8> {
        let mut buf = vec![0xff, 0xd8, 0xff, 0xe1];
        buf.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
        buf.extend_from_slice(b"Exif\0\0");
        buf.extend_from_slice(tiff);
        buf.extend((0..padding).map(|i| (i % 251) as u8));
        buf.extend_from_slice(&[0xff, 0xd9]);
        buf
    }

    /// A JPEG carrying the given location, followed by `padding` bytes of
    /// filler data
    pub fn jpeg_with_gps(lat: f64, lng: f64, padding: usize) -> Vec<u8> {
        jpeg_with_app1(&gps_tiff(lat, lng), padding)
    }

    /// A JPEG with EXIF data but without GPS tags
    pub fn jpeg_without_gps() -> Vec<u8> {
        jpeg_with_app1(&orientation_tiff(), 16)
    }

    /// A JPEG without any EXIF data
    pub fn jpeg_without_exif() -> Vec<u8> {
        let mut buf = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
        buf.extend_from_slice(b"JFIF\0");
        buf.extend_from_slice(&[1, 1, 0, 0, 1, 0, 1, 0, 0]);
        buf.extend_from_slice(&[0xff, 0xd9]);
        buf
    }
}
