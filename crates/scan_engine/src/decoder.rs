//! Depth buffer decoder.
//!
//! Each pixel packs a non-linear device depth `d` in `[0, 1]` as base-255
//! digits (`d = r/255 + g/255^2 + b/255^3 + a/255^4`), 0 at the near plane
//! and 1 at the far plane. Decoding is per-pixel and runs on rayon.

use contracts::{ClipPlanes, DepthBuffer, LidarError, RangeBounds, DEPTH_PIXEL_BYTES};
use rayon::prelude::*;
use tracing::instrument;

const DIGIT: f64 = 255.0;

/// Unpack the device depth stored in one RGBA pixel
#[inline]
pub fn decode_device_depth(pixel: &[u8]) -> f64 {
    f64::from(pixel[0]) / DIGIT
        + f64::from(pixel[1]) / (DIGIT * DIGIT)
        + f64::from(pixel[2]) / (DIGIT * DIGIT * DIGIT)
        + f64::from(pixel[3]) / (DIGIT * DIGIT * DIGIT * DIGIT)
}

/// Pack a device depth into RGBA (inverse of [`decode_device_depth`])
pub fn encode_device_depth(depth: f64) -> [u8; 4] {
    let depth = if depth.is_nan() { 1.0 } else { depth.clamp(0.0, 1.0) };
    if depth >= 1.0 {
        return [255, 0, 0, 0];
    }

    let mut pixel = [0u8; 4];
    let mut rest = depth;
    for byte in &mut pixel {
        rest *= DIGIT;
        let digit = rest.floor().min(DIGIT - 1.0);
        *byte = digit as u8;
        rest -= digit;
    }
    pixel
}

/// Perspective device depth -> planar distance from the camera
#[inline]
pub fn linearize_depth(device_depth: f64, clip: ClipPlanes) -> f64 {
    if device_depth >= 1.0 {
        return clip.far;
    }
    let d = device_depth.max(0.0);
    clip.near * clip.far / (clip.far - d * (clip.far - clip.near))
}

/// Planar distance -> perspective device depth (inverse of [`linearize_depth`])
pub fn device_depth_from_linear(distance: f64, clip: ClipPlanes) -> f64 {
    if !distance.is_finite() || distance >= clip.far {
        return 1.0;
    }
    if distance <= clip.near {
        return 0.0;
    }
    clip.far * (distance - clip.near) / (distance * (clip.far - clip.near))
}

/// Decode a readback into linear depth, one value per pixel
///
/// Values are clamped to `range`; pixels at or beyond the far plane come out
/// as `clip.far` (no hit).
pub fn decode(
    buffer: &DepthBuffer,
    clip: ClipPlanes,
    range: RangeBounds,
) -> Result<Vec<f64>, LidarError> {
    let mut depth = Vec::new();
    decode_into(buffer, clip, range, &mut depth)?;
    Ok(depth)
}

/// Like [`decode`] but reuses `out`
#[instrument(
    level = "trace",
    name = "decoder_decode",
    skip(buffer, out),
    fields(segment = buffer.segment, width = buffer.width, height = buffer.height)
)]
pub fn decode_into(
    buffer: &DepthBuffer,
    clip: ClipPlanes,
    range: RangeBounds,
    out: &mut Vec<f64>,
) -> Result<(), LidarError> {
    let expected = buffer.expected_len();
    if buffer.data.len() != expected {
        return Err(LidarError::malformed_buffer(
            buffer.segment,
            expected,
            buffer.data.len(),
        ));
    }

    out.clear();
    out.resize(buffer.width * buffer.height, 0.0);
    out.par_iter_mut()
        .zip(buffer.data.par_chunks_exact(DEPTH_PIXEL_BYTES))
        .for_each(|(value, pixel)| {
            let linear = linearize_depth(decode_device_depth(pixel), clip);
            *value = range.clamp(linear);
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn clip() -> ClipPlanes {
        ClipPlanes {
            near: 0.05,
            far: 30.0,
        }
    }

    fn range() -> RangeBounds {
        RangeBounds::new(0.1, 30.0)
    }

    fn make_buffer(depths: &[f64], width: usize, height: usize) -> DepthBuffer {
        let data: Vec<u8> = depths
            .iter()
            .flat_map(|z| encode_device_depth(device_depth_from_linear(*z, clip())))
            .collect();
        DepthBuffer {
            segment: 0,
            width,
            height,
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_encode_decode_device_depth() {
        for d in [0.0, 0.25, 0.5, 0.987_654_321, 0.999_999] {
            let decoded = decode_device_depth(&encode_device_depth(d));
            assert!((decoded - d).abs() < 1e-9, "{d} -> {decoded}");
        }
        assert_eq!(decode_device_depth(&encode_device_depth(1.0)), 1.0);
        assert_eq!(decode_device_depth(&encode_device_depth(f64::NAN)), 1.0);
    }

    #[test]
    fn test_linearize_endpoints() {
        assert!((linearize_depth(0.0, clip()) - 0.05).abs() < 1e-12);
        assert_eq!(linearize_depth(1.0, clip()), 30.0);
        let d = device_depth_from_linear(7.5, clip());
        assert!((linearize_depth(d, clip()) - 7.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_recovers_distances() {
        let depths = [1.0, 2.5, 10.0, 29.0, 0.5, 3.0];
        let buffer = make_buffer(&depths, 3, 2);
        let decoded = decode(&buffer, clip(), range()).unwrap();

        assert_eq!(decoded.len(), 6);
        for (z, d) in depths.iter().zip(&decoded) {
            // 32-bit depth precision degrades towards the far plane
            assert!((z - d).abs() < 1e-3 * z, "{z} vs {d}");
        }
    }

    #[test]
    fn test_decode_clamps_to_range() {
        // inside the near plane and beyond the far plane
        let buffer = make_buffer(&[0.06, 100.0], 2, 1);
        let decoded = decode(&buffer, clip(), range()).unwrap();
        assert_eq!(decoded[0], 0.1);
        assert_eq!(decoded[1], 30.0);
        assert!(decoded.iter().all(|d| range().contains(*d)));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let buffer = DepthBuffer {
            segment: 4,
            width: 4,
            height: 2,
            data: Bytes::from(vec![0u8; 30]),
        };
        match decode(&buffer, clip(), range()) {
            Err(LidarError::MalformedBuffer {
                segment,
                expected,
                actual,
            }) => {
                assert_eq!(segment, 4);
                assert_eq!(expected, 32);
                assert_eq!(actual, 30);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_decode_into_reuses_allocation() {
        let buffer = make_buffer(&[1.0; 64], 8, 8);
        let mut out = Vec::with_capacity(64);
        let ptr = out.as_ptr();
        decode_into(&buffer, clip(), range(), &mut out).unwrap();
        assert_eq!(out.len(), 64);
        assert_eq!(out.as_ptr(), ptr);
    }
}
