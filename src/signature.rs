//! Perceptual image signatures and their storage/transport codecs.
//!
//! A [`HaarSignature`] is a fixed-size fingerprint of one image: the DC
//! (average luminance) triple plus, per channel, the 40 largest-magnitude
//! wavelet coefficients encoded as signed flat indices. Two codecs exist:
//! a compact textual hash for transport and a 240-byte little-endian blob
//! for the catalog. Both round-trip bit-for-bit.

use std::fmt::Write as _;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};
use crate::haar::{
    largest_coefs, rgb_to_yiq, transform, NUM_CHANNELS, NUM_COEFS, NUM_PIXELS_SQUARED,
};
use crate::resizer;
use crate::types::Score;

/// Catalog blob size: `3 * 40` coefficients as little-endian i16.
pub const SIG_BLOB_LEN: usize = NUM_CHANNELS * NUM_COEFS * 2;

const HASH_PREFIX: &str = "haar_";

// prefix + three f64 bit patterns + 120 coefficients, all hex
const HASH_LEN: usize = HASH_PREFIX.len() + 3 * 16 + NUM_CHANNELS * NUM_COEFS * 4;

#[derive(Debug, Clone, PartialEq)]
pub struct HaarSignature {
    /// Average luminance per channel, roughly in [-1, 1].
    pub avglf: [f64; 3],
    /// Signed coefficient indices, each row sorted ascending. The sign is
    /// the wavelet coefficient's sign; the magnitude is the flat index in
    /// `[1, NUM_PIXELS_SQUARED)`.
    pub sig: [[i16; NUM_COEFS]; NUM_CHANNELS],
}

impl HaarSignature {
    /// Extract a signature from an interleaved RGB8 raster
    /// (`3 * NUM_PIXELS_SQUARED` bytes, row-major). Deterministic.
    pub fn from_rgb_raster(rgb: &[u8]) -> Result<Self> {
        if rgb.len() != 3 * NUM_PIXELS_SQUARED {
            return Err(Error::Param(format!(
                "raster is {} bytes, expected {}",
                rgb.len(),
                3 * NUM_PIXELS_SQUARED
            )));
        }

        let mut channels = rgb_to_yiq(rgb);
        transform(&mut channels);

        let avglf = [channels[0][0], channels[1][0], channels[2][0]];
        let mut sig = [[0i16; NUM_COEFS]; NUM_CHANNELS];
        for (chan, out) in channels.iter().zip(sig.iter_mut()) {
            *out = largest_coefs(chan);
        }

        Ok(Self { avglf, sig })
    }

    /// Decode raw image bytes, resample to the working raster and extract.
    pub fn from_file_content(bytes: &[u8]) -> Result<Self> {
        let raster = resizer::decode_and_resize(bytes)?;
        Self::from_rgb_raster(&raster)
    }

    /// A grayscale source leaves the I and Q DC terms at exactly zero.
    pub fn is_grayscale(&self) -> bool {
        self.avglf[1] == 0.0 && self.avglf[2] == 0.0
    }

    /// Number of channels that carry information: 1 for grayscale, else 3.
    pub fn num_colors(&self) -> usize {
        if self.is_grayscale() {
            1
        } else {
            NUM_CHANNELS
        }
    }

    /// The DC triple narrowed to the score type.
    pub fn avgl(&self) -> [Score; 3] {
        [
            self.avglf[0] as Score,
            self.avglf[1] as Score,
            self.avglf[2] as Score,
        ]
    }

    /// Compact reversible textual form.
    pub fn to_hash(&self) -> String {
        let mut out = String::with_capacity(HASH_LEN);
        out.push_str(HASH_PREFIX);
        for avg in &self.avglf {
            let _ = write!(out, "{:016x}", avg.to_bits());
        }
        for chan in &self.sig {
            for &coef in chan {
                let _ = write!(out, "{:04x}", coef as u16);
            }
        }
        out
    }

    /// Parse the textual form produced by [`to_hash`](Self::to_hash).
    pub fn from_hash(hash: &str) -> Result<Self> {
        let body = hash
            .strip_prefix(HASH_PREFIX)
            .ok_or_else(|| Error::Param(format!("signature hash missing {HASH_PREFIX:?} prefix")))?;
        if hash.len() != HASH_LEN || !body.is_ascii() {
            return Err(Error::Param(format!(
                "signature hash is {} chars, expected {}",
                hash.len(),
                HASH_LEN
            )));
        }

        let mut avglf = [0.0f64; 3];
        for (c, avg) in avglf.iter_mut().enumerate() {
            let bits = u64::from_str_radix(&body[c * 16..(c + 1) * 16], 16)
                .map_err(|_| Error::Param("signature hash is not hex".into()))?;
            *avg = f64::from_bits(bits);
        }

        let coefs = &body[3 * 16..];
        let mut sig = [[0i16; NUM_COEFS]; NUM_CHANNELS];
        for (c, chan) in sig.iter_mut().enumerate() {
            for (k, out) in chan.iter_mut().enumerate() {
                let off = (c * NUM_COEFS + k) * 4;
                let raw = u16::from_str_radix(&coefs[off..off + 4], 16)
                    .map_err(|_| Error::Param("signature hash is not hex".into()))?;
                let coef = raw as i16;
                check_coef_index(coef)
                    .map_err(|msg| Error::Param(format!("signature hash: {msg}")))?;
                *out = coef;
            }
        }

        Ok(Self { avglf, sig })
    }

    /// Catalog storage form: the coefficient matrix as little-endian i16 in
    /// `[channel][k]` order.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = vec![0u8; SIG_BLOB_LEN];
        for (c, chan) in self.sig.iter().enumerate() {
            for (k, &coef) in chan.iter().enumerate() {
                let off = (c * NUM_COEFS + k) * 2;
                LittleEndian::write_i16(&mut blob[off..off + 2], coef);
            }
        }
        blob
    }

    /// Reconstruct a signature from a catalog row's DC triple and blob.
    pub fn from_blob(avglf: [f64; 3], blob: &[u8]) -> Result<Self> {
        if blob.len() != SIG_BLOB_LEN {
            return Err(Error::Data(format!(
                "signature blob is {} bytes, expected {}",
                blob.len(),
                SIG_BLOB_LEN
            )));
        }

        let mut sig = [[0i16; NUM_COEFS]; NUM_CHANNELS];
        for (c, chan) in sig.iter_mut().enumerate() {
            for (k, out) in chan.iter_mut().enumerate() {
                let off = (c * NUM_COEFS + k) * 2;
                let coef = LittleEndian::read_i16(&blob[off..off + 2]);
                check_coef_index(coef).map_err(Error::Data)?;
                *out = coef;
            }
        }

        Ok(Self { avglf, sig })
    }
}

fn check_coef_index(coef: i16) -> std::result::Result<(), String> {
    let magnitude = coef.unsigned_abs() as usize;
    if magnitude == 0 || magnitude >= NUM_PIXELS_SQUARED {
        return Err(format!("coefficient index {coef} out of range"));
    }
    Ok(())
}
