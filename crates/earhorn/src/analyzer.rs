//! Spectral feature extraction
//!
//! Converts the tap's current frequency-domain snapshot into a feature
//! vector describing loudness, band energy, spectral centroid, and
//! playing/silence state. Recomputed fresh on every request; nothing here
//! is cached.
//!
//! Frequencies are mapped assuming a fixed 22050 Hz nominal Nyquist,
//! independent of the host's true sample rate. Downstream consumers depend
//! on the exact output of that mapping, so it stays literal.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::host::{AudioGraph, HostError};
use crate::tap::TapState;

/// Fixed nominal Nyquist used for peak-frequency mapping
pub const NOMINAL_NYQUIST_HZ: f64 = 22050.0;

/// Mean magnitude above which the signal counts as playing
pub const PLAYING_THRESHOLD: f64 = 5.0;

/// Mean magnitude below which the signal counts as silent
pub const SILENCE_THRESHOLD: f64 = 1.0;

/// Centroid above this bin index reads as "bright"
pub const BRIGHT_CENTROID: f64 = 500.0;

/// Centroid above this bin index (and below bright) reads as "balanced"
pub const BALANCED_CENTROID: f64 = 200.0;

// Fixed bin sub-ranges for the five bands; bins past 512 belong to no band.
const BASS_BINS: Range<usize> = 0..8;
const LOW_MID_BINS: Range<usize> = 8..32;
const MID_BINS: Range<usize> = 32..128;
const HIGH_MID_BINS: Range<usize> = 128..256;
const TREBLE_BINS: Range<usize> = 256..512;

/// Perceived brightness, derived from the spectral centroid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brightness {
    Bright,
    Balanced,
    Dark,
}

impl Brightness {
    fn from_centroid(centroid: f64) -> Self {
        if centroid > BRIGHT_CENTROID {
            Brightness::Bright
        } else if centroid > BALANCED_CENTROID {
            Brightness::Balanced
        } else {
            Brightness::Dark
        }
    }
}

/// Mean magnitude per fixed frequency band, rounded to integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandEnergies {
    pub bass: u32,
    pub low_mid: u32,
    pub mid: u32,
    pub high_mid: u32,
    pub treble: u32,
}

/// Staleness info for host-side checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Milliseconds since the tap spliced the output connection
    pub age_ms: i64,
    /// Whether a non-empty frequency buffer backs this snapshot
    pub has_data: bool,
}

/// Stateless snapshot of the current spectrum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    /// Always true on a successful analysis
    pub connected: bool,
    pub average: f64,
    pub peak: u8,
    pub peak_frequency_hz: u32,
    pub spectral_centroid: f64,
    pub band_energies: BandEnergies,
    pub is_playing: bool,
    pub is_silent: bool,
    /// Bass/treble band ratio at 2 decimals, or "N/A" when treble is zero
    pub bass_to_treble_ratio: String,
    pub brightness_label: Brightness,
    pub connection_status: ConnectionStatus,
}

/// Errors from spectral analysis
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    /// Expected state before any output connection has been observed
    #[error("Analyzer not connected")]
    NotConnected,

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Pull the current spectrum through the tap and compute its features
///
/// Refills the tap's reusable frequency buffer but leaves every other field
/// of [`TapState`] untouched.
pub fn analyze<G: AudioGraph + ?Sized>(
    graph: &G,
    tap: &mut TapState,
) -> Result<FeatureVector, AnalyzeError> {
    if !tap.connected {
        return Err(AnalyzeError::NotConnected);
    }
    let analyser = tap.analyser.ok_or(AnalyzeError::NotConnected)?;
    let buffer = tap
        .frequency_buffer
        .as_mut()
        .ok_or(AnalyzeError::NotConnected)?;

    graph.read_frequency_data(analyser, buffer)?;

    let mut features = features_from_spectrum(buffer);
    features.connection_status = ConnectionStatus {
        age_ms: graph.now_millis() - tap.connected_at_millis,
        has_data: !buffer.is_empty(),
    };

    debug!(
        average = features.average,
        peak = features.peak,
        centroid = features.spectral_centroid,
        is_playing = features.is_playing,
        "spectrum analyzed"
    );

    Ok(features)
}

/// Compute the feature vector for a raw magnitude spectrum
///
/// `connection_status` is zeroed; [`analyze`] fills it from the tap.
pub fn features_from_spectrum(bins: &[u8]) -> FeatureVector {
    let n = bins.len();
    let total: u64 = bins.iter().map(|&b| b as u64).sum();
    let average = if n == 0 { 0.0 } else { total as f64 / n as f64 };

    let (peak_index, peak) = bins
        .iter()
        .enumerate()
        .fold((0usize, 0u8), |(best_i, best), (i, &b)| {
            if b > best {
                (i, b)
            } else {
                (best_i, best)
            }
        });

    let peak_frequency_hz = if n == 0 {
        0
    } else {
        (peak_index as f64 / n as f64 * NOMINAL_NYQUIST_HZ).round() as u32
    };

    let centroid = if total == 0 {
        0.0
    } else {
        let weighted: u64 = bins
            .iter()
            .enumerate()
            .map(|(i, &b)| i as u64 * b as u64)
            .sum();
        weighted as f64 / total as f64
    };

    let band_energies = BandEnergies {
        bass: band_mean(bins, BASS_BINS),
        low_mid: band_mean(bins, LOW_MID_BINS),
        mid: band_mean(bins, MID_BINS),
        high_mid: band_mean(bins, HIGH_MID_BINS),
        treble: band_mean(bins, TREBLE_BINS),
    };

    let bass_to_treble_ratio = if band_energies.treble > 0 {
        format!(
            "{:.2}",
            band_energies.bass as f64 / band_energies.treble as f64
        )
    } else {
        "N/A".to_string()
    };

    FeatureVector {
        connected: true,
        average: round1(average),
        peak,
        peak_frequency_hz,
        spectral_centroid: round1(centroid),
        band_energies,
        is_playing: average > PLAYING_THRESHOLD,
        is_silent: average < SILENCE_THRESHOLD,
        bass_to_treble_ratio,
        brightness_label: Brightness::from_centroid(centroid),
        connection_status: ConnectionStatus {
            age_ms: 0,
            has_data: !bins.is_empty(),
        },
    }
}

/// Mean magnitude within a bin range, rounded to the nearest integer
fn band_mean(bins: &[u8], range: Range<usize>) -> u32 {
    let end = range.end.min(bins.len());
    if range.start >= end {
        return 0;
    }
    let slice = &bins[range.start..end];
    let sum: u64 = slice.iter().map(|&b| b as u64).sum();
    (sum as f64 / slice.len() as f64).round() as u32
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
