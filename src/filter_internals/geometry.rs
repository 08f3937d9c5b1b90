//! Closed-form segment geometry of the fuse graph, derived from the key count alone.

use crate::filter_internals::params;

/// Segment layout of the fingerprint table. `array_length` vertices are split into
/// `segment_count + 2` consecutive power-of-two segments, and every key touches one
/// vertex in each of three overlapping bands of `segment_count` segments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterGeometry {
    pub segment_length: u32,
    pub segment_length_mask: u32,
    pub segment_count: u32,
    pub segment_count_length: u32,
    pub array_length: u32,
}

impl FilterGeometry {
    pub fn derive(num_keys: u32) -> FilterGeometry {
        let segment_length = segment_length(num_keys).min(params::MAX_SEGMENT_LENGTH);
        let segment_length_mask = segment_length - 1;

        let capacity = if num_keys > 1 {
            ((num_keys as f64) * size_factor(num_keys)).round() as u32
        } else {
            0
        };

        // Saturates so that degenerate key counts (0 or 1 keys) fall through to a
        // single-segment band instead of underflowing.
        let init_segment_count = capacity.div_ceil(segment_length).saturating_sub(params::ARITY - 1);
        let array_length = (init_segment_count + params::ARITY - 1) * segment_length;

        let segment_count = {
            let proposed = array_length.div_ceil(segment_length);
            if proposed < params::ARITY { 1 } else { proposed - (params::ARITY - 1) }
        };

        let array_length = (segment_count + params::ARITY - 1) * segment_length;
        let segment_count_length = segment_count * segment_length;

        FilterGeometry {
            segment_length,
            segment_length_mask,
            segment_count,
            segment_count_length,
            array_length,
        }
    }
}

// These parameters are very sensitive. Replacing 'floor' by 'round' can substantially affect the construction time.
#[inline(always)]
pub fn segment_length(size: u32) -> u32 {
    if size == 0 {
        return 4;
    }

    1u32 << ((size as f64).ln() / 3.33_f64.ln() + 2.25).floor() as usize
}

#[inline(always)]
pub fn size_factor(size: u32) -> f64 {
    1.125_f64.max(0.875 + 0.25 * 1e6_f64.ln() / (size as f64).ln())
}
