//! # ADPCM Decoder
//!
//! Decodes the 4-bit ADPCM stream produced by the recording device into signed
//! 16-bit PCM samples. The device uses the IMA step/index adaptation scheme with
//! an initial predictor of 0 and an initial step index of 0.
//!
//! ## Codeword Layout:
//! ```text
//! bit 3   bit 2   bit 1   bit 0
//! sign    step    step/2  step/4
//! ```
//!
//! ## Byte Layout:
//! Every byte carries two codewords. The high nibble is the earlier sample and
//! the low nibble the later one, so one input byte always yields two samples.

/// Step sizes indexed by the decoder's step index (0..=88).
pub const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14,
    16, 17, 19, 21, 23, 25, 28, 31,
    34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143,
    157, 173, 190, 209, 230, 253, 279, 307,
    337, 371, 408, 449, 494, 544, 598, 658,
    724, 796, 876, 963, 1060, 1166, 1282, 1411,
    1552, 1707, 1878, 2066, 2272, 2499, 2749, 3024,
    3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484,
    7132, 7845, 8630, 9493, 10442, 11487, 12635, 13899,
    15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

/// Step index adjustment for each of the 16 codewords.
pub const INDEX_TABLE: [i8; 16] = [
    -1, -1, -1, -1, 2, 4, 6, 8,
    -1, -1, -1, -1, 2, 4, 6, 8,
];

/// Highest valid step index.
pub const MAX_STEP_INDEX: u8 = (STEP_TABLE.len() - 1) as u8;

const SIGN_BIT: u8 = 0b1000;

/// Decoder state threaded through every codeword.
///
/// ## Rust Concepts:
/// - **Copy**: The state is two small integers, so each step takes it by value
///   and hands back a new one instead of mutating shared fields
/// - **Default**: `DecoderState::default()` is the device's initial state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderState {
    /// Running estimate of the current sample value
    pub predictor: i16,

    /// Index into `STEP_TABLE`, always within 0..=88
    pub step_index: u8,
}

impl DecoderState {
    /// Create a state from raw parts, clamping the step index into range.
    pub fn new(predictor: i16, step_index: u8) -> Self {
        Self {
            predictor,
            step_index: step_index.min(MAX_STEP_INDEX),
        }
    }
}

/// Decode a single 4-bit codeword.
///
/// Only the low four bits of `code` are used. Returns the emitted sample along
/// with the state to use for the next codeword.
pub fn decode_sample(code: u8, state: DecoderState) -> (i16, DecoderState) {
    let code = code & 0x0F;
    let step = STEP_TABLE[state.step_index as usize];

    let mut difference = step >> 3;
    if code & 0b0100 != 0 {
        difference += step;
    }
    if code & 0b0010 != 0 {
        difference += step >> 1;
    }
    if code & 0b0001 != 0 {
        difference += step >> 2;
    }

    let predictor = if code & SIGN_BIT != 0 {
        state.predictor as i32 - difference
    } else {
        state.predictor as i32 + difference
    };
    let predictor = predictor.clamp(i16::MIN as i32, i16::MAX as i32) as i16;

    let step_index = (state.step_index as i32 + INDEX_TABLE[code as usize] as i32)
        .clamp(0, MAX_STEP_INDEX as i32) as u8;

    (predictor, DecoderState { predictor, step_index })
}

/// Decode a whole ADPCM payload starting from the initial state.
///
/// ## Stride:
/// Every byte is consumed, producing exactly `2 * data.len()` samples.
///
/// ## Example:
/// ```text
/// [0x00, 0x08] -> four samples, all zero (difference is 0 at step index 0)
/// ```
pub fn decode(data: &[u8]) -> Vec<i16> {
    decode_from(data, DecoderState::default()).0
}

/// Decode a payload from an arbitrary state, returning the samples and the
/// state after the last codeword.
pub fn decode_from(data: &[u8], initial: DecoderState) -> (Vec<i16>, DecoderState) {
    let mut samples = Vec::with_capacity(data.len() * 2);
    let mut state = initial;

    for &byte in data {
        for code in [byte >> 4, byte & 0x0F] {
            let (sample, next) = decode_sample(code, state);
            samples.push(sample);
            state = next;
        }
    }

    (samples, state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tables_shape() {
        assert_eq!(STEP_TABLE.len(), 89);
        assert_eq!(STEP_TABLE[0], 7);
        assert_eq!(STEP_TABLE[88], 32767);
        assert!(STEP_TABLE.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(INDEX_TABLE[..8], INDEX_TABLE[8..]);
    }

    #[test]
    fn test_zero_codeword_from_initial_state() {
        let (sample, next) = decode_sample(0, DecoderState::default());
        assert_eq!(sample, 0);
        assert_eq!(next, DecoderState { predictor: 0, step_index: 0 });
    }

    #[test]
    fn test_sign_bit_without_magnitude() {
        let (sample, next) = decode_sample(8, DecoderState::new(100, 0));
        assert_eq!(sample, 100);
        assert_eq!(next.predictor, 100);
        assert_eq!(next.step_index, 0);
    }

    #[test]
    fn test_magnitude_bits() {
        // step 7: 7>>3 = 0, +7, +3, +1
        let (sample, next) = decode_sample(0b0111, DecoderState::default());
        assert_eq!(sample, 11);
        assert_eq!(next.step_index, 8);

        let (sample, _) = decode_sample(0b1111, DecoderState::default());
        assert_eq!(sample, -11);
    }

    #[test]
    fn test_predictor_clamps() {
        let (sample, _) = decode_sample(0b0111, DecoderState::new(i16::MAX, 88));
        assert_eq!(sample, i16::MAX);

        let (sample, _) = decode_sample(0b1111, DecoderState::new(i16::MIN, 88));
        assert_eq!(sample, i16::MIN);
    }

    #[test]
    fn test_step_index_clamps_high() {
        let (_, next) = decode_sample(7, DecoderState::new(0, 85));
        assert_eq!(next.step_index, 88);
    }

    #[test]
    fn test_high_nibble_decoded_first() {
        // 0x70: high nibble 7 then low nibble 0
        let samples = decode(&[0x70]);
        assert_eq!(samples, vec![11, 11 + (16 >> 3)]);

        // 0x07: low nibble 7 decoded after a zero codeword
        let samples = decode(&[0x07]);
        assert_eq!(samples, vec![0, 11]);
    }

    #[test]
    fn test_every_byte_is_decoded() {
        let data = [0x11, 0x22, 0x33];
        let samples = decode(&data);
        assert_eq!(samples.len(), 6);

        // Dropping every other byte would have produced a different tail
        let skipped = decode(&[0x11, 0x33]);
        assert_ne!(samples[4..], skipped[2..]);
    }

    #[test]
    fn test_empty_input() {
        assert!(decode(&[]).is_empty());
    }

    #[test]
    fn test_decode_from_carries_state() {
        let data = [0x74, 0x21, 0x9C, 0x0F];
        let (first, mid) = decode_from(&data[..2], DecoderState::default());
        let (second, _) = decode_from(&data[2..], mid);

        let mut joined = first;
        joined.extend(second);
        assert_eq!(joined, decode(&data));
    }

    proptest! {
        #[test]
        fn prop_decode_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(decode(&data), decode(&data));
        }

        #[test]
        fn prop_output_length_is_two_per_byte(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(decode(&data).len(), data.len() * 2);
        }

        #[test]
        fn prop_step_index_stays_in_range(
            codes in proptest::collection::vec(0u8..16, 0..1024),
            predictor in any::<i16>(),
            step_index in 0u8..=88,
        ) {
            let mut state = DecoderState::new(predictor, step_index);
            for code in codes {
                let (sample, next) = decode_sample(code, state);
                prop_assert!(next.step_index <= MAX_STEP_INDEX);
                prop_assert_eq!(sample, next.predictor);
                state = next;
            }
        }
    }
}
