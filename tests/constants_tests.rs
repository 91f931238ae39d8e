// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use frame_capture::constants::{defaults, encoding, limits};
use frame_capture::storage::zero_padded;

#[test]
fn test_default_naming() {
    assert_eq!(zero_padded(0, defaults::NUM_DIGITS).text, "000000");
    assert!(!defaults::FILE_PREFIX.is_empty());
}

#[test]
fn test_digit_limit_covers_counter_range() {
    // The largest sequence number must fit without overflow at the limit
    let number = zero_padded(u64::MAX, limits::MAX_DIGITS);
    assert!(!number.overflowed);
    assert_eq!(number.text.len(), limits::MAX_DIGITS);
}

#[test]
fn test_encoder_defaults_in_range() {
    assert!((1..=100).contains(&encoding::DEFAULT_JPEG_QUALITY));
    assert_eq!(encoding::MAX_PNG_LEVEL, 9);
}

#[test]
fn test_default_frame_fits_limits() {
    assert!(defaults::FRAME_WIDTH <= limits::MAX_FRAME_DIMENSION);
    assert!(defaults::FRAME_HEIGHT <= limits::MAX_FRAME_DIMENSION);
    assert!(defaults::WORKER_THREADS <= limits::MAX_WORKER_THREADS);
}
