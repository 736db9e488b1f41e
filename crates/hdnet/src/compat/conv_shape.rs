//! # Convolution Shape Utilities
//!
//! Static shape arithmetic for the layers of a volumetric network:
//! "same" padding, non-overlapping pools and transposed convolutions.

/// Symmetric padding which preserves the input size of a stride-1 convolution.
///
/// Only odd kernel sizes have an exact symmetric "same" padding.
///
/// # Panics
///
/// If `kernel_size` is even or zero.
pub fn same_padding(
    kernel_size: usize,
    dilation: usize,
) -> usize {
    assert!(
        kernel_size % 2 == 1,
        "same padding requires an odd kernel_size, got {kernel_size}"
    );
    dilation * (kernel_size - 1) / 2
}

/// Predict the output shape of a non-overlapping ``kernel^D`` pooling.
///
/// Trailing elements which do not fill a whole window are dropped ("valid" pooling).
///
/// # Returns
///
/// An `Option<[usize; D]>`; `None` if any dim would be empty.
pub fn maybe_pool_output_shape<const D: usize>(
    input_shape: [usize; D],
    kernel_size: usize,
) -> Option<[usize; D]> {
    assert!(kernel_size > 0);
    let mut output_shape = input_shape;
    for dim in output_shape.iter_mut() {
        *dim /= kernel_size;
        if *dim == 0 {
            return None;
        }
    }
    Some(output_shape)
}

/// Predict the output shape of a D transposed convolution with ``kernel == stride == scale``.
///
/// With no padding the windows tile the output exactly:
///
/// ```text
/// out = (in - 1)*scale + (scale - 1) + 1 = in * scale
/// ```
///
/// # Returns
///
/// An `Option<[usize; D]>`; `None` if any dim overflows `usize`.
pub fn maybe_conv_transpose_upsample_shape<const D: usize>(
    input_shape: [usize; D],
    scale: usize,
) -> Option<[usize; D]> {
    let mut output_shape = input_shape;
    for dim in output_shape.iter_mut() {
        *dim = dim.checked_mul(scale)?;
    }
    Some(output_shape)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_padding_preserves_size() {
        for dilation in 1..6 {
            let padding = same_padding(3, dilation);
            assert_eq!(padding, dilation);
            // out = in + 2*padding - dilation*(kernel_size-1)
            for size in [3, 5, 8] {
                assert_eq!(size + 2 * padding - dilation * 2, size);
            }
        }
        assert_eq!(same_padding(1, 4), 0);
    }

    #[test]
    #[should_panic(expected = "same padding requires an odd kernel_size")]
    fn test_same_padding_even_kernel() {
        same_padding(2, 1);
    }

    #[test]
    fn test_pool_output_shape() {
        assert_eq!(maybe_pool_output_shape([8, 120, 120], 2), Some([4, 60, 60]));
        assert_eq!(maybe_pool_output_shape([5, 7, 9], 2), Some([2, 3, 4]));
        assert_eq!(maybe_pool_output_shape([1, 8, 8], 2), None);
    }

    #[test]
    fn test_conv_transpose_upsample_shape() {
        assert_eq!(
            maybe_conv_transpose_upsample_shape([2, 30, 30], 4),
            Some([8, 120, 120])
        );
        assert_eq!(
            maybe_conv_transpose_upsample_shape([3, 5, 7], 1),
            Some([3, 5, 7])
        );
        assert_eq!(maybe_conv_transpose_upsample_shape([1, 8, 8], usize::MAX), None);
    }
}
