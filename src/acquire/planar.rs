//! Interleaved-to-planar pixel reshuffle.

/// Copies interleaved samples (`RGBRGB…`) into planar channel order
/// (`RRR…GGG…BBB…`), byte for byte per component.
///
/// This is a fixed transposition, not a color transform: channel plane
/// `c`, pixel `i` of the output equals channel `c` of source pixel `i`.
pub fn interleaved_to_planar(
    src: &[u8],
    dst: &mut [u8],
    pixels: usize,
    channels: usize,
    bytes_per_channel: usize,
) {
    debug_assert!(src.len() >= pixels * channels * bytes_per_channel);
    debug_assert!(dst.len() >= pixels * channels * bytes_per_channel);

    for i in 0..pixels {
        for c in 0..channels {
            let src_index = (i * channels + c) * bytes_per_channel;
            let dst_index = (pixels * c + i) * bytes_per_channel;
            dst[dst_index..dst_index + bytes_per_channel]
                .copy_from_slice(&src[src_index..src_index + bytes_per_channel]);
        }
    }
}
