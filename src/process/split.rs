/// Split `items` into `parts` contiguous slices whose lengths differ by at
/// most one. Part `i` covers `[i*len/parts, (i+1)*len/parts)`.
/// `parts == 0` is treated as 1.
pub fn split_into<T>(items: &[T], parts: usize) -> Vec<&[T]> {
    let parts = parts.max(1);
    let len = items.len();
    (0..parts)
        .map(|i| &items[i * len / parts..(i + 1) * len / parts])
        .collect()
}

/// `round(len / threshold)` with ties to even, at least 1.
pub fn part_count(len: usize, threshold: usize) -> usize {
    let threshold = threshold.max(1);
    let (q, r) = (len / threshold, len % threshold);
    let rounded = match (2 * r).cmp(&threshold) {
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => q + (q % 2),
        std::cmp::Ordering::Less => q,
    };
    rounded.max(1)
}
