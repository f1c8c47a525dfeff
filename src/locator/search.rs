//! Exact byte-substring search

/// Start offsets of every occurrence of `needle`, overlapping ones included
///
/// `needle` must be non-empty.
pub fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    let first = needle[0];
    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| window[0] == first && *window == needle)
        .map(|(offset, _)| offset)
        .collect()
}

/// Occurrences of `needle` that are not part of an occurrence of `replacement`
///
/// When a replacement embeds its own match text (`Hello` → `Hello!`), the
/// embedded copy is an already-patched site and must not be matched again.
pub fn find_unapplied(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<usize> {
    let occurrences = find_all(haystack, needle);
    let inner = find_all(replacement, needle);
    if inner.is_empty() || occurrences.is_empty() {
        return occurrences;
    }

    let applied_sites = find_all(haystack, replacement);
    occurrences
        .into_iter()
        .filter(|&offset| {
            !inner.iter().any(|&k| {
                offset >= k && applied_sites.binary_search(&(offset - k)).is_ok()
            })
        })
        .collect()
}

/// Whether `needle` occurs anywhere in `haystack`
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty()
        && needle.len() <= haystack.len()
        && haystack.windows(needle.len()).any(|window| window == needle)
}
