use std::cmp::Ordering;

/// Numeric components of a plain release id (`1.12.2` → `[1, 12, 2]`).
///
/// Returns `None` for snapshots, pre-releases and anything that is not
/// purely dotted digits.
pub fn parse_release(id: &str) -> Option<Vec<u32>> {
    if id.is_empty() {
        return None;
    }
    id.split('.').map(|part| part.parse::<u32>().ok()).collect()
}

/// Compare two release ids component by component; missing trailing
/// components count as zero so `1.13` == `1.13.0`.
pub fn compare_releases(left: &[u32], right: &[u32]) -> Ordering {
    let len = left.len().max(right.len());
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// Compare two version strings, falling back to lexical order when either
/// side is not a plain release id.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    match (parse_release(left), parse_release(right)) {
        (Some(l), Some(r)) => compare_releases(&l, &r),
        _ => left.cmp(right),
    }
}
