//! Dotted version comparison for device software versions (e.g. `13.1.1.4`).

use std::cmp::Ordering;

/// Compare two dotted versions numerically, segment by segment.
///
/// Missing segments count as zero and non-numeric suffixes inside a segment
/// are ignored (`14.1.0.3-0.0.6` compares as `14.1.0.3`).
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let left = segments(left);
    let right = segments(right);
    let len = left.len().max(right.len());
    for i in 0..len {
        let a = left.get(i).copied().unwrap_or(0);
        let b = right.get(i).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// `left < right`.
pub fn version_less_than(left: &str, right: &str) -> bool {
    compare_versions(left, right) == Ordering::Less
}

fn segments(version: &str) -> Vec<u64> {
    let core = version.split(['-', ' ']).next().unwrap_or_default();
    core.split('.')
        .map(|segment| {
            let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_numerically() {
        assert!(version_less_than("9.9", "13.1"));
        assert!(version_less_than("13.1", "13.1.1"));
        assert!(!version_less_than("14.1.0", "14.1"));
        assert_eq!(compare_versions("14.1.0.3-0.0.6", "14.1.0.3"), Ordering::Equal);
        assert_eq!(compare_versions("15.0", "14.9.9"), Ordering::Greater);
    }
}
