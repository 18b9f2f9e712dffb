//! Character-level text similarity.
//!
//! The ratio is `1 - D / (N + M)` where `D` is the length of the shortest
//! insert/delete edit script between the two strings (Myers' O((N+M)·D)
//! algorithm). It is symmetric, 1.0 for identical strings (and for two
//! empty strings) and 0.0 for strings that share no characters.

/// Similarity of two strings in `[0, 1]`.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    bounded_similarity(a, b, 0.0)
}

/// Similarity computed after removing every whitespace character, which
/// isolates structural change from reformatting.
pub fn logic_similarity(a: &str, b: &str) -> f64 {
    similarity_ratio(&strip_whitespace(a), &strip_whitespace(b))
}

/// Like [`similarity_ratio`], but gives up once the ratio is known to be
/// below `floor`. Results at or above `floor` are exact; below it the
/// returned value is an upper bound that is itself below `floor`.
pub fn bounded_similarity(a: &str, b: &str, floor: f64) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let floor = floor.clamp(0.0, 1.0);
    let limit = ((1.0 - floor) * total as f64).floor() as usize;
    match edit_distance(&a, &b, limit) {
        Some(d) => 1.0 - d as f64 / total as f64,
        None => 1.0 - (limit + 1) as f64 / total as f64,
    }
}

pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Length of the shortest insert/delete script turning `a` into `b`, or
/// `None` when it exceeds `limit`.
fn edit_distance<T: PartialEq>(a: &[T], b: &[T], limit: usize) -> Option<usize> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let (a, b) = (&a[prefix..], &b[prefix..]);
    let suffix = a
        .iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count();
    let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        let d = n + m;
        return (d <= limit).then_some(d);
    }

    let max = n + m;
    let offset = max as isize;
    // v[k + offset] holds the furthest x reached on diagonal k.
    let mut v = vec![0usize; 2 * max + 2];

    for d in 0..=max.min(limit) {
        let d = d as isize;
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = (x as isize - k) as usize;
            while x < n && y < m && a[x] == b[y] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                return Some(d as usize);
            }
            k += 2;
        }
    }
    None
}
