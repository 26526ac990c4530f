/// Levenshtein edit distance over `char`s, two-row O(min(m,n)) space.
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Shorter string on the inner loop.
    let (a, b) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let n = b.len();

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_zero() {
        assert_eq!(levenshtein_distance("teqip", "teqip"), 0);
        assert_eq!(levenshtein_distance("", ""), 0);
    }

    #[test]
    fn empty_string_is_length_of_other() {
        assert_eq!(levenshtein_distance("", "rusa"), 4);
        assert_eq!(levenshtein_distance("rusa", ""), 4);
    }

    #[test]
    fn ocr_confusions_cost_one_each() {
        assert_eq!(levenshtein_distance("teqip", "teqlp"), 1);
        assert_eq!(levenshtein_distance("workshop", "w0rksh0p"), 2);
    }

    #[test]
    fn counts_chars_not_bytes() {
        assert_eq!(levenshtein_distance("₹500", "Rs500"), 2);
    }

    #[test]
    fn commutative() {
        assert_eq!(
            levenshtein_distance("nptel", "nptl"),
            levenshtein_distance("nptl", "nptel")
        );
    }
}
