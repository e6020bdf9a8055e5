/// Splits the words of `text` across regions in proportion to `weights`.
///
/// Each region receives at least one word while words remain, and the last
/// region takes everything left over, so concatenating the parts in order
/// reproduces the word sequence exactly. Regions with zero weight are
/// treated as weight one.
pub fn distribute_words(text: &str, weights: &[usize]) -> Vec<String> {
    if weights.is_empty() {
        return Vec::new();
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    let total_weight: usize = weights.iter().map(|weight| (*weight).max(1)).sum();
    let total_words = words.len();

    let mut parts = Vec::with_capacity(weights.len());
    let mut cursor = 0usize;
    for (index, weight) in weights.iter().enumerate() {
        let remaining = total_words - cursor;
        let take = if index + 1 == weights.len() {
            remaining
        } else {
            let share = (total_words * (*weight).max(1)) as f64 / total_weight as f64;
            (share.round() as usize).max(1).min(remaining)
        };
        parts.push(words[cursor..cursor + take].join(" "));
        cursor += take;
    }
    parts
}
