//! Alternate phrasings of a query that found nothing.

/// Produces up to `limit` alternate phrasings of `query`.
///
/// Order of generation:
/// 1. for queries of more than two words, each single-word drop (kept when
///    longer than 3 characters), then the 2-word and 3-word prefixes
/// 2. `and` / `&` swaps, apostrophe removal, whitespace collapse
///
/// Duplicates, blank entries and the input itself are skipped; first-seen
/// order is kept.
///
/// ```
/// use trackfetch_core::search::variations;
///
/// let found = variations("enjoy enjaami dhee arivu", 5);
/// assert_eq!(found[0], "enjaami dhee arivu");
/// assert!(found.len() <= 5);
/// ```
#[must_use]
pub fn variations(query: &str, limit: usize) -> Vec<String> {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    let words: Vec<&str> = collapsed.split(' ').filter(|w| !w.is_empty()).collect();
    let mut candidates: Vec<String> = Vec::new();

    if words.len() > 2 {
        for skip in 0..words.len() {
            let variation = words
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, word)| *word)
                .collect::<Vec<_>>()
                .join(" ");
            if variation.chars().count() > 3 {
                candidates.push(variation);
            }
        }
        candidates.push(words[..2].join(" "));
        candidates.push(words[..3.min(words.len())].join(" "));
    }

    candidates.push(swap_word(&words, "and", "&"));
    candidates.push(swap_word(&words, "&", "and"));
    candidates.push(
        collapsed
            .replace(['\'', '\u{2019}'], "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
    );
    candidates.push(collapsed.clone());

    let input = query.trim();
    let mut seen: Vec<String> = Vec::new();
    for candidate in candidates {
        if seen.len() == limit {
            break;
        }
        let candidate = candidate.trim().to_string();
        if candidate.is_empty() || candidate == input || seen.contains(&candidate) {
            continue;
        }
        seen.push(candidate);
    }
    seen
}

fn swap_word(words: &[&str], from: &str, to: &str) -> String {
    words
        .iter()
        .map(|word| if word.eq_ignore_ascii_case(from) { to } else { *word })
        .collect::<Vec<_>>()
        .join(" ")
}
