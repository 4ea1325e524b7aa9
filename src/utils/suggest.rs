fn normalize_token(value: &str) -> Vec<char> {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn edit_distance(a: &[char], b: &[char]) -> usize {
    if a == b {
        return 0;
    }
    if a.is_empty() || b.is_empty() {
        return a.len().max(b.len());
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn contains_run(haystack: &[char], needle: &[char]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn score(input: &[char], candidate: &[char]) -> Option<usize> {
    if input.is_empty() || candidate.is_empty() {
        return None;
    }
    if input == candidate {
        return Some(0);
    }
    if contains_run(candidate, input) || contains_run(input, candidate) {
        return Some(1);
    }
    Some(edit_distance(input, candidate))
}

fn max_distance(len: usize) -> usize {
    match len {
        0 => 0,
        1..=4 => 1,
        5..=8 => 2,
        _ => ((len as f32) * 0.35).floor().max(3.0) as usize,
    }
}

/// Ranks `candidates` by similarity to `input`, closest first.
pub fn suggest<'a, I>(input: &str, candidates: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = normalize_token(input);
    if needle.is_empty() {
        return Vec::new();
    }
    let allowed = max_distance(needle.len());

    let mut scored: Vec<(&str, usize)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let distance = score(&needle, &normalize_token(candidate))?;
            (distance <= allowed).then_some((candidate, distance))
        })
        .collect();

    scored.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then_with(|| a.0.len().cmp(&b.0.len()))
            .then_with(|| a.0.cmp(b.0))
    });
    scored.dedup_by(|a, b| a.0 == b.0);

    scored
        .into_iter()
        .take(limit.max(1))
        .map(|(candidate, _)| candidate.to_string())
        .collect()
}
