//! Valence-lexicon scorer for financial headline text. Same shape as the
//! classic VADER approach: per-token valences, negation flips, and a
//! square-root normalization into [-1, 1].

/// Token valences, roughly on VADER's -4..+4 scale, trimmed to the
/// vocabulary that actually shows up in market headlines.
const LEXICON: &[(&str, f64)] = &[
    ("soars", 2.4),
    ("soar", 2.4),
    ("surge", 2.1),
    ("surges", 2.1),
    ("rally", 1.9),
    ("rallies", 1.9),
    ("breakout", 1.8),
    ("upgrade", 1.8),
    ("upgraded", 1.8),
    ("outperform", 1.7),
    ("beats", 1.6),
    ("beat", 1.5),
    ("jumps", 1.6),
    ("jump", 1.6),
    ("bullish", 2.0),
    ("record", 1.2),
    ("profit", 1.4),
    ("profits", 1.4),
    ("gains", 1.3),
    ("gain", 1.3),
    ("growth", 1.3),
    ("strong", 1.1),
    ("buy", 0.9),
    ("dividend", 0.6),
    ("wins", 1.2),
    ("approval", 1.4),
    ("expands", 1.0),
    ("bankruptcy", -3.0),
    ("fraud", -2.9),
    ("crash", -2.8),
    ("crashes", -2.8),
    ("plunge", -2.4),
    ("plunges", -2.4),
    ("default", -2.2),
    ("bearish", -2.0),
    ("tumbles", -1.9),
    ("tumble", -1.9),
    ("slump", -1.8),
    ("slumps", -1.8),
    ("downgrade", -1.8),
    ("downgraded", -1.8),
    ("underperform", -1.7),
    ("lawsuit", -1.7),
    ("layoffs", -1.6),
    ("sinks", -1.6),
    ("misses", -1.5),
    ("miss", -1.5),
    ("loss", -1.4),
    ("losses", -1.4),
    ("drops", -1.4),
    ("drop", -1.4),
    ("recall", -1.3),
    ("declines", -1.3),
    ("decline", -1.3),
    ("fears", -1.3),
    ("falls", -1.2),
    ("fall", -1.2),
    ("warning", -1.2),
    ("weak", -1.1),
    ("cuts", -1.0),
    ("cut", -1.0),
    ("sell", -0.9),
    ("risk", -0.8),
    ("volatile", -0.7),
];

const NEGATORS: &[&str] = &["not", "no", "never", "without", "hardly", "fails"];

/// VADER's normalization constant.
const NORM_ALPHA: f64 = 15.0;
/// VADER's empirical negation dampener.
const NEGATION_FACTOR: f64 = -0.74;

fn valence(token: &str) -> Option<f64> {
    LEXICON
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, v)| *v)
}

/// Scores free text into [-1, 1]. Returns `None` when no lexicon token is
/// present, which callers surface as `NoContent`.
pub fn score_text(text: &str) -> Option<f64> {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect();

    let mut sum = 0.0;
    let mut hits = 0usize;
    for (i, token) in tokens.iter().enumerate() {
        let Some(mut v) = valence(token) else {
            continue;
        };
        // Look back up to two tokens for a negator.
        let window_start = i.saturating_sub(2);
        if tokens[window_start..i]
            .iter()
            .any(|t| NEGATORS.contains(&t.as_str()))
        {
            v *= NEGATION_FACTOR;
        }
        sum += v;
        hits += 1;
    }

    if hits == 0 {
        return None;
    }
    Some(sum / (sum * sum + NORM_ALPHA).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_headline_scores_positive() {
        let score = score_text("Shares surge after record profit beats estimates").unwrap();
        assert!(score > 0.3, "got {}", score);
    }

    #[test]
    fn negative_headline_scores_negative() {
        let score = score_text("Stock plunges on fraud lawsuit and layoffs").unwrap();
        assert!(score < -0.3, "got {}", score);
    }

    #[test]
    fn negation_flips_valence() {
        let plain = score_text("earnings beat").unwrap();
        let negated = score_text("earnings did not beat").unwrap();
        assert!(plain > 0.0);
        assert!(negated < 0.0);
    }

    #[test]
    fn no_lexicon_hits_is_none() {
        assert!(score_text("quarterly report scheduled for thursday").is_none());
        assert!(score_text("").is_none());
    }

    #[test]
    fn scores_stay_bounded() {
        let text = "surge surge surge rally rally record profit beats bullish".repeat(10);
        let score = score_text(&text).unwrap();
        assert!(score <= 1.0 && score > 0.9);
    }
}
