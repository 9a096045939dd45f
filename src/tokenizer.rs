//! Tokenization: lowercased token streams with byte offsets, stopword
//! filtering, and bigram/trigram composition.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Minimum token length; shorter tokens are dropped.
const MIN_TOKEN_LEN: usize = 2;

/// The fixed stopword list. Case-folded; identical input must always
/// produce identical token streams.
pub const STOPWORDS: &[&str] = &[
    "the", "be", "to", "of", "and", "a", "in", "that", "have", "i", "it", "for", "not", "on",
    "with", "he", "as", "you", "do", "at", "this", "but", "his", "by", "from", "they", "we", "say",
    "her", "she", "or", "an", "will", "my", "one", "all", "would", "there", "their", "what", "so",
    "up", "out", "if", "about", "who", "get", "which", "go", "me", "when", "make", "can", "like",
    "time", "no", "just", "him", "know", "take", "people", "into", "year", "your", "good", "some",
    "could", "them", "see", "other", "than", "then", "now", "look", "only", "come", "its", "over",
    "think", "also", "back", "after", "use", "two", "how", "our", "work", "first", "well", "way",
    "even", "new", "want", "because", "any", "these", "give", "day", "most", "us", "is", "was",
    "are", "been", "has", "had", "were", "said", "did", "having", "may", "should", "does", "am",
];

static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

/// Check whether a lowercased term is a stopword.
pub fn is_stopword(term: &str) -> bool {
    STOPWORD_SET.contains(term)
}

/// A term (unigram or multi-word phrase) and its byte offset in the source
/// text. Offsets always refer to the start of the first constituent token
/// in the original, pre-lowercase text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenOccurrence {
    /// Lowercased term.
    pub term: String,
    /// Byte offset of the match start in the source text.
    pub offset: usize,
}

/// A letter in the Latin script: ASCII plus the Latin-1 supplement and
/// the Latin Extended blocks. Letters from other scripts are separators.
fn is_latin_letter(ch: char) -> bool {
    match ch {
        'a'..='z' | 'A'..='Z' => true,
        // Latin-1 supplement and Extended-A/B; is_alphabetic skips the
        // interspersed multiplication and division signs
        '\u{00C0}'..='\u{024F}' => ch.is_alphabetic(),
        // Latin Extended Additional
        '\u{1E00}'..='\u{1EFF}' => true,
        _ => false,
    }
}

/// Tokenize text into an ordered stream of surviving tokens.
///
/// A token is a letter followed by any number of letters, digits, or
/// hyphens, case-insensitive over the Latin range (accented Latin letters
/// included); everything else is a separator. Tokens are lowercased, then
/// dropped when shorter than two characters or present in the stopword
/// set.
pub fn tokenize(text: &str) -> Vec<TokenOccurrence> {
    let mut tokens = Vec::new();
    let mut iter = text.char_indices().peekable();

    while let Some((start, ch)) = iter.next() {
        if !is_latin_letter(ch) {
            continue;
        }

        let mut end = start + ch.len_utf8();
        while let Some(&(idx, next)) = iter.peek() {
            if is_latin_letter(next) || next.is_ascii_digit() || next == '-' {
                end = idx + next.len_utf8();
                iter.next();
            } else {
                break;
            }
        }

        let term = text[start..end].to_lowercase();
        if term.chars().count() < MIN_TOKEN_LEN || is_stopword(&term) {
            continue;
        }
        tokens.push(TokenOccurrence { term, offset: start });
    }

    tokens
}

/// Compose n-grams from consecutive surviving tokens.
///
/// The n-gram's term is its constituent tokens joined by a single space and
/// its offset is the offset of the first token. Stopword filtering is not
/// re-applied: the constituents already survived it.
pub fn ngrams(tokens: &[TokenOccurrence], n: usize) -> Vec<TokenOccurrence> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }

    tokens
        .windows(n)
        .map(|window| {
            let term = window
                .iter()
                .map(|t| t.term.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            TokenOccurrence {
                term,
                offset: window[0].offset,
            }
        })
        .collect()
}

/// Extract the deduplicated term set of a user question: unigrams plus
/// bigrams and trigrams, in first-seen order.
pub fn query_terms(question: &str) -> Vec<String> {
    let tokens = tokenize(question);
    let mut seen = HashSet::new();
    let mut terms = Vec::new();

    for occurrence in tokens
        .iter()
        .chain(ngrams(&tokens, 2).iter())
        .chain(ngrams(&tokens, 3).iter())
    {
        if seen.insert(occurrence.term.clone()) {
            terms.push(occurrence.term.clone());
        }
    }

    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(text: &str) -> Vec<String> {
        tokenize(text).into_iter().map(|t| t.term).collect()
    }

    #[test]
    fn test_tokenize_basic() {
        assert_eq!(terms("Install the fuel pump"), vec!["install", "fuel", "pump"]);
    }

    #[test]
    fn test_tokenize_lowercases() {
        assert_eq!(terms("GPS Configuration"), vec!["gps", "configuration"]);
    }

    #[test]
    fn test_tokenize_filters_short_and_stopwords() {
        // "a" is short and a stopword, "is" and "the" are stopwords
        assert_eq!(terms("a pump is the part"), vec!["pump", "part"]);
    }

    #[test]
    fn test_tokenize_hyphen_and_digits() {
        // tokens must start with a letter; digits and hyphens may follow
        assert_eq!(terms("co-occurrence 42 x86-64 v2"), vec!["co-occurrence", "x86-64", "v2"]);
    }

    #[test]
    fn test_tokenize_offsets_point_into_source() {
        let text = "Fuel PUMP";
        let tokens = tokenize(text);
        assert_eq!(tokens[0].offset, 0);
        assert_eq!(tokens[1].offset, 5);
        assert_eq!(&text[tokens[1].offset..tokens[1].offset + 4], "PUMP");
    }

    #[test]
    fn test_tokenize_accented_latin_letters() {
        assert_eq!(
            terms("fuel \u{00e9}clair pump"),
            vec!["fuel", "\u{00e9}clair", "pump"]
        );
    }

    #[test]
    fn test_tokenize_lowercases_accented_latin() {
        assert_eq!(terms("\u{00c9}clair R\u{00c9}SUM\u{00c9}"), vec![
            "\u{00e9}clair",
            "r\u{00e9}sum\u{00e9}"
        ]);
    }

    #[test]
    fn test_tokenize_non_latin_scripts_are_separators() {
        // Cyrillic and Greek letters never start or extend a token
        assert_eq!(terms("fuel \u{041c}\u{043e}\u{0441}\u{043a}\u{0432}\u{0430} pump"), vec![
            "fuel", "pump"
        ]);
        assert_eq!(terms("\u{03b1}\u{03b2}\u{03b3} filter"), vec!["filter"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n").is_empty());
    }

    #[test]
    fn test_ngrams_compose_surviving_tokens() {
        let tokens = tokenize("install the fuel pump");
        let bigrams = ngrams(&tokens, 2);
        // "the" was filtered before composition
        assert_eq!(
            bigrams.iter().map(|t| t.term.as_str()).collect::<Vec<_>>(),
            vec!["install fuel", "fuel pump"]
        );
        assert_eq!(bigrams[0].offset, 0);
    }

    #[test]
    fn test_ngrams_too_few_tokens() {
        let tokens = tokenize("pump");
        assert!(ngrams(&tokens, 2).is_empty());
        assert!(ngrams(&tokens, 3).is_empty());
    }

    #[test]
    fn test_query_terms_deduplicates() {
        let result = query_terms("fuel pump fuel pump");
        assert_eq!(result.iter().filter(|t| *t == "fuel").count(), 1);
        assert!(result.contains(&"fuel pump".to_string()));
    }

    #[test]
    fn test_query_terms_includes_trigrams() {
        let result = query_terms("clean fuel line procedure");
        assert!(result.contains(&"clean fuel line".to_string()));
        assert!(result.contains(&"fuel line procedure".to_string()));
    }

    #[test]
    fn test_no_stopword_survives() {
        for text in ["the and of with", "What is this about?"] {
            for token in tokenize(text) {
                assert!(!is_stopword(&token.term), "stopword leaked: {}", token.term);
            }
        }
    }
}
