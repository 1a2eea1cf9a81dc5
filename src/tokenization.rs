use std::ops::Range;

use unicode_segmentation::UnicodeSegmentation;

use crate::errors::*;
use crate::utils::EntityName;

/// Space marker used by sentencepiece-like tokenizers
const SPACE_MARKER: char = '\u{2581}';
const CLUSTER_BITS: usize = 16;

/// Tokenization and embedding service
pub trait LanguageService: Send + Sync {
    fn tokenize(&self, texts: &[&str], language: &str) -> Result<Vec<Vec<String>>>;
    fn vectorize(&self, tokens: &[&str], language: &str) -> Result<Vec<Vec<f32>>>;
    fn generate_similar_junk_words(&self, vocabulary: &[&str], language: &str)
        -> Result<Vec<String>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub value: String,
    pub index: usize,
    /// Character range in the tokenized text
    pub range: Range<usize>,
    pub is_word: bool,
    pub is_space: bool,
    pub entities: Vec<EntityName>,
    pub cluster: Option<String>,
}

impl Token {
    pub fn new(value: String, index: usize, range: Range<usize>) -> Self {
        let is_space = !value.is_empty() && value.chars().all(char::is_whitespace);
        let is_word = !value.is_empty() && value.chars().all(char::is_alphanumeric);
        Self {
            value,
            index,
            range,
            is_word,
            is_space,
            entities: vec![],
            cluster: None,
        }
    }

    pub fn has_entities(&self) -> bool {
        !self.entities.is_empty()
    }
}

/// Tokenizes a single text and aligns the tokens onto it, word tokens get a cluster id
/// derived from their vector
pub fn tokenize_text(
    service: &dyn LanguageService,
    text: &str,
    language: &str,
) -> Result<Vec<Token>> {
    let raw_tokens = service
        .tokenize(&[text], language)?
        .into_iter()
        .next()
        .unwrap_or_default();
    let mut tokens = align_tokens(text, raw_tokens);

    let words: Vec<&str> = tokens
        .iter()
        .filter(|t| t.is_word)
        .map(|t| &*t.value)
        .collect();
    if words.is_empty() {
        return Ok(tokens);
    }
    let vectors = service.vectorize(&words, language)?;
    for (token, vector) in tokens.iter_mut().filter(|t| t.is_word).zip(vectors.iter()) {
        token.cluster = word_cluster(vector);
    }
    Ok(tokens)
}

pub fn sanitize_token(value: &str) -> String {
    if value.chars().all(|c| c == SPACE_MARKER) {
        return value.chars().map(|_| ' ').collect();
    }
    value
        .chars()
        .filter(|c| *c != SPACE_MARKER && !c.is_control())
        .collect()
}

/// Locates each token in `text`, in order. Tokens the tokenizer normalized beyond
/// recognition are placed at the current cursor.
pub fn align_tokens(text: &str, raw_tokens: Vec<String>) -> Vec<Token> {
    let chars: Vec<char> = text.chars().collect();
    let mut cursor = 0;
    raw_tokens
        .into_iter()
        .map(|raw| sanitize_token(&raw))
        .filter(|value| !value.is_empty())
        .enumerate()
        .map(|(index, value)| {
            let needle: Vec<char> = value.chars().collect();
            let start = find_chars(&chars, &needle, cursor).unwrap_or(cursor);
            let end = (start + needle.len()).min(chars.len().max(start));
            cursor = end;
            Token::new(value, index, start..end)
        })
        .collect()
}

fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

/// Sign hash of the leading vector dimensions: close vectors share a cluster
pub fn word_cluster(vector: &[f32]) -> Option<String> {
    if vector.is_empty() {
        return None;
    }
    let bits = vector
        .iter()
        .take(CLUSTER_BITS)
        .enumerate()
        .fold(0u32, |acc, (i, v)| if *v > 0.0 { acc | (1 << i) } else { acc });
    Some(format!("{:04x}", bits))
}

/// Language agnostic tokenizer splitting on unicode word boundaries. It has no
/// embeddings, so tokens get no cluster.
#[derive(Debug, Default)]
pub struct UnicodeTokenizer;

impl LanguageService for UnicodeTokenizer {
    fn tokenize(&self, texts: &[&str], _language: &str) -> Result<Vec<Vec<String>>> {
        Ok(texts
            .iter()
            .map(|text| text.split_word_bounds().map(|t| t.to_string()).collect())
            .collect())
    }

    fn vectorize(&self, tokens: &[&str], _language: &str) -> Result<Vec<Vec<f32>>> {
        Ok(tokens.iter().map(|_| vec![]).collect())
    }

    fn generate_similar_junk_words(
        &self,
        vocabulary: &[&str],
        _language: &str,
    ) -> Result<Vec<String>> {
        // Rotated and reversed words keep the length and charset of the vocabulary
        Ok(vocabulary
            .iter()
            .filter(|word| word.chars().count() > 1)
            .map(|word| {
                let mut chars: Vec<char> = word.chars().collect();
                chars.rotate_left(1);
                chars.reverse();
                chars.into_iter().collect::<String>()
            })
            .filter(|junk| !vocabulary.contains(&&**junk))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_tokens() {
        // Given
        let text = "hello  world, ok";
        let raw_tokens = vec!["hello", "  ", "world", ",", " ", "ok"]
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        // When
        let tokens = align_tokens(text, raw_tokens);

        // Then
        let ranges: Vec<Range<usize>> = tokens.iter().map(|t| t.range.clone()).collect();
        assert_eq!(vec![0..5, 5..7, 7..12, 12..13, 13..14, 14..16], ranges);
        assert!(tokens[0].is_word);
        assert!(tokens[1].is_space);
        assert!(!tokens[3].is_word && !tokens[3].is_space);
        assert_eq!(5, tokens[5].index);
    }

    #[test]
    fn test_sanitize_token_handles_space_marker() {
        assert_eq!("hello", sanitize_token("\u{2581}hello"));
        assert_eq!(" ", sanitize_token("\u{2581}"));
        assert_eq!("ab", sanitize_token("a\u{0}b"));
    }

    #[test]
    fn test_word_cluster_is_sign_hash() {
        assert_eq!(Some("0005".to_string()), word_cluster(&[0.3, -0.1, 0.7]));
        assert_eq!(None, word_cluster(&[]));
    }

    #[test]
    fn test_unicode_tokenizer() {
        // Given
        let tokenizer = UnicodeTokenizer;

        // When
        let tokens = tokenize_text(&tokenizer, "book a flight!", "en").unwrap();

        // Then
        let values: Vec<&str> = tokens.iter().map(|t| &*t.value).collect();
        assert_eq!(vec!["book", " ", "a", " ", "flight", "!"], values);
        assert!(tokens.iter().all(|t| t.cluster.is_none()));
    }

    #[test]
    fn test_junk_words_differ_from_vocabulary() {
        // When
        let junk = UnicodeTokenizer
            .generate_similar_junk_words(&["flight", "a", "book"], "en")
            .unwrap();

        // Then
        assert_eq!(vec!["fthgil".to_string(), "bkoo".to_string()], junk);
    }
}
