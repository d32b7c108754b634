/// Split text on spaces into the ordered sequence of non-empty words.
///
/// Only the ASCII space separates words. Other whitespace and control bytes stay inside the
/// word so that validation can reject them.
pub fn split_into_words(text: &str) -> Vec<&str> {
    text.split(' ').filter(|word| !word.is_empty()).collect()
}

/// A word is valid when it holds no control characters (bytes below the space).
pub fn is_valid_word(word: &str) -> bool {
    !word.bytes().any(|b| b < b' ')
}
