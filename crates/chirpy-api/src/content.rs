use thiserror::Error;

pub const MAX_CHIRP_LENGTH: usize = 140;

const PROFANE_WORDS: &[&str] = &["kerfuffle", "sharbert", "fornax"];
const MASK: &str = "****";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("chirp is too long ({0} characters, max {MAX_CHIRP_LENGTH})")]
    TooLong(usize),
}

/// Validate a chirp body and mask profanity.
///
/// Words are split on single spaces only, so tabs and runs of spaces survive
/// untouched and a profane word glued to punctuation ("fornax!") is not masked.
pub fn clean_chirp(body: &str) -> Result<String, ContentError> {
    let len = body.chars().count();
    if len > MAX_CHIRP_LENGTH {
        return Err(ContentError::TooLong(len));
    }

    let cleaned: Vec<&str> = body
        .split(' ')
        .map(|word| {
            let lower = word.to_lowercase();
            if PROFANE_WORDS.contains(&lower.as_str()) {
                MASK
            } else {
                word
            }
        })
        .collect();

    Ok(cleaned.join(" "))
}
