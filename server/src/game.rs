use crate::dictionary::WordValidator;
use shared::EndReason;
use std::collections::HashSet;

/// Per-game word-chain state, reset for every rematch
#[derive(Debug, Clone, Default)]
pub struct WordChain {
    pub used_words: HashSet<String>,
    pub last_letter: Option<char>,
    pub current_turn: usize,
    pub round_num: u32,
}

impl WordChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn other_turn(&self) -> usize {
        1 - self.current_turn
    }

    /// Counts a turn attempt, successful or not
    pub fn begin_turn(&mut self) {
        self.round_num += 1;
    }

    /// Rounds as full back-and-forth exchanges, as stored in the records
    pub fn completed_rounds(&self) -> u32 {
        self.round_num / 2
    }

    /// Checks a submission against the chain rules in order and, if it
    /// passes, records it and hands the turn to the other player.
    ///
    /// Returns the lowercased word that was accepted.
    pub fn submit(&mut self, word: &str, validator: &dyn WordValidator) -> Result<String, EndReason> {
        let word = word.trim();
        if word.is_empty() {
            return Err(EndReason::EmptySubmission);
        }
        if !validator.is_valid_word(word) {
            return Err(EndReason::InvalidWord);
        }

        let word = word.to_lowercase();
        if self.used_words.contains(&word) {
            return Err(EndReason::WordReused);
        }
        if let Some(expected) = self.last_letter {
            if word.chars().next() != Some(expected) {
                return Err(EndReason::ChainBroken { expected });
            }
        }

        self.last_letter = word.chars().last();
        self.used_words.insert(word.clone());
        self.current_turn = self.other_turn();
        Ok(word)
    }
}
