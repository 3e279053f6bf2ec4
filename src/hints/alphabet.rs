use crate::hints::label::HintLabel;

/// The fixed, ordered set of labels one tab can hand out. Order is claim
/// preference: single letters (when enabled) first, then two-letter
/// combinations in letter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintAlphabet {
    labels: Vec<HintLabel>,
}

impl HintAlphabet {
    pub fn new(letters: &str, include_single_letters: bool) -> Self {
        let mut unique: Vec<char> = Vec::new();
        for c in letters.chars().map(|c| c.to_ascii_lowercase()) {
            if c.is_ascii_alphabetic() && !unique.contains(&c) {
                unique.push(c);
            }
        }

        let mut labels = Vec::with_capacity(unique.len() * (unique.len() + 1));
        if include_single_letters {
            labels.extend(unique.iter().map(|c| HintLabel::new(c.to_string())));
        }
        for first in &unique {
            for second in &unique {
                labels.push(HintLabel::new(format!("{first}{second}")));
            }
        }

        HintAlphabet { labels }
    }

    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        HintAlphabet::new(&settings.hint_letters, settings.include_single_letter_hints)
    }

    pub fn labels(&self) -> &[HintLabel] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn contains(&self, label: &HintLabel) -> bool {
        self.labels.contains(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singles_come_before_pairs() {
        let alphabet = HintAlphabet::new("abc", true);
        let texts: Vec<&str> = alphabet.labels().iter().map(HintLabel::as_str).collect();
        assert_eq!(
            texts,
            vec!["a", "b", "c", "aa", "ab", "ac", "ba", "bb", "bc", "ca", "cb", "cc"]
        );
    }

    #[test]
    fn duplicate_and_non_letters_are_dropped() {
        let alphabet = HintAlphabet::new("aAb1 b", false);
        assert_eq!(alphabet.len(), 4);
    }
}
