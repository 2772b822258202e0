use ringle_common::Language;

/// Guesses the language of an inbound message.
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Language;
}

/// Korean when the share of Hangul syllables among non-whitespace
/// characters exceeds `threshold`, English otherwise.
#[derive(Debug, Clone, Copy)]
pub struct ScriptRatioDetector {
    threshold: f64,
}

impl ScriptRatioDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for ScriptRatioDetector {
    fn default() -> Self {
        Self::new(0.3)
    }
}

fn is_hangul_syllable(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

impl LanguageDetector for ScriptRatioDetector {
    fn detect(&self, text: &str) -> Language {
        let (hangul, total) = text
            .chars()
            .filter(|c| !c.is_whitespace())
            .fold((0usize, 0usize), |(h, t), c| {
                (h + usize::from(is_hangul_syllable(c)), t + 1)
            });
        if total > 0 && hangul as f64 / total as f64 > self.threshold {
            Language::Korean
        } else {
            Language::English
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("How was your weekend?", Language::English)]
    #[case("주말 어땠어요?", Language::Korean)]
    #[case("I went to 부산 with friends", Language::English)]
    #[case("오늘 homework 했어요", Language::Korean)]
    #[case("", Language::English)]
    #[case("   ", Language::English)]
    #[case("ㅋㅋㅋ", Language::English)]
    fn detects_by_hangul_ratio(#[case] text: &str, #[case] expected: Language) {
        assert_eq!(ScriptRatioDetector::default().detect(text), expected);
    }

    #[test]
    fn threshold_is_exclusive() {
        // 3 of 10 non-whitespace chars are Hangul: exactly 0.3.
        let text = "한국어 abcdefg";
        assert_eq!(ScriptRatioDetector::new(0.3).detect(text), Language::English);
        assert_eq!(ScriptRatioDetector::new(0.29).detect(text), Language::Korean);
    }
}
