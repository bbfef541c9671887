//! Spelled-out numbers to digits
//!
//! Offline models transcribe "17" as "seventeen" and "42" as "forty two".
//! The game compares digit strings, so runs of number words are rewritten
//! as digits and every other word is passed through.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Word {
    Unit(u64),
    Teen(u64),
    Tens(u64),
    Hundred,
    Thousand,
}

fn classify(token: &str) -> Option<Word> {
    let word = match token.to_ascii_lowercase().as_str() {
        "zero" => Word::Unit(0),
        "one" => Word::Unit(1),
        "two" => Word::Unit(2),
        "three" => Word::Unit(3),
        "four" => Word::Unit(4),
        "five" => Word::Unit(5),
        "six" => Word::Unit(6),
        "seven" => Word::Unit(7),
        "eight" => Word::Unit(8),
        "nine" => Word::Unit(9),
        "ten" => Word::Teen(10),
        "eleven" => Word::Teen(11),
        "twelve" => Word::Teen(12),
        "thirteen" => Word::Teen(13),
        "fourteen" => Word::Teen(14),
        "fifteen" => Word::Teen(15),
        "sixteen" => Word::Teen(16),
        "seventeen" => Word::Teen(17),
        "eighteen" => Word::Teen(18),
        "nineteen" => Word::Teen(19),
        "twenty" => Word::Tens(20),
        "thirty" => Word::Tens(30),
        "forty" => Word::Tens(40),
        "fifty" => Word::Tens(50),
        "sixty" => Word::Tens(60),
        "seventy" => Word::Tens(70),
        "eighty" => Word::Tens(80),
        "ninety" => Word::Tens(90),
        "hundred" => Word::Hundred,
        "thousand" => Word::Thousand,
        _ => return None,
    };
    Some(word)
}

/// Word that can follow "hundred" or "thousand", with or without "and"
fn is_remainder(word: Option<Word>) -> bool {
    matches!(word, Some(Word::Unit(v) | Word::Teen(v) | Word::Tens(v)) if v > 0)
}

/// A number being read word by word
struct Number {
    thousands: u64,
    current: u64,
    last: Word,
}

impl Number {
    fn start(word: Word) -> Self {
        let (thousands, current) = match word {
            Word::Unit(v) | Word::Teen(v) | Word::Tens(v) => (0, v),
            Word::Hundred => (0, 100),
            Word::Thousand => (1000, 0),
        };
        Self {
            thousands,
            current,
            last: word,
        }
    }

    /// Extend with `word`, or refuse when it has to begin a new number
    fn push(&mut self, word: Word) -> bool {
        let accepted = match (self.last, word) {
            (Word::Tens(_), Word::Unit(v)) if v > 0 => {
                self.current += v;
                true
            }
            (Word::Hundred | Word::Thousand, Word::Unit(v) | Word::Teen(v) | Word::Tens(v))
                if v > 0 =>
            {
                self.current += v;
                true
            }
            (Word::Unit(v), Word::Hundred) if v > 0 && self.current == v => {
                self.current *= 100;
                true
            }
            (Word::Unit(_) | Word::Teen(_) | Word::Tens(_) | Word::Hundred, Word::Thousand)
                if self.thousands == 0 && self.current > 0 =>
            {
                self.thousands = self.current * 1000;
                self.current = 0;
                true
            }
            _ => false,
        };

        if accepted {
            self.last = word;
        }
        accepted
    }

    fn value(&self) -> u64 {
        self.thousands + self.current
    }
}

/// Rewrite runs of English number words in `text` as digits.
///
/// Hyphenated compounds ("forty-two") and a joining "and"
/// ("one hundred and five") are understood. Adjacent numbers that can't
/// combine ("one two") stay separate. Whitespace is normalized to single
/// spaces.
pub fn digits_for_number_words(text: &str) -> String {
    let tokens: Vec<&str> = text
        .split_whitespace()
        .flat_map(|token| {
            let parts: Vec<&str> = token.split('-').collect();
            if parts.len() > 1 && parts.iter().all(|part| classify(part).is_some()) {
                parts
            } else {
                vec![token]
            }
        })
        .collect();

    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut number: Option<Number> = None;

    for (i, token) in tokens.iter().enumerate() {
        if let Some(word) = classify(token) {
            let extended = number.as_mut().is_some_and(|n| n.push(word));
            if !extended {
                if let Some(n) = number.take() {
                    out.push(n.value().to_string());
                }
                number = Some(Number::start(word));
            }
            continue;
        }

        let joins = token.eq_ignore_ascii_case("and")
            && number
                .as_ref()
                .is_some_and(|n| matches!(n.last, Word::Hundred | Word::Thousand))
            && is_remainder(tokens.get(i + 1).and_then(|next| classify(next)));
        if joins {
            continue;
        }

        if let Some(n) = number.take() {
            out.push(n.value().to_string());
        }
        out.push((*token).to_string());
    }

    if let Some(n) = number {
        out.push(n.value().to_string());
    }
    out.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_words() {
        assert_eq!(digits_for_number_words("seventeen"), "17");
        assert_eq!(digits_for_number_words("zero"), "0");
        assert_eq!(digits_for_number_words("Ninety"), "90");
    }

    #[test]
    fn test_compound_tens() {
        assert_eq!(digits_for_number_words("forty two"), "42");
        assert_eq!(digits_for_number_words("forty-two"), "42");
        assert_eq!(digits_for_number_words("seventy one"), "71");
    }

    #[test]
    fn test_hundreds_and_thousands() {
        assert_eq!(digits_for_number_words("one hundred and five"), "105");
        assert_eq!(digits_for_number_words("hundred"), "100");
        assert_eq!(
            digits_for_number_words("two thousand three hundred twelve"),
            "2312"
        );
    }

    #[test]
    fn test_numbers_that_do_not_combine_stay_apart() {
        assert_eq!(digits_for_number_words("one two three"), "1 2 3");
        assert_eq!(digits_for_number_words("seventeen five"), "17 5");
        assert_eq!(digits_for_number_words("forty and two"), "40 and 2");
    }

    #[test]
    fn test_other_words_pass_through() {
        assert_eq!(
            digits_for_number_words("i said  seventy one please"),
            "i said 71 please"
        );
        assert_eq!(digits_for_number_words("42"), "42");
        assert_eq!(digits_for_number_words("rock and roll"), "rock and roll");
        assert_eq!(digits_for_number_words("well-known"), "well-known");
        assert_eq!(digits_for_number_words(""), "");
    }
}
