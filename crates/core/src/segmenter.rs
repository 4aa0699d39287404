//! Heuristic sentence splitting.
//!
//! A sentence ends at a whitespace character that follows `.` or `?`, unless
//! the characters before it look like an abbreviation:
//!
//! * `x.y.` style initials such as `U.S.` or `p.m.` (word char, `.`, word char, any char);
//! * a capital followed by a lowercase letter and `.`, such as `Mr.` or `Dr.`.
//!
//! The splitting whitespace character is consumed; every sentence is trimmed and
//! blank pieces are dropped.

pub fn segment_sentences(text: &str) -> Vec<String> {
    Sentences::new(text).map(str::to_string).collect()
}

/// Borrowing iterator over the sentences of `text`.
pub struct Sentences<'a> {
    text: &'a str,
    chars: std::str::CharIndices<'a>,
    start: usize,
    lookbehind: Lookbehind,
    finished: bool,
}

impl<'a> Sentences<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices(),
            start: 0,
            lookbehind: Lookbehind::default(),
            finished: false,
        }
    }
}

impl<'a> Iterator for Sentences<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let Some((offset, ch)) = self.chars.next() else {
                self.finished = true;
                let tail = self.text[self.start..].trim();
                if tail.is_empty() {
                    return None;
                }
                return Some(tail);
            };

            let boundary = ch.is_whitespace() && self.lookbehind.ends_sentence();
            self.lookbehind.push(ch);

            if boundary {
                let piece = self.text[self.start..offset].trim();
                self.start = offset + ch.len_utf8();
                if !piece.is_empty() {
                    return Some(piece);
                }
            }
        }

        None
    }
}

/// The last four characters seen, most recent last.
#[derive(Debug, Default, Clone, Copy)]
struct Lookbehind {
    window: [Option<char>; 4],
}

impl Lookbehind {
    fn push(&mut self, ch: char) {
        self.window.rotate_left(1);
        self.window[3] = Some(ch);
    }

    /// `back(1)` is the character right before the cursor.
    fn back(&self, distance: usize) -> Option<char> {
        self.window[4 - distance]
    }

    fn ends_sentence(&self) -> bool {
        if !matches!(self.back(1), Some('.' | '?')) {
            return false;
        }

        if let (Some(first), Some('.'), Some(second)) = (self.back(4), self.back(3), self.back(2)) {
            if is_word_char(first) && is_word_char(second) {
                return false;
            }
        }

        if let (Some(upper), Some(lower), Some('.')) = (self.back(3), self.back(2), self.back(1)) {
            if upper.is_uppercase() && lower.is_lowercase() {
                return false;
            }
        }

        true
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
