use serde::{Deserialize, Serialize};

/// The task vocabulary. ROOD and GEEL are go words, BLAUW is the no-go
/// word. Each word is displayed in the color it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Word {
    Rood,
    Geel,
    Blauw,
}

impl Word {
    pub const GO_WORDS: [Word; 2] = [Word::Rood, Word::Geel];
    pub const NOGO_WORD: Word = Word::Blauw;

    pub fn text(&self) -> &'static str {
        match self {
            Word::Rood => "ROOD",
            Word::Geel => "GEEL",
            Word::Blauw => "BLAUW",
        }
    }

    /// Display color, straight (non-premultiplied) RGBA.
    pub fn color(&self) -> [u8; 4] {
        match self {
            Word::Rood => [255, 0, 0, 255],
            Word::Geel => [255, 255, 0, 255],
            Word::Blauw => [0, 0, 255, 255],
        }
    }

    pub fn is_go(&self) -> bool {
        !matches!(self, Word::Blauw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_flags_match_vocabulary() {
        assert!(Word::Rood.is_go());
        assert!(Word::Geel.is_go());
        assert!(!Word::Blauw.is_go());
        assert!(Word::GO_WORDS.iter().all(Word::is_go));
        assert!(!Word::NOGO_WORD.is_go());
    }
}
