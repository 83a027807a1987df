//! Position-aware OCR correction and validation for Indian registration plates.
//!
//! A plate reads `LL D[D] L[L] DDDD`: a two-letter state/UT code, a one or
//! two digit district code, a one or two letter series and a four digit
//! serial. OCR engines routinely confuse digit-shaped letters with letters
//! and vice versa, so each position is corrected only towards the character
//! class it must hold.

use tracing::debug;

/// State and union-territory codes accepted as a plate prefix.
pub const STATE_CODES: [&str; 36] = [
    "AP", "AR", "AS", "BR", "CG", "GA", "GJ", "HR", "HP", "JK", "JH", "KA", "KL", "MP", "MH", "MN",
    "ML", "MZ", "NL", "OD", "PB", "RJ", "SK", "TN", "TG", "TR", "UP", "UK", "WB", "AN", "CH", "DH",
    "DD", "DL", "LD", "PY",
];

/// Digit glyphs read where a letter belongs.
const DIGIT_TO_LETTER: [(char, char); 6] = [
    ('0', 'O'),
    ('1', 'I'),
    ('5', 'S'),
    ('2', 'Z'),
    ('6', 'G'),
    ('8', 'B'),
];

/// Letter glyphs read where a digit belongs.
const LETTER_TO_DIGIT: [(char, char); 7] = [
    ('O', '0'),
    ('I', '1'),
    ('S', '5'),
    ('Z', '2'),
    ('G', '6'),
    ('B', '8'),
    ('Q', '0'),
];

/// Grammar role of a single character position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionClass {
    StateCode,
    District,
    Series,
    Serial,
}

impl PositionClass {
    fn wants_letter(self) -> bool {
        matches!(self, PositionClass::StateCode | PositionClass::Series)
    }

    /// Whether `c` already belongs at this position.
    pub fn accepts(self, c: char) -> bool {
        if self.wants_letter() {
            c.is_ascii_uppercase()
        } else {
            c.is_ascii_digit()
        }
    }

    /// Look-alike replacement for `c` at this position, if one exists.
    pub fn substitute(self, c: char) -> Option<char> {
        let table: &[(char, char)] = if self.wants_letter() {
            &DIGIT_TO_LETTER
        } else {
            &LETTER_TO_DIGIT
        };
        table.iter().find(|(from, _)| *from == c).map(|(_, to)| *to)
    }
}

/// The accepted length/shape variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateShape {
    /// `LL DD LL DDDD`
    Standard,
    /// `LL D LL DDDD`
    ShortDistrict,
    /// `LL DD L DDDD`
    SingleSeries,
    /// `LL D L DDDD`
    Compact,
}

impl PlateShape {
    pub const ALL: [PlateShape; 4] = [
        PlateShape::Standard,
        PlateShape::ShortDistrict,
        PlateShape::SingleSeries,
        PlateShape::Compact,
    ];

    fn group_lengths(self) -> (usize, usize) {
        match self {
            PlateShape::Standard => (2, 2),
            PlateShape::ShortDistrict => (1, 2),
            PlateShape::SingleSeries => (2, 1),
            PlateShape::Compact => (1, 1),
        }
    }

    pub fn len(self) -> usize {
        let (district, series) = self.group_lengths();
        2 + district + series + 4
    }

    /// Class of every position, left to right.
    pub fn classes(self) -> Vec<PositionClass> {
        let (district, series) = self.group_lengths();
        let mut classes = vec![PositionClass::StateCode; 2];
        classes.extend(std::iter::repeat(PositionClass::District).take(district));
        classes.extend(std::iter::repeat(PositionClass::Series).take(series));
        classes.extend(std::iter::repeat(PositionClass::Serial).take(4));
        classes
    }

    /// Correct `chars` into this shape. Returns the corrected string and the
    /// number of substituted characters, or `None` when some position holds
    /// a character with no look-alike in the required class.
    pub fn correct(self, chars: &[char]) -> Option<(String, usize)> {
        if chars.len() != self.len() {
            return None;
        }
        let mut out = String::with_capacity(chars.len());
        let mut substitutions = 0;
        for (&c, class) in chars.iter().zip(self.classes()) {
            if class.accepts(c) {
                out.push(c);
            } else {
                out.push(class.substitute(c)?);
                substitutions += 1;
            }
        }
        Some((out, substitutions))
    }
}

pub fn is_state_code(code: &str) -> bool {
    STATE_CODES.contains(&code)
}

/// Display name of a state/UT code, for reports.
pub fn state_name(code: &str) -> &'static str {
    match code {
        "AN" => "Andaman and Nicobar Islands",
        "AP" => "Andhra Pradesh",
        "AR" => "Arunachal Pradesh",
        "AS" => "Assam",
        "BR" => "Bihar",
        "CG" => "Chhattisgarh",
        "CH" => "Chandigarh",
        "DD" => "Daman and Diu",
        "DH" => "Dadra and Nagar Haveli",
        "DL" => "Delhi",
        "GA" => "Goa",
        "GJ" => "Gujarat",
        "HP" => "Himachal Pradesh",
        "HR" => "Haryana",
        "JH" => "Jharkhand",
        "JK" => "Jammu and Kashmir",
        "KA" => "Karnataka",
        "KL" => "Kerala",
        "LD" => "Lakshadweep",
        "MH" => "Maharashtra",
        "ML" => "Meghalaya",
        "MN" => "Manipur",
        "MP" => "Madhya Pradesh",
        "MZ" => "Mizoram",
        "NL" => "Nagaland",
        "OD" => "Odisha",
        "PB" => "Punjab",
        "PY" => "Puducherry",
        "RJ" => "Rajasthan",
        "SK" => "Sikkim",
        "TG" => "Telangana",
        "TN" => "Tamil Nadu",
        "TR" => "Tripura",
        "UK" => "Uttarakhand",
        "UP" => "Uttar Pradesh",
        "WB" => "West Bengal",
        _ => "Unknown State",
    }
}

/// Uppercase and strip everything that is not an ASCII letter or digit.
pub fn clean(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Pick the grammar-valid correction with the fewest substitutions.
/// Two distinct strings sharing the minimum is ambiguous and yields `None`.
fn pick_best(mut candidates: Vec<(String, usize)>) -> Option<String> {
    candidates.sort_by_key(|(_, subs)| *subs);
    candidates.dedup_by(|a, b| a.0 == b.0);
    match candidates.as_slice() {
        [] => None,
        [(only, _)] => Some(only.clone()),
        [(best, best_subs), (_, next_subs), ..] if best_subs < next_subs => Some(best.clone()),
        _ => None,
    }
}

/// Turns raw OCR reads into canonical plate strings.
#[derive(Debug, Clone)]
pub struct PlateNormalizer {
    min_confidence: f64,
}

impl PlateNormalizer {
    pub fn new(min_confidence: f64) -> Self {
        Self { min_confidence }
    }

    /// Canonical plate for `raw`, or `None` when the read is too uncertain,
    /// has no valid shape, or corrects ambiguously.
    pub fn normalize(&self, raw: &str, confidence: f64) -> Option<String> {
        if !(confidence > self.min_confidence) {
            debug!("Dropping read {:?}: confidence {:.2} too low", raw, confidence);
            return None;
        }
        let chars: Vec<char> = clean(raw).chars().collect();
        let candidates: Vec<(String, usize)> = PlateShape::ALL
            .iter()
            .filter(|shape| shape.len() == chars.len())
            .filter_map(|shape| shape.correct(&chars))
            .filter(|(plate, _)| is_state_code(&plate[..2]))
            .collect();
        let plate = pick_best(candidates);
        if plate.is_none() {
            debug!("Dropping read {:?}: no unambiguous plate", raw);
        }
        plate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> PlateNormalizer {
        PlateNormalizer::new(0.5)
    }

    #[test]
    fn test_valid_plates_pass_unchanged() {
        let n = normalizer();
        assert_eq!(n.normalize("DL01AB1234", 0.9).as_deref(), Some("DL01AB1234"));
        assert_eq!(n.normalize("DL7CM3702", 0.9).as_deref(), Some("DL7CM3702"));
        assert_eq!(n.normalize("MH12C5678", 0.9).as_deref(), Some("MH12C5678"));
        assert_eq!(n.normalize("KA3G3456", 0.9).as_deref(), Some("KA3G3456"));
    }

    #[test]
    fn test_cleans_separators_and_case() {
        assert_eq!(normalizer().normalize("dl 01-ab 1234", 0.9).as_deref(), Some("DL01AB1234"));
    }

    #[test]
    fn test_position_aware_corrections() {
        let n = normalizer();
        // series position: 8 -> B
        assert_eq!(n.normalize("DL01A81234", 0.9).as_deref(), Some("DL01AB1234"));
        // district and serial positions: O -> 0, I -> 1, Q -> 0
        assert_eq!(n.normalize("DLO1ABI23Q", 0.9).as_deref(), Some("DL01AB1230"));
        // state code position: 0 -> O
        assert_eq!(n.normalize("0D02CD5678", 0.9).as_deref(), Some("OD02CD5678"));
    }

    #[test]
    fn test_rejections() {
        let n = normalizer();
        // unknown state code
        assert_eq!(n.normalize("XX99ZZ9999", 0.9), None);
        // no length variant
        assert_eq!(n.normalize("D01AB1234567", 0.9), None);
        assert_eq!(n.normalize("DL1A123", 0.9), None);
        // uncorrectable glyph in a digit position
        assert_eq!(n.normalize("DL01ABX234", 0.9), None);
        // confidence must exceed the minimum
        assert_eq!(n.normalize("DL01AB1234", 0.5), None);
        assert_eq!(n.normalize("DL01AB1234", 0.2), None);
    }

    #[test]
    fn test_nine_char_shapes_prefer_fewer_substitutions() {
        // `LL DD L DDDD` needs no substitution, `LL D LL DDDD` would need one
        assert_eq!(normalizer().normalize("DL10B1234", 0.9).as_deref(), Some("DL10B1234"));
        // `LL DD L DDDD` needs two, `LL D LL DDDD` needs three
        assert_eq!(normalizer().normalize("DLS581234", 0.9).as_deref(), Some("DL55B1234"));
    }

    #[test]
    fn test_pick_best_rejects_ties() {
        let tied = vec![("DL1OB1234".to_string(), 1), ("DL10B1234".to_string(), 1)];
        assert_eq!(pick_best(tied), None);
        let clear = vec![("DL1OB1234".to_string(), 2), ("DL10B1234".to_string(), 1)];
        assert_eq!(pick_best(clear).as_deref(), Some("DL10B1234"));
        assert_eq!(pick_best(Vec::new()), None);
    }

    #[test]
    fn test_position_class_tables() {
        assert_eq!(PositionClass::Series.substitute('8'), Some('B'));
        assert_eq!(PositionClass::Serial.substitute('B'), Some('8'));
        assert_eq!(PositionClass::StateCode.substitute('7'), None);
        assert!(PositionClass::District.accepts('7'));
        assert!(!PositionClass::District.accepts('A'));
        assert_eq!(PlateShape::Compact.len(), 8);
        assert_eq!(PlateShape::Standard.classes()[4], PositionClass::Series);
    }

    #[test]
    fn test_state_name() {
        assert_eq!(state_name("DL"), "Delhi");
        assert_eq!(state_name("UP"), "Uttar Pradesh");
        assert_eq!(state_name("ZZ"), "Unknown State");
        assert!(STATE_CODES.iter().all(|code| state_name(code) != "Unknown State"));
    }
}
