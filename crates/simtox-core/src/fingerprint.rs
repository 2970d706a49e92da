//! Binary structure fingerprints and Tanimoto similarity.
//!
//! [`Fingerprint::from_structure`] is a lightweight hashed path fingerprint
//! computed from SMILES text: atoms are tokenized (bracket atoms, two-letter
//! halogens, aromatic lower-case atoms), then every linear run of one to
//! [`MAX_PATH_ATOMS`] consecutive atoms (with the bond symbols between them)
//! is hashed onto one of [`FINGERPRINT_BITS`] bits. It ignores branch topology,
//! so it is an approximation of a real path fingerprint, good enough for
//! ranking an offline catalog.

/// Fingerprint width in bits.
pub const FINGERPRINT_BITS: usize = 1024;

/// Longest atom path hashed into the fingerprint.
pub const MAX_PATH_ATOMS: usize = 3;

const WORDS: usize = FINGERPRINT_BITS / 64;

/// Fixed-width bit vector of structural features.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    bits: [u64; WORDS],
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self { bits: [0; WORDS] }
    }
}

impl Fingerprint {
    /// Compute the fingerprint of a SMILES string.
    #[must_use]
    pub fn from_structure(smiles: &str) -> Self {
        let tokens = tokenize(smiles);
        let mut fp = Self::default();

        for start in 0..tokens.len() {
            let mut path = String::new();
            let mut atoms = 0;
            for token in &tokens[start..] {
                match token {
                    Token::Bond(_) if atoms == 0 => break,
                    Token::Bond(bond) => path.push(*bond),
                    Token::Atom(atom) => {
                        path.push_str(atom);
                        atoms += 1;
                        fp.set(fnv1a(path.as_bytes()));
                        if atoms == MAX_PATH_ATOMS {
                            break;
                        }
                    }
                }
            }
        }
        fp
    }

    fn set(&mut self, hash: u64) {
        #[allow(clippy::cast_possible_truncation)]
        let bit = (hash % FINGERPRINT_BITS as u64) as usize;
        self.bits[bit / 64] |= 1 << (bit % 64);
    }

    /// Number of set bits.
    #[must_use]
    pub fn count_ones(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    /// Tanimoto coefficient `|A ∩ B| / |A ∪ B|`.
    ///
    /// Two empty fingerprints share nothing and score `0.0`.
    #[must_use]
    pub fn tanimoto(&self, other: &Self) -> f64 {
        let (mut both, mut either) = (0_u32, 0_u32);
        for (a, b) in self.bits.iter().zip(other.bits.iter()) {
            both += (a & b).count_ones();
            either += (a | b).count_ones();
        }
        if either == 0 {
            return 0.0;
        }
        f64::from(both) / f64::from(either)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Atom(String),
    Bond(char),
}

fn tokenize(smiles: &str) -> Vec<Token> {
    let chars: Vec<char> = smiles.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '[' => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == ']')
                    .map_or(chars.len(), |p| i + p + 1);
                tokens.push(Token::Atom(chars[i..end].iter().collect()));
                i = end;
            }
            'C' | 'B' if matches!((c, chars.get(i + 1)), ('C', Some('l')) | ('B', Some('r'))) => {
                tokens.push(Token::Atom(chars[i..i + 2].iter().collect()));
                i += 2;
            }
            'B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I' | 'b' | 'c' | 'n' | 'o' | 'p' | 's' => {
                tokens.push(Token::Atom(c.to_string()));
                i += 1;
            }
            '=' | '#' | '$' | ':' => {
                tokens.push(Token::Bond(c));
                i += 1;
            }
            // Branches, ring closures, charges, stereo marks, and dots
            // carry no linear-path information here.
            _ => i += 1,
        }
    }
    tokens
}

/// 64-bit FNV-1a; stable across platforms and releases.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}
