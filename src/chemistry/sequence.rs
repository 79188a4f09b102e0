use crate::chemistry::constants::delimiter::*;
use crate::errors::SequenceError;

/// An additive mass correction carried by the residues `start..end`
/// (0-based, `end` exclusive) of an annotated sequence.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct MassShift {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub mass: f64,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SequenceToken {
    Residue { code1: char, index: usize, position: usize },
    RunOpen { start: usize },
    RunClose { start: usize, end: usize, shift: f64 },
}

/// Left-to-right walk over an annotated sequence such as `PEP(TI)[+15.9949]DE`.
///
/// Letters are residues, `(` opens a modification run and `)` closes it; a
/// closing `)` must be immediately followed by a `[<signed float>]` shift.
/// Any other character is skipped. The walk stops at the first error.
pub struct SequenceWalker<'a> {
    annotated: &'a str,
    pos: usize,
    residue_count: usize,
    // (byte position of '(', residue index where the run starts)
    open_run: Option<(usize, usize)>,
    done: bool,
}

impl<'a> SequenceWalker<'a> {
    pub fn new(annotated: &'a str) -> Self {
        SequenceWalker {
            annotated,
            pos: 0,
            residue_count: 0,
            open_run: None,
            done: false,
        }
    }

    /// Residues consumed so far.
    pub fn residue_count(&self) -> usize {
        self.residue_count
    }

    pub fn is_inside_run(&self) -> bool {
        self.open_run.is_some()
    }

    fn fail(&mut self, err: SequenceError) -> Option<Result<SequenceToken, SequenceError>> {
        self.done = true;
        Some(Err(err))
    }

    // `self.pos` points right after the ')' when this is called.
    fn read_shift(&mut self, close_position: usize) -> Result<f64, SequenceError> {
        let rest = &self.annotated[self.pos..];
        if !rest.starts_with(SHIFT_OPEN) {
            return Err(SequenceError::MissingShift {
                position: close_position,
            });
        }

        let literal_start = self.pos + SHIFT_OPEN.len_utf8();
        let literal_len = self.annotated[literal_start..]
            .find(SHIFT_CLOSE)
            .ok_or(SequenceError::UnterminatedShift { position: self.pos })?;
        let literal = &self.annotated[literal_start..literal_start + literal_len];

        let unsigned = literal.strip_prefix('+').unwrap_or(literal);
        let shift = fast_float::parse::<f64, _>(unsigned)
            .ok()
            .filter(|m: &f64| m.is_finite() && !unsigned.is_empty())
            .ok_or_else(|| SequenceError::InvalidShift {
                literal: literal.to_string(),
            })?;

        self.pos = literal_start + literal_len + SHIFT_CLOSE.len_utf8();
        Ok(shift)
    }
}

impl<'a> Iterator for SequenceWalker<'a> {
    type Item = Result<SequenceToken, SequenceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let position = self.pos;
            let c = match self.annotated[position..].chars().next() {
                Some(c) => c,
                None => {
                    self.done = true;
                    return self
                        .open_run
                        .take()
                        .map(|(position, _)| Err(SequenceError::UnterminatedRun { position }));
                }
            };
            self.pos += c.len_utf8();

            match c {
                RUN_OPEN => {
                    if self.open_run.is_some() {
                        return self.fail(SequenceError::NestedRun { position });
                    }
                    self.open_run = Some((position, self.residue_count));
                    return Some(Ok(SequenceToken::RunOpen {
                        start: self.residue_count,
                    }));
                }
                RUN_CLOSE => {
                    let start = match self.open_run.take() {
                        Some((_, start)) => start,
                        None => return self.fail(SequenceError::UnmatchedClose { position }),
                    };
                    return match self.read_shift(position) {
                        Ok(shift) => Some(Ok(SequenceToken::RunClose {
                            start,
                            end: self.residue_count,
                            shift,
                        })),
                        Err(err) => self.fail(err),
                    };
                }
                c if c.is_ascii_alphabetic() => {
                    let index = self.residue_count;
                    self.residue_count += 1;
                    return Some(Ok(SequenceToken::Residue {
                        code1: c,
                        index,
                        position,
                    }));
                }
                // digestion markers, separators
                _ => continue,
            }
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct DecodedSequence {
    pub residue_count: usize,
    pub modifications: Vec<MassShift>,
}

pub fn decode(annotated: &str) -> Result<DecodedSequence, SequenceError> {
    let mut walker = SequenceWalker::new(annotated);
    let mut modifications = Vec::new();

    for token in walker.by_ref() {
        if let SequenceToken::RunClose { start, end, shift } = token? {
            modifications.push(MassShift {
                index: modifications.len(),
                start,
                end,
                mass: shift,
            });
        }
    }

    Ok(DecodedSequence {
        residue_count: walker.residue_count(),
        modifications,
    })
}

/// Residue letters of an annotated sequence, annotations removed.
pub fn strip_annotations(annotated: &str) -> String {
    let mut bare = String::with_capacity(annotated.len());
    let mut in_shift = false;
    for c in annotated.chars() {
        match c {
            SHIFT_OPEN => in_shift = true,
            SHIFT_CLOSE => in_shift = false,
            c if !in_shift && c.is_ascii_alphabetic() => bare.push(c),
            _ => {}
        }
    }
    bare
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_plain_sequence() {
        let decoded = decode("PEPTIDE").unwrap();
        assert_eq!(decoded.residue_count, 7);
        assert!(decoded.modifications.is_empty());
    }

    #[test]
    fn decode_modification_runs() {
        let decoded = decode("PEP(TI)[+15.9949]DE(K)[-17.03]").unwrap();
        assert_eq!(decoded.residue_count, 8);
        assert_eq!(
            decoded.modifications,
            vec![
                MassShift {
                    index: 0,
                    start: 3,
                    end: 5,
                    mass: 15.9949
                },
                MassShift {
                    index: 1,
                    start: 7,
                    end: 8,
                    mass: -17.03
                },
            ]
        );
    }

    #[test]
    fn decode_ignores_other_characters() {
        let decoded = decode("AC.D-E").unwrap();
        assert_eq!(decoded.residue_count, 4);
    }

    #[test]
    fn shift_digits_are_not_residues() {
        let decoded = decode("(AC)[+1e2]G").unwrap();
        assert_eq!(decoded.residue_count, 3);
        assert_eq!(decoded.modifications[0].mass, 100.0);
    }

    #[test]
    fn malformed_sequences() {
        assert_eq!(
            decode("AC(DE)[+10.0FG"),
            Err(SequenceError::UnterminatedShift { position: 6 })
        );
        assert_eq!(
            decode("AC(DE)[ten]FG"),
            Err(SequenceError::InvalidShift {
                literal: "ten".to_string()
            })
        );
        assert_eq!(
            decode("AC(DE)[]FG"),
            Err(SequenceError::InvalidShift {
                literal: "".to_string()
            })
        );
        assert_eq!(
            decode("AC(DE)FG"),
            Err(SequenceError::MissingShift { position: 5 })
        );
        assert_eq!(
            decode("AC(D(E)[+1.0]"),
            Err(SequenceError::NestedRun { position: 4 })
        );
        assert_eq!(
            decode("ACD)[+1.0]"),
            Err(SequenceError::UnmatchedClose { position: 3 })
        );
        assert_eq!(
            decode("AC(DEFG"),
            Err(SequenceError::UnterminatedRun { position: 2 })
        );
    }

    #[test]
    fn walker_stops_after_error() {
        let mut walker = SequenceWalker::new("A)[1]C");
        assert!(matches!(
            walker.next(),
            Some(Ok(SequenceToken::Residue { code1: 'A', .. }))
        ));
        assert!(matches!(walker.next(), Some(Err(_))));
        assert!(walker.next().is_none());
    }

    #[test]
    fn strip() {
        assert_eq!(strip_annotations("PEP(TI)[+15.9949]DE"), "PEPTIDE");
        assert_eq!(strip_annotations("(A)[-1e-3]C"), "AC");
    }
}
