use crate::chemistry::constants::WATER_ADDUCT;
use crate::chemistry::sequence::{SequenceToken, SequenceWalker};
use crate::chemistry::table::ResidueTable;
use crate::errors::SequenceError;
use crate::msms::model::{Ion, IonKind, IonSeries};

// --- Compute prefix (B) and suffix (Y) ions of an annotated peptide sequence --- //
//
// A prefix ion is emitted after each residue, except while a modification run
// is open: the residues of a run produce a single ion, at the run closure,
// carrying the shifted mass. A residue written as the last character of the
// sequence only contributes to the total mass. Every prefix ion has exactly
// one complementary suffix ion.
pub fn compute_ion_series(annotated: &str, residue_table: &ResidueTable) -> Result<IonSeries, SequenceError> {

    let final_residue_position = annotated
        .char_indices()
        .last()
        .filter(|(_, c)| c.is_ascii_alphabetic())
        .map(|(position, _)| position);

    let mut walker = SequenceWalker::new(annotated);
    let mut prefix_ions: Vec<Ion> = Vec::with_capacity(annotated.len());
    let mut prefix_mass = 0.0;
    let mut final_residue_mass = 0.0;
    let mut inside_run = false;

    for token in walker.by_ref() {
        match token? {
            SequenceToken::Residue { code1, index, position } => {
                let residue_mass = residue_table
                    .mass_of(code1)
                    .ok_or(SequenceError::UnknownResidue { residue: code1, position })?;

                if Some(position) == final_residue_position {
                    final_residue_mass = residue_mass;
                    continue;
                }

                prefix_mass += residue_mass;
                if !inside_run {
                    prefix_ions.push(Ion { kind: IonKind::Prefix, ordinal: index + 1, mass: prefix_mass });
                }
            }
            SequenceToken::RunOpen { .. } => {
                inside_run = true;
            }
            SequenceToken::RunClose { end, shift, .. } => {
                prefix_mass += shift;
                inside_run = false;
                prefix_ions.push(Ion { kind: IonKind::Prefix, ordinal: end, mass: prefix_mass });
            }
        }
    }

    let residue_count = walker.residue_count();
    let total_mass = prefix_mass + final_residue_mass;

    let suffix_ions: Vec<Ion> = prefix_ions.iter().map(|prefix_ion| {
        Ion {
            kind: IonKind::Suffix,
            ordinal: residue_count - prefix_ion.ordinal,
            mass: total_mass - prefix_ion.mass + WATER_ADDUCT,
        }
    }).collect();

    prefix_ions.extend(suffix_ions);

    Ok(IonSeries::from_unsorted(prefix_ions))
}
