use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::chemistry::sequence::{decode, MassShift};
use crate::chemistry::table::{ResidueTable, STANDARD_RESIDUE_TABLE};
use crate::errors::{Error, Result};
use crate::ms::tolerance::range_within;
use crate::msms::fragmentation::compute_ion_series;

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub enum IonKind {
    /// "B" ion, counted from the N-terminus
    Prefix,
    /// "Y" ion, counted from the C-terminus
    Suffix,
}

impl IonKind {
    pub fn letter(&self) -> char {
        match self {
            IonKind::Prefix => 'B',
            IonKind::Suffix => 'Y',
        }
    }
}

impl std::fmt::Display for IonKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Ion {
    pub kind: IonKind,
    pub ordinal: usize,
    pub mass: f64,
}

impl Ion {
    pub fn label(&self) -> String {
        format!("{}{}", self.kind, self.ordinal)
    }
}

/// Fragment ions of one peptide, non-decreasing by mass.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct IonSeries(Vec<Ion>);

impl IonSeries {
    pub(crate) fn from_unsorted(mut ions: Vec<Ion>) -> Self {
        ions.sort_by(|a, b| a.mass.total_cmp(&b.mass));
        IonSeries(ions)
    }

    pub fn of_kind(&self, kind: IonKind) -> impl Iterator<Item = &Ion> + '_ {
        self.0.iter().filter(move |ion| ion.kind == kind)
    }

    /// Every ion whose mass lies strictly inside `peak ± peak * accuracy`.
    pub fn matching(&self, peak: f64, accuracy: f64) -> &[Ion] {
        range_within(&self.0, |ion| ion.mass, peak, accuracy)
    }
}

impl Deref for IonSeries {
    type Target = [Ion];

    fn deref(&self) -> &[Ion] {
        &self.0
    }
}

/// One row of a theoretic identification table, before the sequence is interpreted.
#[derive(Clone, PartialEq, Debug)]
pub struct TheoreticRecord {
    pub id: u32,
    pub prsm_id: u32,
    pub charge: i32,
    pub precursor_mass: f64,
    pub e_value: f64,
    pub sequence: String,
}

/// A scored peptide identification with its fragment ions and modifications.
/// Both are derived from `sequence` once, at construction.
#[derive(Clone, PartialEq, Debug)]
pub struct TheoreticIdentification {
    pub id: u32,
    pub prsm_id: u32,
    pub charge: i32,
    pub precursor_mass: f64,
    pub e_value: f64,
    sequence: String,
    residue_count: usize,
    modifications: Vec<MassShift>,
    ions: IonSeries,
}

impl TheoreticIdentification {
    pub fn new(record: TheoreticRecord, residue_table: &ResidueTable) -> Result<Self> {
        let invalid = |source| Error::Sequence {
            sequence: record.sequence.clone(),
            source,
        };
        let decoded = decode(&record.sequence).map_err(invalid)?;
        let ions = compute_ion_series(&record.sequence, residue_table).map_err(invalid)?;

        Ok(TheoreticIdentification {
            id: record.id,
            prsm_id: record.prsm_id,
            charge: record.charge,
            precursor_mass: record.precursor_mass,
            e_value: record.e_value,
            sequence: record.sequence,
            residue_count: decoded.residue_count,
            modifications: decoded.modifications,
            ions,
        })
    }

    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    pub fn residue_count(&self) -> usize {
        self.residue_count
    }

    pub fn modifications(&self) -> &[MassShift] {
        &self.modifications
    }

    pub fn is_modified(&self) -> bool {
        !self.modifications.is_empty()
    }

    pub fn ions(&self) -> &IonSeries {
        &self.ions
    }
}

impl TryFrom<TheoreticRecord> for TheoreticIdentification {
    type Error = Error;

    fn try_from(record: TheoreticRecord) -> Result<Self> {
        TheoreticIdentification::new(record, &STANDARD_RESIDUE_TABLE)
    }
}

/// A deconvoluted scan as reported by one deconvolution program. Peaks keep
/// the order the program wrote them in.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ExperimentalScan {
    pub id: u32,
    pub prsm_id: u32,
    pub charge: i32,
    pub precursor_mass: f64,
    pub peaks: Vec<f64>,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct IonMatch {
    pub ion: Ion,
    pub peak_mass: f64,
}

impl IonMatch {
    /// Experimental minus theoretic mass.
    pub fn mass_difference(&self) -> f64 {
        self.peak_mass - self.ion.mass
    }

    pub fn relative_error(&self) -> f64 {
        self.mass_difference() / self.ion.mass
    }
}

/// An ion of an identification that passed a cross-source inclusion/exclusion query.
#[derive(Clone, PartialEq, Debug)]
pub struct FoundPeak {
    pub identification: std::rc::Rc<TheoreticIdentification>,
    pub ion: Ion,
}
