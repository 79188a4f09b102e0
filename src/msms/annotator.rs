use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write;

use log::{debug, info};

use crate::config::AnalysisConfig;
use crate::errors::Result;
use crate::io::skip_malformed;
use crate::msms::model::{ExperimentalScan, IonMatch, IonSeries, TheoreticIdentification};

pub(crate) const BLOCK_BEGIN: &str = "BEGIN ";
pub(crate) const BLOCK_END: &str = "END ";
pub(crate) const PRSM_BLOCK: &str = "PRISM";
const MASS_SHIFT_BLOCK: &str = "MASS_SHIFT";
const MATCH_PAIR_BLOCK: &str = "MATCH_PAIR";

#[derive(Clone, PartialEq, Debug, Default)]
pub struct ScanAnnotation {
    /// Every (ion, peak) pair within tolerance, ordered by ion mass.
    pub matches: Vec<IonMatch>,
    /// Peaks that matched no ion at all.
    pub unmatched_peaks: usize,
}

// --- Match every experimental peak against the theoretic ions (range-listing policy) --- //
pub fn annotate_scan(ions: &IonSeries, peaks: &[f64], accuracy: f64) -> ScanAnnotation {
    let mut annotation = ScanAnnotation::default();

    for &peak_mass in peaks {
        let matching_ions = ions.matching(peak_mass, accuracy);
        if matching_ions.is_empty() {
            annotation.unmatched_peaks += 1;
            continue;
        }
        annotation
            .matches
            .extend(matching_ions.iter().map(|ion| IonMatch { ion: *ion, peak_mass }));
    }

    // stable: matches of one ion keep the peak order
    annotation.matches.sort_by(|a, b| a.ion.mass.total_cmp(&b.ion.mass));
    annotation
}

/// Pairs each scan with its identification (if present and below the
/// e-value threshold) and annotates it. Malformed scans are skipped.
pub fn annotated_scans<'a, I>(
    experimental_scans: I,
    identification_by_id: &'a HashMap<u32, TheoreticIdentification>,
    config: &'a AnalysisConfig,
) -> impl Iterator<Item = Result<(&'a TheoreticIdentification, ExperimentalScan, ScanAnnotation)>> + 'a
where
    I: IntoIterator<Item = Result<ExperimentalScan>>,
    I: 'a,
{
    skip_malformed(experimental_scans, "experimental scan").filter_map(move |scan_res| {
        let scan = match scan_res {
            Ok(scan) => scan,
            Err(err) => return Some(Err(err)),
        };
        let identification = identification_by_id
            .get(&scan.id)
            .filter(|identification| config.accepts_e_value(identification.e_value))?;

        let annotation = annotate_scan(identification.ions(), &scan.peaks, config.accuracy);
        debug!(
            "scan {}: {} matches, {} unmatched peaks",
            scan.id,
            annotation.matches.len(),
            annotation.unmatched_peaks
        );
        Some(Ok((identification, scan, annotation)))
    })
}

/// Renders one annotation block. The block is built in memory and written
/// with a single call so a failing writer never sees half a block.
pub fn write_annotation_block<W: Write>(
    out: &mut W,
    scan_id: u32,
    identification: &TheoreticIdentification,
    annotation: &ScanAnnotation,
) -> std::io::Result<()> {
    let mut block = String::with_capacity(64 * (annotation.matches.len() + 8));

    // writing into a String cannot fail
    let _ = writeln!(block, "{}{}", BLOCK_BEGIN, PRSM_BLOCK);
    let _ = writeln!(block, "SPECTRUM_ID={}", scan_id);

    let _ = writeln!(block, "{}{}", BLOCK_BEGIN, MASS_SHIFT_BLOCK);
    for shift in identification.modifications() {
        let _ = writeln!(block, "{:<3} {:<3} {:<3} {:.6}", shift.index, shift.start, shift.end, shift.mass);
    }
    let _ = writeln!(block, "{}{}", BLOCK_END, MASS_SHIFT_BLOCK);

    let _ = writeln!(block, "{}{}", BLOCK_BEGIN, MATCH_PAIR_BLOCK);
    for (rank, ion_match) in annotation.matches.iter().enumerate() {
        let _ = writeln!(
            block,
            "{:<3} {:<18.6} {}{:<2} {:<18.6}",
            rank, ion_match.peak_mass, ion_match.ion.kind, ion_match.ion.ordinal, ion_match.ion.mass
        );
    }
    let _ = writeln!(block, "{}{}", BLOCK_END, MATCH_PAIR_BLOCK);

    let _ = writeln!(block, "UNMATCHED_PEAKS={}", annotation.unmatched_peaks);
    let _ = writeln!(block, "{}{}", BLOCK_END, PRSM_BLOCK);
    block.push('\n');

    out.write_all(block.as_bytes())
}

/// Writes the annotation report for a stream of experimental scans and
/// returns the number of annotated scans.
pub fn annotate<I, W>(
    experimental_scans: I,
    identification_by_id: &HashMap<u32, TheoreticIdentification>,
    config: &AnalysisConfig,
    out: &mut W,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<ExperimentalScan>>,
    W: Write,
{
    let mut n_annotated = 0;
    for annotated in annotated_scans(experimental_scans, identification_by_id, config) {
        let (identification, scan, annotation) = annotated?;
        write_annotation_block(out, scan.id, identification, &annotation)?;
        n_annotated += 1;
    }
    out.flush()?;

    info!("annotated {} scans", n_annotated);
    Ok(n_annotated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::msms::model::{IonKind, TheoreticRecord};

    fn identification(id: u32, sequence: &str, e_value: f64) -> TheoreticIdentification {
        TheoreticIdentification::try_from(TheoreticRecord {
            id,
            prsm_id: 0,
            charge: 2,
            precursor_mass: 0.0,
            e_value,
            sequence: sequence.to_string(),
        })
        .unwrap()
    }

    fn scan(id: u32, peaks: Vec<f64>) -> ExperimentalScan {
        ExperimentalScan {
            id,
            prsm_id: 0,
            charge: 2,
            precursor_mass: 0.0,
            peaks,
        }
    }

    #[test]
    fn annotate_scan_lists_every_match() {
        let ident = identification(1, "AC(DE)[+10.0]FG", 0.0);
        // B1 71.03711, Y1 75.03674, B2 174.0463, ..., Y5 579.18387
        let peaks = vec![579.185, 71.0372, 300.0, 174.0462, 10.0];
        let annotation = annotate_scan(ident.ions(), &peaks, 1e-5);

        assert_eq!(annotation.unmatched_peaks, 2);
        let labels: Vec<String> = annotation.matches.iter().map(|m| m.ion.label()).collect();
        assert_eq!(labels, vec!["B1", "B2", "Y5"]);
        assert_eq!(annotation.matches[0].peak_mass, 71.0372);
        assert_eq!(annotation.matches[2].ion.kind, IonKind::Suffix);
    }

    #[test]
    fn block_layout() {
        let ident = identification(9, "AC(DE)[+10.0]FG", 0.0);
        let annotation = annotate_scan(ident.ions(), &[71.0372, 5.0], 1e-5);

        let mut out = Vec::new();
        write_annotation_block(&mut out, 9, &ident, &annotation).unwrap();
        let text = String::from_utf8(out).unwrap();

        let expected = "BEGIN PRISM\n\
                        SPECTRUM_ID=9\n\
                        BEGIN MASS_SHIFT\n\
                        0   2   4   10.000000\n\
                        END MASS_SHIFT\n\
                        BEGIN MATCH_PAIR\n\
                        0   71.037200          B1  71.037110         \n\
                        END MATCH_PAIR\n\
                        UNMATCHED_PEAKS=1\n\
                        END PRISM\n\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn annotate_filters_by_presence_and_e_value() {
        let mut by_id = HashMap::new();
        by_id.insert(1, identification(1, "PEPTIDEK", 1e-12));
        by_id.insert(2, identification(2, "PEPTIDEK", 1e-3));

        let scans: Vec<Result<ExperimentalScan>> = vec![
            Ok(scan(1, vec![97.0528, 1.0])),
            Err(Error::record(10, "broken")),
            Ok(scan(2, vec![98.06])),
            Ok(scan(3, vec![98.06])),
        ];

        let mut out = Vec::new();
        let n = annotate(scans, &by_id, &AnalysisConfig::default(), &mut out).unwrap();
        assert_eq!(n, 1);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("BEGIN PRISM").count(), 1);
        assert!(text.contains("SPECTRUM_ID=1\n"));
        assert!(text.contains("UNMATCHED_PEAKS=1\n"));
    }

    #[test]
    fn io_failure_aborts_the_batch() {
        let by_id = HashMap::new();
        let scans: Vec<Result<ExperimentalScan>> = vec![
            Err(Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk"))),
            Ok(scan(1, vec![])),
        ];
        let mut out = Vec::new();
        let err = annotate(scans, &by_id, &AnalysisConfig::default(), &mut out).unwrap_err();
        assert!(!err.is_parse());
        assert!(out.is_empty());
    }
}
