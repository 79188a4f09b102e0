use std::collections::HashMap;
use std::fmt::Write as _;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};
use serde::Serialize;

use crate::errors::Result;
use crate::io::skip_malformed;
use crate::ms::tolerance::SortedPeaks;
use crate::msms::annotator::{BLOCK_BEGIN, BLOCK_END, PRSM_BLOCK};
use crate::msms::model::{ExperimentalScan, FoundPeak, Ion, TheoreticIdentification};

/// The scans reported by one source (usually one deconvolution program, possibly
/// merged from several files), keyed by spectrum id.
///
/// Peak arrays are sorted once, when a scan is added, so every later lookup
/// can rely on the sorted order.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ResultSet {
    name: String,
    peaks_by_id: HashMap<u32, SortedPeaks>,
}

impl ResultSet {
    pub fn new(name: impl Into<String>) -> Self {
        ResultSet {
            name: name.into(),
            peaks_by_id: HashMap::new(),
        }
    }

    /// Builds a result set from a stream of scans; malformed scans are skipped.
    pub fn from_scans<I>(name: impl Into<String>, scans: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<ExperimentalScan>>,
    {
        let mut result_set = ResultSet::new(name);
        result_set.extend_from(scans)?;
        Ok(result_set)
    }

    pub fn extend_from<I>(&mut self, scans: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<ExperimentalScan>>,
    {
        let mut n_scans = 0;
        for scan in skip_malformed(scans, "experimental scan") {
            self.insert(scan?);
            n_scans += 1;
        }
        info!("{}: loaded {} scans ({} distinct)", self.name, n_scans, self.len());
        Ok(n_scans)
    }

    /// A later scan with the same id replaces the earlier one.
    pub fn insert(&mut self, scan: ExperimentalScan) {
        self.peaks_by_id.insert(scan.id, SortedPeaks::from(scan.peaks));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peaks(&self, id: u32) -> Option<&SortedPeaks> {
        self.peaks_by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.peaks_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks_by_id.is_empty()
    }
}

// --- Cross-program search: which sources contain each ion of an identification --- //
pub fn find_ion_sources<'s>(
    identification: &TheoreticIdentification,
    sources: &'s [ResultSet],
    accuracy: f64,
) -> Vec<(Ion, Vec<&'s str>)> {
    let findings: Vec<(&str, &SortedPeaks)> = sources
        .iter()
        .filter_map(|source| source.peaks(identification.id).map(|peaks| (source.name(), peaks)))
        .collect();

    identification
        .ions()
        .iter()
        .map(|ion| {
            let finders = findings
                .iter()
                .filter(|(_, peaks)| peaks.contains(ion.mass, accuracy))
                .map(|(name, _)| *name)
                .collect();
            (*ion, finders)
        })
        .collect()
}

pub fn write_search_block<W: Write>(
    out: &mut W,
    identification: &TheoreticIdentification,
    ion_sources: &[(Ion, Vec<&str>)],
) -> std::io::Result<()> {
    let mut block = String::with_capacity(32 * (ion_sources.len() + 4));

    let _ = writeln!(block, "{}{}", BLOCK_BEGIN, PRSM_BLOCK);
    let _ = writeln!(block, "SPECTRUM_ID={}", identification.id);
    for (ion, finders) in ion_sources {
        let _ = writeln!(block, "ION {} {}", ion.label(), ion.mass);
        for finder in finders {
            let _ = writeln!(block, "{}", finder);
        }
    }
    let _ = writeln!(block, "{}{}", BLOCK_END, PRSM_BLOCK);
    block.push('\n');

    out.write_all(block.as_bytes())
}

/// Writes, for every identification, each ion and the sources containing it.
pub fn search_peaks<I, W>(identifications: I, sources: &[ResultSet], accuracy: f64, out: &mut W) -> Result<usize>
where
    I: IntoIterator<Item = Result<TheoreticIdentification>>,
    W: Write,
{
    let mut n_searched = 0;
    for identification in skip_malformed(identifications, "theoretic table row") {
        let identification = identification?;
        let ion_sources = find_ion_sources(&identification, sources, accuracy);
        write_search_block(out, &identification, &ion_sources)?;
        n_searched += 1;
    }
    out.flush()?;

    info!("searched {} identifications in {} sources", n_searched, sources.len());
    Ok(n_searched)
}

// --- Inclusion/exclusion across sources --- //

/// Ions of `identification` contained in every `required` source and in none
/// of the `excluded` ones. `None` when a required source has no scan for it.
pub fn exclusive_ions(
    identification: &TheoreticIdentification,
    required: &[ResultSet],
    excluded: &[ResultSet],
    accuracy: f64,
) -> Option<Vec<Ion>> {
    let required_peaks = required
        .iter()
        .map(|source| source.peaks(identification.id))
        .collect::<Option<Vec<&SortedPeaks>>>()?;
    let excluded_peaks: Vec<&SortedPeaks> = excluded
        .iter()
        .filter_map(|source| source.peaks(identification.id))
        .collect();

    let ions = identification
        .ions()
        .iter()
        .filter(|ion| {
            required_peaks.iter().all(|peaks| peaks.contains(ion.mass, accuracy))
                && !excluded_peaks.iter().any(|peaks| peaks.contains(ion.mass, accuracy))
        })
        .copied()
        .collect();

    Some(ions)
}

pub fn exclusively_found<I>(
    identifications: I,
    required: &[ResultSet],
    excluded: &[ResultSet],
    accuracy: f64,
) -> Result<Vec<FoundPeak>>
where
    I: IntoIterator<Item = Result<TheoreticIdentification>>,
{
    let mut found_peaks = Vec::new();
    for identification in skip_malformed(identifications, "theoretic table row") {
        let identification = identification?;
        let ions = match exclusive_ions(&identification, required, excluded, accuracy) {
            Some(ions) if !ions.is_empty() => ions,
            _ => continue,
        };
        debug!("identification {}: {} exclusive ions", identification.id, ions.len());

        let identification = Rc::new(identification);
        found_peaks.extend(ions.into_iter().map(|ion| FoundPeak {
            identification: Rc::clone(&identification),
            ion,
        }));
    }
    Ok(found_peaks)
}

pub fn count_exclusively_found<I>(
    identifications: I,
    required: &[ResultSet],
    excluded: &[ResultSet],
    accuracy: f64,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<TheoreticIdentification>>,
{
    let mut count = 0;
    for identification in skip_malformed(identifications, "theoretic table row") {
        let identification = identification?;
        count += exclusive_ions(&identification, required, excluded, accuracy).map_or(0, |ions| ions.len());
    }
    Ok(count)
}

#[derive(Serialize)]
struct FoundPeakRow {
    spectrum_id: u32,
    prsm_id: u32,
    ion: String,
    mass: f64,
}

/// Tab-separated listing of found peaks, one row per ion.
pub fn write_found_peaks<W: Write>(out: W, found_peaks: &[FoundPeak]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
    for found in found_peaks {
        writer.serialize(FoundPeakRow {
            spectrum_id: found.identification.id,
            prsm_id: found.identification.prsm_id,
            ion: found.ion.label(),
            mass: found.ion.mass,
        })?;
    }
    writer.flush()?;
    Ok(())
}
