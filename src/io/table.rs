use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::chemistry::table::{ResidueTable, STANDARD_RESIDUE_TABLE};
use crate::errors::{Error, Result};
use crate::io::skip_malformed;
use crate::msms::model::{TheoreticIdentification, TheoreticRecord};

lazy_static! {
    // "K.PEP(TI)[+15.9949]DE.L" -> "PEP(TI)[+15.9949]DE"
    static ref FLANKED_SEQUENCE: Regex = Regex::new(r"^[A-Z\-]?\.(.*)\.[A-Z\-]?$").unwrap();
}

/// Removes the residue-context markers (`X.` / `.X`) around a table sequence.
pub fn strip_flanking_residues(sequence: &str) -> &str {
    FLANKED_SEQUENCE
        .captures(sequence)
        .and_then(|captures| captures.get(1))
        .map_or(sequence, |inner| inner.as_str())
}

/// 0-based positions of the fields used from a theoretic table row.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TableColumns {
    pub prsm_id: usize,
    pub id: usize,
    pub charge: usize,
    pub precursor_mass: usize,
    pub sequence: usize,
    pub e_value: usize,
}

impl Default for TableColumns {
    fn default() -> Self {
        TableColumns {
            prsm_id: 1,
            id: 2,
            charge: 5,
            precursor_mass: 6,
            sequence: 13,
            e_value: 18,
        }
    }
}

fn field<'r>(record: &'r csv::StringRecord, line: u64, idx: usize, what: &str) -> Result<&'r str> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| Error::record(line, format!("missing {} column ({})", what, idx)))
}

fn parse_field<T: FromStr>(record: &csv::StringRecord, line: u64, idx: usize, what: &str) -> Result<T> {
    let value = field(record, line, idx, what)?;
    value
        .parse::<T>()
        .map_err(|_| Error::record(line, format!("invalid {} '{}'", what, value)))
}

fn parse_float(record: &csv::StringRecord, line: u64, idx: usize, what: &str) -> Result<f64> {
    let value = field(record, line, idx, what)?;
    fast_float::parse::<f64, _>(value)
        .map_err(|_| Error::record(line, format!("invalid {} '{}'", what, value)))
}

impl TableColumns {
    pub fn parse_record(&self, record: &csv::StringRecord) -> Result<TheoreticRecord> {
        let line = record.position().map_or(0, |pos| pos.line());

        let e_value = parse_float(record, line, self.e_value, "e-value")?;
        if e_value.is_nan() || e_value < 0.0 {
            return Err(Error::record(line, format!("negative e-value {}", e_value)));
        }

        Ok(TheoreticRecord {
            id: parse_field(record, line, self.id, "spectrum id")?,
            prsm_id: parse_field(record, line, self.prsm_id, "prsm id")?,
            charge: parse_field(record, line, self.charge, "charge")?,
            precursor_mass: parse_float(record, line, self.precursor_mass, "precursor mass")?,
            e_value,
            sequence: strip_flanking_residues(field(record, line, self.sequence, "sequence")?).to_string(),
        })
    }
}

/// Lazy reader over the rows of a tab-separated theoretic table (first row is a header).
pub struct TheoreticTableReader<R> {
    records: csv::StringRecordsIntoIter<R>,
    columns: TableColumns,
    residue_table: ResidueTable,
}

impl TheoreticTableReader<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file))
    }
}

impl<R: Read> TheoreticTableReader<R> {
    pub fn new(reader: R) -> Self {
        let records = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .quoting(false)
            .from_reader(reader)
            .into_records();

        TheoreticTableReader {
            records,
            columns: TableColumns::default(),
            residue_table: STANDARD_RESIDUE_TABLE,
        }
    }

    pub fn with_columns(mut self, columns: TableColumns) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_residue_table(mut self, residue_table: ResidueTable) -> Self {
        self.residue_table = residue_table;
        self
    }
}

impl<R: Read> Iterator for TheoreticTableReader<R> {
    type Item = Result<TheoreticIdentification>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err.into())),
        };

        Some(
            self.columns
                .parse_record(&record)
                .and_then(|raw| TheoreticIdentification::new(raw, &self.residue_table)),
        )
    }
}

/// Collects identifications by spectrum id, skipping malformed rows. A row
/// repeating an earlier spectrum id replaces it, with a warning.
pub fn identification_map<I>(identifications: I) -> Result<HashMap<u32, TheoreticIdentification>>
where
    I: IntoIterator<Item = Result<TheoreticIdentification>>,
{
    let mut identification_by_id = HashMap::new();
    for identification in skip_malformed(identifications, "theoretic table row") {
        let identification = identification?;
        debug!("loaded identification {} ({})", identification.id, identification.sequence());
        if let Some(previous) = identification_by_id.insert(identification.id, identification) {
            warn!("spectrum {} listed twice, keeping the later row", previous.id);
        }
    }

    info!("loaded {} identifications", identification_by_id.len());
    Ok(identification_by_id)
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum IdentificationFilter {
    EValueUnder(f64),
    EValueOver(f64),
    Modified,
    NotModified,
}

impl IdentificationFilter {
    pub fn accepts(&self, identification: &TheoreticIdentification) -> bool {
        match *self {
            IdentificationFilter::EValueUnder(value) => identification.e_value < value,
            IdentificationFilter::EValueOver(value) => identification.e_value > value,
            IdentificationFilter::Modified => identification.is_modified(),
            IdentificationFilter::NotModified => !identification.is_modified(),
        }
    }
}

/// Number of identifications passing every filter; malformed rows are skipped.
pub fn count_identifications<I>(identifications: I, filters: &[IdentificationFilter]) -> Result<usize>
where
    I: IntoIterator<Item = Result<TheoreticIdentification>>,
{
    let mut count = 0;
    for identification in skip_malformed(identifications, "theoretic table row") {
        let identification = identification?;
        if filters.iter().all(|filter| filter.accepts(&identification)) {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(prsm_id: &str, id: &str, charge: &str, mass: &str, sequence: &str, e_value: &str) -> String {
        let mut fields = vec!["-"; 19];
        fields[1] = prsm_id;
        fields[2] = id;
        fields[5] = charge;
        fields[6] = mass;
        fields[13] = sequence;
        fields[18] = e_value;
        fields.join("\t")
    }

    fn table() -> String {
        [
            (0..19).map(|i| format!("col{}", i)).collect::<Vec<_>>().join("\t"),
            row("0", "101", "2", "1200.5", "K.PEPTIDE.L", "1e-12"),
            row("1", "102", "3", "1400.25", "-.AC(DE)[+10.0]FG.-", "3.5e-4"),
            row("2", "103", "x", "900.0", "R.GGG.K", "1e-20"),
            row("3", "104", "1", "800.0", "R.GB.K", "1e-20"),
            row("4", "105", "1", "700.0", "R.GW.K", "1e-15"),
        ]
        .join("\n")
    }

    #[test]
    fn strips_flanking_residues() {
        assert_eq!(strip_flanking_residues("K.PEPTIDE.L"), "PEPTIDE");
        assert_eq!(strip_flanking_residues("-.PEP(T)[+79.96633]IDE.-"), "PEP(T)[+79.96633]IDE");
        assert_eq!(strip_flanking_residues("PEP(T)[+1.5]IDE"), "PEP(T)[+1.5]IDE");
    }

    #[test]
    fn reads_rows_and_reports_malformed_ones() {
        let rows: Vec<Result<TheoreticIdentification>> = TheoreticTableReader::new(table().as_bytes()).collect();
        assert_eq!(rows.len(), 5);

        let first = rows[0].as_ref().unwrap();
        assert_eq!((first.id, first.prsm_id, first.charge), (101, 0, 2));
        assert_eq!(first.precursor_mass, 1200.5);
        assert_eq!(first.e_value, 1e-12);
        assert_eq!(first.sequence(), "PEPTIDE");

        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.sequence(), "AC(DE)[+10.0]FG");
        assert!(second.is_modified());

        assert!(matches!(rows[2], Err(Error::Record { line: 4, .. })));
        assert!(matches!(rows[3], Err(Error::Sequence { .. })));
        assert!(rows[4].is_ok());
    }

    #[test]
    fn map_skips_malformed_rows() {
        let by_id = identification_map(TheoreticTableReader::new(table().as_bytes())).unwrap();
        let mut ids: Vec<u32> = by_id.keys().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![101, 102, 105]);
    }

    #[test]
    fn later_rows_replace_duplicate_ids() {
        let text = [
            table(),
            row("5", "101", "2", "1300.0", "K.GGG.L", "1e-14"),
        ]
        .join("\n");
        let by_id = identification_map(TheoreticTableReader::new(text.as_bytes())).unwrap();
        assert_eq!(by_id.len(), 3);
        assert_eq!(by_id[&101].sequence(), "GGG");
        assert_eq!(by_id[&101].prsm_id, 5);
    }

    #[test]
    fn custom_columns_and_residues() {
        let columns = TableColumns {
            prsm_id: 0,
            id: 1,
            charge: 2,
            precursor_mass: 3,
            sequence: 4,
            e_value: 5,
        };
        let mut residues = STANDARD_RESIDUE_TABLE;
        residues.insert('B', 100.0);

        let text = "prsm\tid\tz\tmass\tseq\tevalue\n7\t8\t2\t300.0\tR.GB.K\t1e-30";
        let identification = TheoreticTableReader::new(text.as_bytes())
            .with_columns(columns)
            .with_residue_table(residues)
            .next()
            .unwrap()
            .unwrap();

        assert_eq!((identification.prsm_id, identification.id), (7, 8));
        assert_eq!(identification.sequence(), "GB");
        assert_eq!(identification.ions().len(), 2);
    }

    #[test]
    fn counts_with_filters() {
        let count = |filters: &[IdentificationFilter]| {
            count_identifications(TheoreticTableReader::new(table().as_bytes()), filters).unwrap()
        };
        assert_eq!(count(&[]), 3);
        assert_eq!(count(&[IdentificationFilter::EValueUnder(1e-10)]), 2);
        assert_eq!(count(&[IdentificationFilter::EValueOver(1e-10)]), 1);
        assert_eq!(count(&[IdentificationFilter::Modified]), 1);
        assert_eq!(
            count(&[IdentificationFilter::NotModified, IdentificationFilter::EValueUnder(1e-13)]),
            1
        );
    }
}
