use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{Error, Result};
use crate::io::reader::TextReader;
use crate::msms::model::ExperimentalScan;

const SCAN_END: &str = "END IONS";

lazy_static! {
    static ref SCAN_NUMBER: Regex = Regex::new(r"scan=(\d+)").unwrap();
}

/// Deconvolution programs whose output can be read as experimental scans.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum DeconvolutionProgram {
    MsDeconv,
    ThermoXtract,
    Hardklor,
}

impl DeconvolutionProgram {
    pub const ALL: [DeconvolutionProgram; 3] = [
        DeconvolutionProgram::MsDeconv,
        DeconvolutionProgram::ThermoXtract,
        DeconvolutionProgram::Hardklor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DeconvolutionProgram::MsDeconv => "MSDeconv",
            DeconvolutionProgram::ThermoXtract => "ThermoXtract",
            DeconvolutionProgram::Hardklor => "Hardklor",
        }
    }

    pub fn open(&self, path: impl AsRef<Path>) -> io::Result<ScanReader<io::BufReader<File>>> {
        let text_reader = TextReader::open(path, 1024 * 1024)?; // buffer capacity = 1MB
        Ok(ScanReader::with_text_reader(*self, text_reader))
    }

    pub fn reader<R: BufRead>(&self, reader: R) -> ScanReader<R> {
        ScanReader::with_text_reader(*self, TextReader::new(reader))
    }
}

impl std::fmt::Display for DeconvolutionProgram {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DeconvolutionProgram {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DeconvolutionProgram::ALL
            .iter()
            .find(|program| program.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown deconvolution program '{}'", s))
    }
}

/// Lazy, forward-only sequence of the scans written by one program.
///
/// A malformed scan is reported as a single `Error::Record` and the reader
/// resumes with the next scan; I/O failures end the sequence.
pub struct ScanReader<R> {
    program: DeconvolutionProgram,
    lines: TextReader<R>,
    // Hardklor has no end marker: the line that starts the next scan is kept here.
    pending: Option<(u64, String)>,
}

fn empty_scan() -> ExperimentalScan {
    ExperimentalScan {
        id: 0,
        prsm_id: 0,
        charge: 0,
        precursor_mass: 0.0,
        peaks: Vec::new(),
    }
}

fn parse_int<T: FromStr>(value: &str, line: u64, what: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::record(line, format!("invalid {} '{}'", what, value)))
}

fn parse_mass(value: &str, line: u64, what: &str) -> Result<f64> {
    fast_float::parse::<f64, _>(value.trim())
        .map_err(|_| Error::record(line, format!("invalid {} '{}'", what, value)))
}

impl<R: BufRead> ScanReader<R> {
    fn with_text_reader(program: DeconvolutionProgram, lines: TextReader<R>) -> Self {
        ScanReader {
            program,
            lines,
            pending: None,
        }
    }

    pub fn program(&self) -> DeconvolutionProgram {
        self.program
    }

    // --- MSDeconv and ThermoXtract: header lines and peak lines closed by "END IONS" --- //
    fn next_ions_block(&mut self) -> Option<Result<ExperimentalScan>> {
        let mut scan = empty_scan();
        let mut failure: Option<Error> = None;

        while let Some(line_res) = self.lines.next() {
            let line = match line_res {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };

            if line == SCAN_END {
                return Some(match failure {
                    Some(err) => Err(err),
                    None => Ok(scan),
                });
            }

            // the rest of a broken block is skipped
            if failure.is_some() {
                continue;
            }

            let line_number = self.lines.line_number();
            let parsed = match self.program {
                DeconvolutionProgram::MsDeconv => parse_msdeconv_line(&line, line_number, &mut scan),
                _ => parse_xtract_line(&line, line_number, &mut scan),
            };
            if let Err(err) = parsed {
                failure = Some(err);
            }
        }

        // an unterminated trailing block is dropped, unless it was already broken
        failure.map(Err)
    }

    // --- Hardklor: one 'S' line followed by 'P' lines --- //
    fn next_hardklor_scan(&mut self) -> Option<Result<ExperimentalScan>> {
        let (header_number, header) = match self.pending.take() {
            Some(pending) => pending,
            None => loop {
                match self.lines.next()? {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => break (self.lines.line_number(), line),
                    Err(err) => return Some(Err(err.into())),
                }
            },
        };

        let mut result = parse_hardklor_header(&header, header_number);

        while let Some(line_res) = self.lines.next() {
            let line = match line_res {
                Ok(line) => line,
                Err(err) => return Some(Err(err.into())),
            };

            if !line.starts_with('P') {
                if !line.trim().is_empty() {
                    self.pending = Some((self.lines.line_number(), line));
                    break;
                }
                continue;
            }

            if let Ok(scan) = &mut result {
                let line_number = self.lines.line_number();
                match line.split('\t').nth(1) {
                    Some(field) => match parse_mass(field, line_number, "peak mass") {
                        Ok(mass) => scan.peaks.push(mass),
                        Err(err) => result = Err(err),
                    },
                    None => result = Err(Error::record(line_number, "peak line without a mass column")),
                }
            }
        }

        Some(result)
    }
}

fn parse_msdeconv_line(line: &str, line_number: u64, scan: &mut ExperimentalScan) -> Result<()> {
    let first_char = match line.chars().next() {
        Some(c) => c,
        None => return Ok(()),
    };

    if first_char.is_ascii_digit() {
        let mass = line.split('\t').next().unwrap_or(line);
        scan.peaks.push(parse_mass(mass, line_number, "peak mass")?);
        return Ok(());
    }

    match line.split_once('=') {
        Some(("ID", value)) => scan.id = parse_int(value, line_number, "scan id")?,
        Some(("PRECURSOR_MASS", value)) => scan.precursor_mass = parse_mass(value, line_number, "precursor mass")?,
        Some(("PRECURSOR_CHARGE", value)) => scan.charge = parse_int(value, line_number, "precursor charge")?,
        _ => {}
    }

    Ok(())
}

fn parse_xtract_line(line: &str, line_number: u64, scan: &mut ExperimentalScan) -> Result<()> {
    let first_char = match line.chars().next() {
        Some(c) => c,
        None => return Ok(()),
    };

    if first_char.is_ascii_digit() {
        let mass = line.split_ascii_whitespace().next().unwrap_or(line);
        scan.peaks.push(parse_mass(mass, line_number, "peak mass")?);
        return Ok(());
    }

    match line.split_once('=') {
        Some(("TITLE", value)) => {
            let captures = SCAN_NUMBER
                .captures_iter(value)
                .last()
                .ok_or_else(|| Error::record(line_number, "title carries no scan number"))?;
            scan.id = parse_int(&captures[1], line_number, "scan number")?;
        }
        Some(("PEPMASS", value)) => {
            let pep_mass = value.split_ascii_whitespace().next().unwrap_or("");
            scan.precursor_mass = parse_mass(pep_mass, line_number, "precursor mass")?;
        }
        Some(("CHARGE", value)) => {
            let digits_end = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
            let magnitude: i32 = parse_int(&value[..digits_end], line_number, "charge")?;
            scan.charge = if value[digits_end..].starts_with('-') { -magnitude } else { magnitude };
        }
        _ => {}
    }

    Ok(())
}

fn parse_hardklor_header(line: &str, line_number: u64) -> Result<ExperimentalScan> {
    if !line.starts_with('S') {
        return Err(Error::record(line_number, "expected a scan ('S') line"));
    }

    let tokens: Vec<&str> = line.split('\t').collect();
    if tokens.len() < 6 {
        return Err(Error::record(line_number, "scan line has fewer than 6 columns"));
    }

    Ok(ExperimentalScan {
        id: parse_int(tokens[1], line_number, "scan number")?,
        prsm_id: 0,
        charge: parse_int(tokens[5], line_number, "charge")?,
        precursor_mass: parse_mass(tokens[4], line_number, "precursor mass")?,
        peaks: Vec::new(),
    })
}

impl<R: BufRead> Iterator for ScanReader<R> {
    type Item = Result<ExperimentalScan>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.program {
            DeconvolutionProgram::MsDeconv | DeconvolutionProgram::ThermoXtract => self.next_ions_block(),
            DeconvolutionProgram::Hardklor => self.next_hardklor_scan(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSDECONV: &str = "BEGIN IONS
ID=12
SCANS=13
PRECURSOR_CHARGE=3
PRECURSOR_MASS=1500.75
300.5\t1000.0\t1
120.25\t500.0\t1
END IONS

BEGIN IONS
ID=13
PRECURSOR_MASS=oops
200.0\t1.0\t1
END IONS
BEGIN IONS
ID=14
PRECURSOR_MASS=900.0
END IONS
";

    const XTRACT: &str = "BEGIN IONS
TITLE=run.raw NativeID:\"controllerType=0 controllerNumber=1 scan=42\"
PEPMASS=812.4 1200.0
CHARGE=2+
812.4 1000.0
400.2 15.0
END IONS
";

    const HARDKLOR: &str = "S\t5\t1.2\trun.raw\t1100.5\t2
P\t550.25\t2\t1000.0
P\t300.125\t1\t200.0
S\t6\t1.3\trun.raw\tbad\t2
P\t10.0\t1\t1.0
S\t7\t1.4\trun.raw\t900.0\t1
";

    #[test]
    fn reads_msdeconv_scans_and_skips_broken_ones() {
        let scans: Vec<Result<ExperimentalScan>> = DeconvolutionProgram::MsDeconv.reader(MSDECONV.as_bytes()).collect();
        assert_eq!(scans.len(), 3);

        let first = scans[0].as_ref().unwrap();
        assert_eq!(first.id, 12);
        assert_eq!(first.charge, 3);
        assert_eq!(first.precursor_mass, 1500.75);
        assert_eq!(first.peaks, vec![300.5, 120.25]);

        let broken = scans[1].as_ref().unwrap_err();
        assert!(broken.is_parse());
        assert!(matches!(broken, Error::Record { line: 12, .. }), "{}", broken);

        let third = scans[2].as_ref().unwrap();
        assert_eq!(third.id, 14);
        assert!(third.peaks.is_empty());
    }

    #[test]
    fn reads_thermo_xtract_scans() {
        let scans: Vec<ExperimentalScan> = DeconvolutionProgram::ThermoXtract
            .reader(XTRACT.as_bytes())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(scans.len(), 1);
        assert_eq!(scans[0].id, 42);
        assert_eq!(scans[0].charge, 2);
        assert_eq!(scans[0].precursor_mass, 812.4);
        assert_eq!(scans[0].peaks, vec![812.4, 400.2]);
    }

    #[test]
    fn reads_hardklor_scans() {
        let scans: Vec<Result<ExperimentalScan>> = DeconvolutionProgram::Hardklor.reader(HARDKLOR.as_bytes()).collect();
        assert_eq!(scans.len(), 3);

        let first = scans[0].as_ref().unwrap();
        assert_eq!((first.id, first.charge, first.precursor_mass), (5, 2, 1100.5));
        assert_eq!(first.peaks, vec![550.25, 300.125]);

        assert!(matches!(scans[1], Err(Error::Record { line: 4, .. })));

        let last = scans[2].as_ref().unwrap();
        assert_eq!(last.id, 7);
        assert!(last.peaks.is_empty());
    }

    #[test]
    fn unterminated_block_is_dropped() {
        let mut reader = DeconvolutionProgram::MsDeconv.reader("BEGIN IONS\nID=1\n100.0\t1.0\n".as_bytes());
        assert!(reader.next().is_none());
    }

    #[test]
    fn program_names() {
        assert_eq!("msdeconv".parse::<DeconvolutionProgram>(), Ok(DeconvolutionProgram::MsDeconv));
        assert_eq!("Hardklor".parse::<DeconvolutionProgram>(), Ok(DeconvolutionProgram::Hardklor));
        assert!("TopFD".parse::<DeconvolutionProgram>().is_err());
        assert_eq!(
            DeconvolutionProgram::Hardklor.reader("".as_bytes()).program(),
            DeconvolutionProgram::Hardklor
        );
        assert_eq!(DeconvolutionProgram::ThermoXtract.to_string(), "ThermoXtract");
    }
}
