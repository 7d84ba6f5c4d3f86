//! XML coverage decoders: Cobertura (pytest-cov, coverage.py, gcovr) and
//! JaCoCo.
//!
//! Cobertura keys lines by `<class filename="...">`; a line is covered when
//! `hits` is positive. JaCoCo nests `<sourcefile name="...">` inside
//! `<package name="...">`; a line is covered when `ci` (covered
//! instructions) is positive. Report keys are the paths as written, so the
//! usual suffix matching applies when looking up the target.

use std::fmt::Display;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::domain::errors::CoverageError;
use crate::domain::models::CoverageReport;
use crate::domain::ports::{CoverageArtifact, CoverageDecoder};

#[derive(Debug, Clone, Copy, Default)]
pub struct CoberturaDecoder;

#[derive(Debug, Clone, Copy, Default)]
pub struct JacocoDecoder;

impl CoberturaDecoder {
    pub fn parse(text: &str) -> Result<CoverageReport, CoverageError> {
        let mut reader = Reader::from_str(text);
        let mut report = CoverageReport::new();
        let mut current: Option<String> = None;

        loop {
            let event = reader.read_event().map_err(xml_error)?;
            match &event {
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"class" => {
                        let file = required(e, b"filename")?;
                        report.files.entry(file.clone()).or_default();
                        if matches!(event, Event::Start(_)) {
                            current = Some(file);
                        }
                    }
                    b"line" => {
                        if let Some(file) = &current {
                            let number = parse_number(&required(e, b"number")?, "number")?;
                            let hits = parse_number(&required(e, b"hits")?, "hits")?;
                            record(&mut report, file, number, hits > 0);
                        }
                    }
                    _ => {}
                },
                Event::End(e) if e.name().as_ref() == b"class" => current = None,
                Event::Eof => break,
                _ => {}
            }
        }

        finish(report, "class")
    }
}

impl JacocoDecoder {
    pub fn parse(text: &str) -> Result<CoverageReport, CoverageError> {
        let mut reader = Reader::from_str(text);
        let mut report = CoverageReport::new();
        let mut package = String::new();
        let mut current: Option<String> = None;

        loop {
            let event = reader.read_event().map_err(xml_error)?;
            match &event {
                Event::Start(e) if e.name().as_ref() == b"package" => {
                    package = required(e, b"name")?;
                }
                Event::Start(e) | Event::Empty(e) => match e.name().as_ref() {
                    b"sourcefile" => {
                        let name = required(e, b"name")?;
                        let file = if package.is_empty() {
                            name
                        } else {
                            format!("{package}/{name}")
                        };
                        report.files.entry(file.clone()).or_default();
                        if matches!(event, Event::Start(_)) {
                            current = Some(file);
                        }
                    }
                    b"line" => {
                        if let Some(file) = &current {
                            let number = parse_number(&required(e, b"nr")?, "nr")?;
                            let covered = parse_number(&required(e, b"ci")?, "ci")?;
                            record(&mut report, file, number, covered > 0);
                        }
                    }
                    _ => {}
                },
                Event::End(e) => match e.name().as_ref() {
                    b"sourcefile" => current = None,
                    b"package" => package.clear(),
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        finish(report, "sourcefile")
    }
}

fn record(report: &mut CoverageReport, file: &str, line: u32, covered: bool) {
    let entry = report.files.entry(file.to_string()).or_default();
    entry.coverable.insert(line);
    if covered {
        entry.covered.insert(line);
    }
}

fn finish(report: CoverageReport, element: &str) -> Result<CoverageReport, CoverageError> {
    if report.files.is_empty() {
        return Err(CoverageError::Decode(format!(
            "no <{element}> elements in coverage XML"
        )));
    }
    report.validate()?;
    Ok(report)
}

fn required(element: &BytesStart<'_>, name: &[u8]) -> Result<String, CoverageError> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == name {
            return Ok(attr.unescape_value().map_err(xml_error)?.into_owned());
        }
    }
    Err(CoverageError::Decode(format!(
        "<{}> is missing attribute '{}'",
        String::from_utf8_lossy(element.name().as_ref()),
        String::from_utf8_lossy(name)
    )))
}

fn parse_number(value: &str, what: &str) -> Result<u32, CoverageError> {
    value
        .trim()
        .parse()
        .map_err(|_| CoverageError::Decode(format!("invalid {what} '{value}'")))
}

fn xml_error(e: impl Display) -> CoverageError {
    CoverageError::Decode(format!("invalid coverage XML: {e}"))
}

fn utf8(artifact: &CoverageArtifact) -> Result<&str, CoverageError> {
    std::str::from_utf8(&artifact.bytes).map_err(|e| {
        CoverageError::Decode(format!("{} is not UTF-8: {e}", artifact.path.display()))
    })
}

impl CoverageDecoder for CoberturaDecoder {
    fn name(&self) -> &str {
        "cobertura"
    }

    fn decode(&self, artifact: &CoverageArtifact) -> Result<CoverageReport, CoverageError> {
        Self::parse(utf8(artifact)?)
    }
}

impl CoverageDecoder for JacocoDecoder {
    fn name(&self) -> &str {
        "jacoco"
    }

    fn decode(&self, artifact: &CoverageArtifact) -> Result<CoverageReport, CoverageError> {
        Self::parse(utf8(artifact)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    const COBERTURA: &str = r#"<?xml version="1.0" ?>
<coverage version="7.4.0" line-rate="0.6" branch-rate="0">
  <sources><source>/work</source></sources>
  <packages>
    <package name="src" line-rate="0.6">
      <classes>
        <class name="calc.py" filename="src/calc.py" line-rate="0.6">
          <methods/>
          <lines>
            <line number="1" hits="1"/>
            <line number="2" hits="3"/>
            <line number="4" hits="0"/>
            <line number="5" hits="1" branch="true" condition-coverage="50% (1/2)"/>
            <line number="7" hits="0"/>
          </lines>
        </class>
        <class name="__init__.py" filename="src/__init__.py" line-rate="1">
          <methods/>
          <lines/>
        </class>
      </classes>
    </package>
  </packages>
</coverage>"#;

    const JACOCO: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<!DOCTYPE report PUBLIC "-//JACOCO//DTD Report 1.1//EN" "report.dtd">
<report name="calc">
  <package name="com/example">
    <class name="com/example/Calc" sourcefilename="Calc.java">
      <method name="add" desc="(II)I" line="3"/>
    </class>
    <sourcefile name="Calc.java">
      <line nr="3" mi="0" ci="4" mb="0" cb="0"/>
      <line nr="5" mi="2" ci="0" mb="0" cb="0"/>
      <line nr="6" mi="1" ci="3" mb="1" cb="1"/>
      <counter type="LINE" missed="1" covered="2"/>
    </sourcefile>
  </package>
</report>"#;

    #[test]
    fn cobertura_lines_by_class_filename() {
        let report = CoberturaDecoder::parse(COBERTURA).unwrap();

        let calc = report.file("src/calc.py").unwrap();
        assert_eq!(calc.covered, BTreeSet::from([1, 2, 5]));
        assert_eq!(calc.coverable, BTreeSet::from([1, 2, 4, 5, 7]));
        assert!(report.file("src/__init__.py").unwrap().coverable.is_empty());
    }

    #[test]
    fn cobertura_target_resolves_by_suffix() {
        let report = CoberturaDecoder::parse(COBERTURA).unwrap();
        assert!((report.percent_covered("calc.py").unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn cobertura_errors() {
        assert!(CoberturaDecoder::parse("<coverage><packages/></coverage>").is_err());
        let bad_number = concat!(
            r#"<coverage><class filename="a.py"><lines>"#,
            r#"<line number="x" hits="1"/>"#,
            r#"</lines></class></coverage>"#,
        );
        assert!(CoberturaDecoder::parse(bad_number).is_err());
        let unnamed = r#"<coverage><class name="a"></class></coverage>"#;
        assert!(CoberturaDecoder::parse(unnamed).is_err());
        let mismatched = r#"<coverage><class filename="a.py"></lines></coverage>"#;
        assert!(CoberturaDecoder::parse(mismatched).is_err());
    }

    #[test]
    fn jacoco_lines_by_package_and_sourcefile() {
        let report = JacocoDecoder::parse(JACOCO).unwrap();

        let calc = report.file("com/example/Calc.java").unwrap();
        assert_eq!(calc.covered, BTreeSet::from([3, 6]));
        assert_eq!(calc.coverable, BTreeSet::from([3, 5, 6]));
        // Maven layouts configure the target relative to the project root.
        assert_eq!(
            report.resolve_key("src/main/java/com/example/Calc.java"),
            Some("com/example/Calc.java")
        );
    }

    #[test]
    fn jacoco_without_sourcefiles_is_rejected() {
        assert!(JacocoDecoder::parse("<report name=\"empty\"></report>").is_err());
    }

    #[test]
    fn decodes_artifact_bytes() {
        let artifact = CoverageArtifact {
            path: PathBuf::from("coverage.xml"),
            bytes: COBERTURA.as_bytes().to_vec(),
        };
        let report = CoberturaDecoder.decode(&artifact).unwrap();
        assert_eq!(report.files.len(), 2);

        let binary = CoverageArtifact {
            path: PathBuf::from("coverage.xml"),
            bytes: vec![0xff, 0xfe],
        };
        assert!(CoberturaDecoder.decode(&binary).is_err());
    }
}
