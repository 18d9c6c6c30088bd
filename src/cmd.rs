//! CLI command implementations: reading input files, invoking the
//! [`crate::api`] façade, and rendering results per `--format`/`--debug`.
//! Kept separate from `main.rs`, which owns only argument parsing and
//! dispatch.

use std::fmt;
use std::fs;
use std::path::Path;

use clap::ValueEnum;
use colored::Colorize;
use log::debug;

use xform_typecheck::api;
use xform_typecheck::errors::{InputSource, PipelineError};
use xform_typecheck::helpers;
use xform_typecheck::reports;

/// Process-exit codes: 0 valid, 1 invalid, 2
/// linter rejection, 3 input malformation (or any other halting defect).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Valid = 0,
    Invalid = 1,
    SubsetViolation = 2,
    InputMalformation = 3,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Which {
    Source,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Full,
    Lint,
    Mtt,
    Validate,
}

#[derive(Debug)]
pub enum CmdError {
    Io(std::path::PathBuf, std::io::Error),
    Pipeline(PipelineError),
    Json(serde_json::Error),
}

impl fmt::Display for CmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmdError::Io(path, e) => write!(f, "could not read {}: {}", path.display(), e),
            CmdError::Pipeline(e) => write!(f, "{}", e),
            CmdError::Json(e) => write!(f, "could not render JSON: {}", e),
        }
    }
}

impl std::error::Error for CmdError {}

impl From<PipelineError> for CmdError {
    fn from(e: PipelineError) -> Self {
        CmdError::Pipeline(e)
    }
}

impl From<serde_json::Error> for CmdError {
    fn from(e: serde_json::Error) -> Self {
        CmdError::Json(e)
    }
}

fn read(path: &Path) -> Result<String, CmdError> {
    fs::read_to_string(path).map_err(|e| CmdError::Io(path.to_path_buf(), e))
}

/// `analyze`: the full five-component pipeline, or (with `--mode`) one of
/// the four diagnostic-only endpoints, rendered per `--format`/`--debug`.
pub fn analyze(
    source_schema: &Path,
    target_schema: &Path,
    stylesheet: &Path,
    mode: Mode,
    format: Format,
    debug_mode: bool,
) -> Result<ExitCode, CmdError> {
    let source_text = read(source_schema)?;
    let target_text = read(target_schema)?;
    let stylesheet_text = read(stylesheet)?;

    match mode {
        Mode::Full => {
            let result = api::run_analysis(&source_text, &target_text, &stylesheet_text);
            debug!("analyze: mode=full valid={}", result.valid);
            let code = if result.error.is_some() {
                match &result.subset_check {
                    Some(sc) if !sc.valid => ExitCode::SubsetViolation,
                    _ => ExitCode::InputMalformation,
                }
            } else if result.valid {
                ExitCode::Valid
            } else {
                ExitCode::Invalid
            };
            print_analysis(&result, &stylesheet_text, format, debug_mode)?;
            Ok(code)
        }
        Mode::Lint => {
            let result = api::lint_stylesheet(&stylesheet_text)?;
            print_value(&result, debug_mode, format)?;
            Ok(if result.valid {
                ExitCode::Valid
            } else {
                ExitCode::SubsetViolation
            })
        }
        Mode::Mtt => {
            let mtt = api::stylesheet_to_mtt(&stylesheet_text)?;
            print_value(&mtt, debug_mode, format)?;
            Ok(ExitCode::Valid)
        }
        Mode::Validate => {
            let (validation, preimage) =
                api::validate_and_check(&source_text, &target_text, &stylesheet_text)?;
            let valid = validation.valid && preimage.validity.valid;
            print_value(&(&validation, &preimage), debug_mode, format)?;
            Ok(if valid { ExitCode::Valid } else { ExitCode::Invalid })
        }
    }
}

fn print_analysis(
    result: &api::AnalysisResult,
    stylesheet_text: &str,
    format: Format,
    debug_mode: bool,
) -> Result<(), CmdError> {
    if debug_mode {
        println!("{:#?}", result);
        return Ok(());
    }
    if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    if let Some(error) = &result.error {
        println!("{}", format!("analysis halted: {}", error).red());
        return Ok(());
    }

    let summary = if result.valid {
        "stylesheet is type-preserving and valid".green()
    } else {
        "stylesheet is NOT type-preserving or valid".red()
    };
    println!("{}", summary);

    if let Some(validation) = &result.type_validation {
        println!(
            "{}",
            reports::render_trace(&validation.proof_steps, "stylesheet", stylesheet_text)
        );
        println!("{}", reports::coverage_table::render(&validation.coverage));
    }
    if let Some(preimage) = &result.preimage {
        println!("{}", preimage.validity.explanation);
        for counterexample in &preimage.validity.counterexamples {
            println!(
                "{}",
                format!(
                    "  uncovered: {} ({})",
                    counterexample.element, counterexample.reason
                )
                .yellow()
            );
        }
    }
    Ok(())
}

fn print_value<T: serde::Serialize + std::fmt::Debug>(
    value: &T,
    debug_mode: bool,
    format: Format,
) -> Result<(), CmdError> {
    if debug_mode {
        println!("{:#?}", value);
    } else if format == Format::Json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{:#?}", value);
    }
    Ok(())
}

/// `dump-grammar`: translate one schema and render it as a `ptree`.
pub fn dump_grammar(schema: &Path, which: Which) -> Result<ExitCode, CmdError> {
    let text = read(schema)?;
    let source = match which {
        Which::Source => InputSource::SourceSchema,
        Which::Target => InputSource::TargetSchema,
    };
    let output = api::schema_to_grammar(&text, source)?;
    for warning in &output.warnings {
        println!("{}", format!("warning: {:?}", warning).yellow());
    }
    println!("{}", helpers::dump_grammar(&output.grammar));
    Ok(ExitCode::Valid)
}

/// `dump-mtt`: translate the stylesheet and render its rules as a
/// `ptree`.
pub fn dump_mtt(stylesheet: &Path) -> Result<ExitCode, CmdError> {
    let text = read(stylesheet)?;
    let mtt = api::stylesheet_to_mtt(&text)?;
    println!("{}", helpers::dump_mtt(&mtt));
    Ok(ExitCode::Valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_fixture(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp fixture");
        write!(file, "{}", contents).expect("write temp fixture");
        file
    }

    const PERSON_SCHEMA: &str = r#"<schema>
        <element name="Person">
            <complexType>
                <sequence>
                    <element name="Name" type="xs:string"/>
                    <element name="Age" type="xs:integer"/>
                </sequence>
            </complexType>
        </element>
    </schema>"#;

    const INDIVIDUAL_SCHEMA: &str = r#"<schema>
        <element name="Individual">
            <complexType>
                <attribute name="fullname" type="xs:string"/>
                <attribute name="years" type="xs:integer"/>
            </complexType>
        </element>
    </schema>"#;

    const GUARDED_STYLESHEET: &str = r#"<stylesheet>
        <template match="Person">
            <if test="Age &gt;= 0">
                <Individual fullname="{Name}" years="{Age}"/>
            </if>
        </template>
    </stylesheet>"#;

    #[test]
    fn analyze_full_mode_exits_valid_for_a_well_typed_stylesheet() {
        let source = write_fixture(PERSON_SCHEMA);
        let target = write_fixture(INDIVIDUAL_SCHEMA);
        let stylesheet = write_fixture(GUARDED_STYLESHEET);

        let code = analyze(
            source.path(),
            target.path(),
            stylesheet.path(),
            Mode::Full,
            Format::Json,
            false,
        )
        .unwrap();
        assert_eq!(code, ExitCode::Valid);
    }

    #[test]
    fn analyze_full_mode_exits_subset_violation_for_a_disallowed_construct() {
        let source = write_fixture(PERSON_SCHEMA);
        let target = write_fixture(INDIVIDUAL_SCHEMA);
        let stylesheet = write_fixture(
            r#"<stylesheet><template match="Person"><variable name="x"/></template></stylesheet>"#,
        );

        let code = analyze(
            source.path(),
            target.path(),
            stylesheet.path(),
            Mode::Full,
            Format::Json,
            false,
        )
        .unwrap();
        assert_eq!(code, ExitCode::SubsetViolation);
    }

    #[test]
    fn analyze_full_mode_exits_input_malformation_for_unparseable_xml() {
        let source = write_fixture("<schema><unterminated");
        let target = write_fixture(INDIVIDUAL_SCHEMA);
        let stylesheet = write_fixture(GUARDED_STYLESHEET);

        let code = analyze(
            source.path(),
            target.path(),
            stylesheet.path(),
            Mode::Full,
            Format::Json,
            false,
        )
        .unwrap();
        assert_eq!(code, ExitCode::InputMalformation);
    }

    #[test]
    fn dump_grammar_renders_the_element_tree() {
        let schema = write_fixture(PERSON_SCHEMA);
        let code = dump_grammar(schema.path(), Which::Source).unwrap();
        assert_eq!(code, ExitCode::Valid);
    }

    #[test]
    fn dump_mtt_renders_the_rule_tree() {
        let stylesheet = write_fixture(GUARDED_STYLESHEET);
        let code = dump_mtt(stylesheet.path()).unwrap();
        assert_eq!(code, ExitCode::Valid);
    }

    #[test]
    fn lint_mode_reports_a_subset_violation_without_building_a_grammar() {
        let source = write_fixture(PERSON_SCHEMA);
        let target = write_fixture(INDIVIDUAL_SCHEMA);
        let stylesheet = write_fixture(
            r#"<stylesheet><template match="Person"><variable name="x"/></template></stylesheet>"#,
        );

        let code = analyze(
            source.path(),
            target.path(),
            stylesheet.path(),
            Mode::Lint,
            Format::Human,
            false,
        )
        .unwrap();
        assert_eq!(code, ExitCode::SubsetViolation);
    }
}
