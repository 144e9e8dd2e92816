//! Batch question file.
//!
//! Line-oriented: a `Perguntas` header, one question per line, and an
//! optional `/end` line after which everything is ignored. Lines are not split
//! on commas; a line wrapped in double quotes is unquoted.

use crate::error::{RagError, Result};
use std::fmt;
use std::path::Path;

pub const HEADER: &str = "Perguntas";
pub const END_MARKER: &str = "/end";

/// Something off about a file that still yielded questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionWarning {
    CountMismatch { expected: usize, found: usize },
    MissingEndMarker,
}

impl fmt::Display for QuestionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CountMismatch { expected, found } => {
                write!(f, "expected {} questions, found {}", expected, found)
            }
            Self::MissingEndMarker => write!(f, "no {} marker at the end of the file", END_MARKER),
        }
    }
}

/// Questions in file order, plus anything worth telling the operator.
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    pub questions: Vec<String>,
    pub warnings: Vec<QuestionWarning>,
}

/// Read and parse a question file.
pub fn load_questions(path: &Path, expected: usize) -> Result<QuestionSet> {
    if !path.is_file() {
        return Err(RagError::QuestionFileMissing(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
    let set = parse_questions(&content, expected).map_err(|reason| {
        RagError::MalformedQuestionFile {
            path: path.to_path_buf(),
            reason,
        }
    })?;

    for warning in &set.warnings {
        tracing::warn!("{}: {}", path.display(), warning);
    }
    tracing::info!("Loaded {} questions from {}", set.questions.len(), path.display());

    Ok(set)
}

/// Parse question file content; the error is the reason it is malformed.
pub fn parse_questions(content: &str, expected: usize) -> std::result::Result<QuestionSet, String> {
    let mut lines = content.lines();

    let header = lines
        .next()
        .map(|l| l.trim_start_matches('\u{feff}').trim())
        .unwrap_or_default();
    if header != HEADER {
        return Err(format!("expected header '{}', found '{}'", HEADER, header));
    }

    let mut questions = Vec::new();
    let mut ended = false;

    for line in lines {
        let line = line.trim();
        if line == END_MARKER {
            ended = true;
            break;
        }
        if !line.is_empty() {
            questions.push(unquote(line));
        }
    }

    if questions.is_empty() {
        return Err("no questions found".to_string());
    }

    let mut warnings = Vec::new();
    if questions.len() != expected {
        warnings.push(QuestionWarning::CountMismatch {
            expected,
            found: questions.len(),
        });
    }
    if !ended {
        warnings.push(QuestionWarning::MissingEndMarker);
    }

    Ok(QuestionSet {
        questions,
        warnings,
    })
}

/// `"a ""b"" c"` becomes `a "b" c`; anything else is returned as-is.
fn unquote(line: &str) -> String {
    match line
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_three_questions_with_end() {
        let content = "Perguntas\nO que é MLO?\n\nO que é EHT?\nO que é OFDMA?\n/end\nignorada\n";
        let set = parse_questions(content, 100).unwrap();

        assert_eq!(set.questions, ["O que é MLO?", "O que é EHT?", "O que é OFDMA?"]);
        assert_eq!(
            set.warnings,
            vec![QuestionWarning::CountMismatch {
                expected: 100,
                found: 3
            }]
        );
    }

    #[test]
    fn test_missing_end_marker_warns() {
        let set = parse_questions("Perguntas\nUma?\n", 1).unwrap();
        assert_eq!(set.warnings, vec![QuestionWarning::MissingEndMarker]);
    }

    #[test]
    fn test_bom_and_quotes() {
        let content = concat!(
            "\u{feff}Perguntas\r\n",
            "\"Qual a diferença entre Wi-Fi 6, 6E e 7?\"\r\n",
            "\"O termo \"\"EHT\"\" significa?\"\r\n",
            "/end\r\n",
        );
        let set = parse_questions(content, 2).unwrap();

        assert_eq!(
            set.questions,
            [
                "Qual a diferença entre Wi-Fi 6, 6E e 7?",
                "O termo \"EHT\" significa?"
            ]
        );
        assert!(set.warnings.is_empty());
    }

    #[test]
    fn test_bad_header() {
        let err = parse_questions("Questions\nO que é MLO?\n", 100).unwrap_err();
        assert!(err.contains("Perguntas"));
    }

    #[test]
    fn test_zero_questions_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("perguntas.csv");
        std::fs::write(&path, "Perguntas\n/end\n").unwrap();

        assert!(matches!(
            load_questions(&path, 100),
            Err(RagError::MalformedQuestionFile { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_questions(Path::new("/nonexistent/perguntas.csv"), 100),
            Err(RagError::QuestionFileMissing(_))
        ));
    }
}
