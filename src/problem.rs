use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Category of a reported finding, used for configuration-driven filtering.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) enum ProblemType {
    CommonReimplementationArraysFill,
    UseFormatString,
    DoNotHaveConstantsClass,
    MissingOverrideAnnotation,
}

impl ProblemType {
    pub(crate) const ALL: [ProblemType; 4] = [
        ProblemType::CommonReimplementationArraysFill,
        ProblemType::UseFormatString,
        ProblemType::DoNotHaveConstantsClass,
        ProblemType::MissingOverrideAnnotation,
    ];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            ProblemType::CommonReimplementationArraysFill => "COMMON_REIMPLEMENTATION_ARRAYS_FILL",
            ProblemType::UseFormatString => "USE_FORMAT_STRING",
            ProblemType::DoNotHaveConstantsClass => "DO_NOT_HAVE_CONSTANTS_CLASS",
            ProblemType::MissingOverrideAnnotation => "MISSING_OVERRIDE_ANNOTATION",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProblemType::ALL
            .into_iter()
            .find(|problem_type| problem_type.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown problem type: {value}"))
    }
}

/// Message template id plus named parameters, rendered later by a translator.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Message {
    key: &'static str,
    params: BTreeMap<String, String>,
}

impl Message {
    pub(crate) fn new(key: &'static str) -> Self {
        Self {
            key,
            params: BTreeMap::new(),
        }
    }

    pub(crate) fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub(crate) fn key(&self) -> &'static str {
        self.key
    }

    pub(crate) fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    #[cfg(test)]
    pub(crate) fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// Source span of a finding. Lines are 1-based and inclusive.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub(crate) struct CodePosition {
    pub(crate) file: String,
    pub(crate) start_line: u32,
    pub(crate) end_line: u32,
}

impl CodePosition {
    /// `file:line` for single-line spans, `file:start-end` otherwise.
    pub(crate) fn display_location(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CodePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "{}:{}", self.file, self.start_line)
        } else {
            write!(f, "{}:{}-{}", self.file, self.start_line, self.end_line)
        }
    }
}

/// Immutable finding produced by a check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct Problem {
    check: &'static str,
    position: CodePosition,
    message: Message,
    problem_type: ProblemType,
}

impl Problem {
    pub(crate) fn new(
        check: &'static str,
        position: CodePosition,
        message: Message,
        problem_type: ProblemType,
    ) -> Self {
        Self {
            check,
            position,
            message,
            problem_type,
        }
    }

    pub(crate) fn check(&self) -> &'static str {
        self.check
    }

    pub(crate) fn position(&self) -> &CodePosition {
        &self.position
    }

    pub(crate) fn message(&self) -> &Message {
        &self.message
    }

    pub(crate) fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    pub(crate) fn display_location(&self) -> String {
        self.position.display_location()
    }
}
