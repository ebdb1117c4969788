#![forbid(unsafe_code)]

pub mod model;

pub mod names {
    const MAX_NAME_LEN: usize = 255;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum NameError {
        Empty,
        TooLong,
        Reserved,
        ContainsSeparator,
        ContainsControl,
        SurroundingWhitespace,
    }

    impl NameError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "name must not be empty",
                Self::TooLong => "name is too long",
                Self::Reserved => "'.' and '..' are reserved names",
                Self::ContainsSeparator => "name must not contain '/' or '\\'",
                Self::ContainsControl => "name contains control characters",
                Self::SurroundingWhitespace => "name must not start or end with whitespace",
            }
        }
    }

    /// A single directory segment. The project root is the only location with an
    /// empty segment and is never created through this check.
    pub fn validate_segment(value: &str) -> Result<(), NameError> {
        validate_name(value)
    }

    pub fn validate_file_name(value: &str) -> Result<(), NameError> {
        validate_name(value)
    }

    fn validate_name(value: &str) -> Result<(), NameError> {
        if value.is_empty() {
            return Err(NameError::Empty);
        }
        if value.len() > MAX_NAME_LEN {
            return Err(NameError::TooLong);
        }
        if value == "." || value == ".." {
            return Err(NameError::Reserved);
        }
        if value.contains(['/', '\\']) {
            return Err(NameError::ContainsSeparator);
        }
        if value.chars().any(|c| c.is_control()) {
            return Err(NameError::ContainsControl);
        }
        if value.trim() != value {
            return Err(NameError::SurroundingWhitespace);
        }
        Ok(())
    }

    /// Splits a project-relative directory path into segments. `""` and `"/"` are the root.
    pub fn split_appended_path(path: &str) -> Result<Vec<&str>, NameError> {
        let mut segments = Vec::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            validate_segment(segment)?;
            segments.push(segment);
        }
        Ok(segments)
    }

    pub fn join_appended_path(parent: &str, segment: &str) -> String {
        let parent = parent.trim_end_matches('/');
        if parent.is_empty() {
            segment.to_string()
        } else {
            format!("{parent}/{segment}")
        }
    }
}
