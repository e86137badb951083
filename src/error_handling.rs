use std::fmt::{Debug, Display};
use std::path::PathBuf;

pub trait ErrorType: Display + Debug + PartialEq {}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize
}

impl Location {
    pub fn new(file: PathBuf, line: usize) -> Self {
        Location { file, line }
    }

    // A location inside grammar text that did not come from a file
    pub fn inline(line: usize) -> Self {
        Location { file: PathBuf::from("<grammar>"), line }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file.display())
        } else {
            write!(f, "{}:{}", self.file.display(), self.line)
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Error<T: ErrorType> {
    pub location: Location,
    pub error: T
}

impl<T: ErrorType> Error<T> {
    pub fn at(location: Location, error: T) -> Self {
        Error { location, error }
    }
}

impl<T: ErrorType> Display for Error<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]  {}", self.location, self.error)
    }
}

impl<T: ErrorType> std::error::Error for Error<T> {}

pub type Errors<T> = Vec<Error<T>>;

// Renders a list of errors one per line, highlighted for a terminal
pub fn render_errors<T: ErrorType>(errors: &Errors<T>) -> String {
    errors
        .iter()
        .map(|e| format!("\x1b[31;49;1m[{}]\x1b[39;49;1m  {}\x1b[0m", e.location, e.error))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Oops;

    impl Display for Oops {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "oops")
        }
    }

    impl ErrorType for Oops {}

    #[test]
    fn location_display() {
        assert_eq!(Location::new(PathBuf::from("a.peg"), 0).to_string(), "a.peg");
        assert_eq!(Location::new(PathBuf::from("a.peg"), 12).to_string(), "a.peg:12");
        assert_eq!(Location::inline(3).to_string(), "<grammar>:3");
    }

    #[test]
    fn error_display() {
        let error = Error::at(Location::inline(2), Oops);
        assert_eq!(error.to_string(), "[<grammar>:2]  oops");
        assert!(render_errors(&vec![error]).contains("oops"));
    }
}
