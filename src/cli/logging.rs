//! Progress output for the CLI

/// Output verbosity for CLI diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Suppress all progress output
    Quiet,
    /// Normal progress lines
    Normal,
    /// Additional per-column detail
    Verbose,
}

impl LogLevel {
    /// Resolve the level from CLI flags; quiet wins over verbose
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            LogLevel::Quiet
        } else if verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }

    /// Whether a message at `required` level should be shown
    #[must_use]
    pub fn allows(self, required: LogLevel) -> bool {
        self >= required && self != LogLevel::Quiet
    }
}

/// Print a progress line if the current level permits it
pub fn say(level: LogLevel, required: LogLevel, msg: &str) {
    if level.allows(required) {
        println!("{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Normal);
        assert_eq!(LogLevel::from_flags(false, true), LogLevel::Verbose);
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Quiet);
    }

    #[test]
    fn test_allows() {
        assert!(LogLevel::Normal.allows(LogLevel::Normal));
        assert!(!LogLevel::Normal.allows(LogLevel::Verbose));
        assert!(LogLevel::Verbose.allows(LogLevel::Normal));
        assert!(!LogLevel::Quiet.allows(LogLevel::Normal));
        assert!(!LogLevel::Quiet.allows(LogLevel::Quiet));
    }
}
