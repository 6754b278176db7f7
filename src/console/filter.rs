//! Stateful line filter for console output.
//!
//! The interactive console prints a burst of initialization logging, then a
//! banner, then the prompt. Until the prompt is seen, only errors and
//! non-noise lines get through; once the command is running everything is
//! shown except profiling chatter. Error lines are always shown.

use regex::RegexSet;

/// Patterns that are always shown, in any phase.
const ERROR_PATTERNS: &[&str] = &[
    r"^ERROR",
    r"^Traceback",
    r"^  File ",
    r"^\w*Error:",
    r"^\w*Exception:",
];

/// Patterns marking the end of the startup banner.
const BANNER_END_PATTERNS: &[&str] = &[r"^Python \d+\.\d+\.\d+", r"^IPython.*--", r"^Tip:"];

/// Initialization noise: timestamped INFO/WARNING log lines and deprecation
/// chatter, suppressed unless verbose.
const INIT_NOISE_PATTERNS: &[&str] = &[
    r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3} \d+ INFO",
    r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2},\d{3} \d+ WARNING",
    r"^/.*\.py:\d+: UserWarning:",
    r"^\s*import pkg_resources",
    r"^\s*The pkg_resources package",
];

/// Prompt markers: once seen, the command is running and output is real.
const PROMPT_PATTERNS: &[&str] = &[r"^In \[\d+\]:", r"^>>>", r"^env:", r"^self:"];

/// Profiling noise, suppressed in every phase.
const PROFILING_PATTERNS: &[&str] = &[r"^profiling:.*Cannot open"];

/// Line-by-line output filter. Feed lines in order; `show` says whether the
/// line should be printed.
pub struct LineFilter {
    verbose: bool,
    in_banner: bool,
    command_started: bool,
    errors: RegexSet,
    banner_end: RegexSet,
    init_noise: RegexSet,
    prompt: RegexSet,
    profiling: RegexSet,
}

impl LineFilter {
    pub fn new(verbose: bool) -> Self {
        // The pattern literals are fixed, so compilation cannot fail.
        Self {
            verbose,
            in_banner: true,
            command_started: false,
            errors: RegexSet::new(ERROR_PATTERNS).expect("invalid error patterns"),
            banner_end: RegexSet::new(BANNER_END_PATTERNS).expect("invalid banner patterns"),
            init_noise: RegexSet::new(INIT_NOISE_PATTERNS).expect("invalid noise patterns"),
            prompt: RegexSet::new(PROMPT_PATTERNS).expect("invalid prompt patterns"),
            profiling: RegexSet::new(PROFILING_PATTERNS).expect("invalid profiling patterns"),
        }
    }

    /// Whether this line should be printed. Advances the phase state.
    pub fn show(&mut self, line: &str) -> bool {
        if self.verbose {
            return true;
        }

        if self.errors.is_match(line) {
            return true;
        }

        if self.in_banner {
            if self.banner_end.is_match(line) {
                self.in_banner = false;
                return true;
            }
            if self.init_noise.is_match(line) || self.profiling.is_match(line) {
                return false;
            }
            // Empty lines during initialization are noise too.
            return !line.trim().is_empty();
        }

        if !self.command_started {
            if self.prompt.is_match(line) {
                self.command_started = true;
                return true;
            }
            return !self.init_noise.is_match(line) && !self.profiling.is_match(line);
        }

        // After the prompt, everything is shown except profiling chatter.
        !self.profiling.is_match(line)
    }
}
