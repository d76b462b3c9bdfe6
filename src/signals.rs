/// Signal-number-to-name lookup.
///
/// Numbering follows Linux on x86-64 (SIGSTKFLT 16, SIGPWR 30). The table
/// is fixed for the life of the process; nothing mutates it.
const SIGNAL_NAMES: [&str; 32] = [
    "UNKNOWN",   // 0
    "SIGHUP",    // 1
    "SIGINT",    // 2
    "SIGQUIT",   // 3
    "SIGILL",    // 4
    "SIGTRAP",   // 5
    "SIGABRT",   // 6
    "SIGBUS",    // 7
    "SIGFPE",    // 8
    "SIGKILL",   // 9
    "SIGUSR1",   // 10
    "SIGSEGV",   // 11
    "SIGUSR2",   // 12
    "SIGPIPE",   // 13
    "SIGALRM",   // 14
    "SIGTERM",   // 15
    "SIGSTKFLT", // 16
    "SIGCHLD",   // 17
    "SIGCONT",   // 18
    "SIGSTOP",   // 19
    "SIGTSTP",   // 20
    "SIGTTIN",   // 21
    "SIGTTOU",   // 22
    "SIGURG",    // 23
    "SIGXCPU",   // 24
    "SIGXFSZ",   // 25
    "SIGVTALRM", // 26
    "SIGPROF",   // 27
    "SIGWINCH",  // 28
    "SIGIO",     // 29
    "SIGPWR",    // 30
    "SIGSYS",    // 31
];

/// Canonical name for a signal number.
///
/// `-1` means "no signal" and maps to the empty string; `0` and anything
/// outside `[1, 31]` map to `"UNKNOWN"`.
pub fn signal_name(signal: i32) -> &'static str {
    if signal == -1 {
        return "";
    }
    match usize::try_from(signal) {
        Ok(n) if n < SIGNAL_NAMES.len() => SIGNAL_NAMES[n],
        _ => SIGNAL_NAMES[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_signal_is_empty() {
        assert_eq!(signal_name(-1), "");
    }

    #[test]
    fn test_zero_is_unknown() {
        assert_eq!(signal_name(0), "UNKNOWN");
    }

    #[test]
    fn test_known_signals() {
        assert_eq!(signal_name(2), "SIGINT");
        assert_eq!(signal_name(9), "SIGKILL");
        assert_eq!(signal_name(11), "SIGSEGV");
        assert_eq!(signal_name(25), "SIGXFSZ");
        assert_eq!(signal_name(31), "SIGSYS");
    }

    #[test]
    fn test_out_of_range_is_unknown() {
        assert_eq!(signal_name(32), "UNKNOWN");
        assert_eq!(signal_name(999), "UNKNOWN");
        assert_eq!(signal_name(-2), "UNKNOWN");
    }
}
