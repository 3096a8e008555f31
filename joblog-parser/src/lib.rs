use lazy_static::lazy_static;
use regex::Regex;

/// placeholder message recorded for a line that does not match the header
/// grammar, typically the result of interleaved stdout writes from
/// concurrent producers
pub const SYNC_LOST_MESSAGE: &str = "Log file sync lost - probably due to MPI stdout handling.";

lazy_static! {
    // header grammar:  <timestamp> <host>_<pid>_<tid> <subsystem>
    //
    // applied to the part of the line before the first ": ". exactly three
    // space-separated tokens, the middle one exactly three _-joined
    // sub-tokens (possibly empty).
    static ref HEADER_RE: Regex = Regex::new(
        r"(?x)
          ^(?P<ts>\S+)\x20
          (?P<host>[^\s_]*)_(?P<pid>[^\s_]*)_(?P<tid>[^\s_]*)\x20
          (?P<subsystem>\S+)$"
    )
    .unwrap();
}

/// one structured log entry extracted from a raw line
#[derive(Debug, Clone, PartialEq)]
pub struct LineRecord {
    pub timestamp: f64,
    pub host: String,
    pub pid: String,
    pub tid: String,
    pub subsystem: String,
    pub message: String,
}

impl LineRecord {
    /// placeholder record for a line the grammar cannot account for;
    /// `anchor` is the last timestamp that was successfully parsed (0.0
    /// when none has been yet)
    pub fn sync_lost(anchor: f64) -> Self {
        Self {
            timestamp: anchor,
            host: "?".to_string(),
            pid: "?".to_string(),
            tid: "?".to_string(),
            subsystem: "?".to_string(),
            message: SYNC_LOST_MESSAGE.to_string(),
        }
    }
}

/// parse one raw log line (newline already stripped) into a [`LineRecord`].
///
/// never fails: a line that does not match the grammar, or whose timestamp
/// token is not a valid float, becomes a [`LineRecord::sync_lost`] record
/// carrying the `anchor` time.
pub fn parse_line(line: &str, anchor: f64) -> LineRecord {
    // the first ": " in the line terminates the header
    let Some((header, message)) = line.split_once(": ") else {
        return LineRecord::sync_lost(anchor);
    };

    let Some(caps) = HEADER_RE.captures(header) else {
        return LineRecord::sync_lost(anchor);
    };

    let Ok(timestamp) = caps["ts"].parse::<f64>() else {
        return LineRecord::sync_lost(anchor);
    };

    LineRecord {
        timestamp,
        host: caps["host"].to_string(),
        pid: caps["pid"].to_string(),
        tid: caps["tid"].to_string(),
        subsystem: caps["subsystem"].to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_line() {
        let rec = parse_line("0.000000 host1_100_1 net: hello", 0.0);
        assert_eq!(rec.timestamp, 0.0);
        assert_eq!(rec.host, "host1");
        assert_eq!(rec.pid, "100");
        assert_eq!(rec.tid, "1");
        assert_eq!(rec.subsystem, "net");
        assert_eq!(rec.message, "hello");
    }

    #[test]
    fn test_message_keeps_later_separators() {
        let rec = parse_line("1.5 h_1_2 io: key: value: done", 0.0);
        assert_eq!(rec.subsystem, "io");
        assert_eq!(rec.message, "key: value: done");
    }

    #[test]
    fn test_subsystem_with_colon() {
        // first ": " is the header terminator, a bare ":" inside the
        // subsystem token is not
        let rec = parse_line("2.0 h_1_2 net:x: msg", 0.0);
        assert_eq!(rec.subsystem, "net:x");
        assert_eq!(rec.message, "msg");
    }

    #[test]
    fn test_separator_inside_header_falls_back() {
        // the first ": " ends the header even when it lands mid-token,
        // leaving a two-token header
        let rec = parse_line("1.0 h_1_2: net: x", 0.0);
        assert_eq!(rec.host, "?");
        assert_eq!(rec.message, SYNC_LOST_MESSAGE);
    }

    #[test]
    fn test_missing_separator_falls_back() {
        let rec = parse_line("3.0 h_1_2 net hello without separator", 7.25);
        assert_eq!(rec, LineRecord::sync_lost(7.25));
        assert_eq!(rec.timestamp, 7.25);
        assert_eq!(rec.message, SYNC_LOST_MESSAGE);
    }

    #[test]
    fn test_bad_timestamp_falls_back() {
        let rec = parse_line("yesterday h_1_2 net: hello", 4.0);
        assert_eq!(rec.host, "?");
        assert_eq!(rec.timestamp, 4.0);
    }

    #[test]
    fn test_wrong_host_token_shape_falls_back() {
        // two underscores required, no more, no fewer
        assert_eq!(parse_line("1.0 host net: x", 0.0).host, "?");
        assert_eq!(parse_line("1.0 a_b_c_d net: x", 0.0).host, "?");
    }

    #[test]
    fn test_empty_sub_tokens_allowed() {
        let rec = parse_line("1.0 __7 net: x", 0.0);
        assert_eq!(rec.host, "");
        assert_eq!(rec.pid, "");
        assert_eq!(rec.tid, "7");
    }

    #[test]
    fn test_truncated_line_falls_back() {
        let rec = parse_line("4.2 h_1_", 9.0);
        assert_eq!(rec, LineRecord::sync_lost(9.0));
    }

    #[test]
    fn test_empty_line_falls_back_with_zero_anchor() {
        let rec = parse_line("", 0.0);
        assert_eq!(rec.timestamp, 0.0);
        assert_eq!(rec.subsystem, "?");
    }
}
