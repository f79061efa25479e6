use std::sync::LazyLock;

use regex::Regex;

static BRACKETED_STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[([A-Za-z0-9_.:-]+)\]\s*(.*)$").expect("valid step pattern")
});
static NODE_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)node=(\S+)").expect("valid node pattern"));
static STATUS_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)status=(\S+)").expect("valid status pattern"));

/// A line of model-build output, classified once so call sites can match on
/// the variant instead of re-running patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine<'a> {
    /// `[TAG] rest of the line`
    BracketedStep { tag: &'a str, rest: &'a str },
    /// A line carrying both `node=<id>` and `status=<state>` fields.
    TraceEvent { node: &'a str, status: &'a str },
    Plain(&'a str),
}

impl<'a> LogLine<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);

        if let Some(caps) = BRACKETED_STEP.captures(line)
            && let (Some(tag), Some(rest)) = (caps.get(1), caps.get(2))
        {
            return LogLine::BracketedStep {
                tag: tag.as_str(),
                rest: rest.as_str(),
            };
        }

        let node = NODE_FIELD.captures(line).and_then(|c| c.get(1));
        let status = STATUS_FIELD.captures(line).and_then(|c| c.get(1));
        if let (Some(node), Some(status)) = (node, status) {
            return LogLine::TraceEvent {
                node: node.as_str(),
                status: status.as_str(),
            };
        }

        LogLine::Plain(line)
    }

    pub fn step_tag(&self) -> Option<&'a str> {
        match self {
            LogLine::BracketedStep { tag, .. } => Some(tag),
            _ => None,
        }
    }
}
