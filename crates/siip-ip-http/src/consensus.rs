//! Answer extraction and plurality voting

use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::OnceLock;

static DOTTED_QUAD_REGEX: OnceLock<Regex> = OnceLock::new();

fn dotted_quad_regex() -> &'static Regex {
    DOTTED_QUAD_REGEX.get_or_init(|| {
        Regex::new(r"(?:\d{1,3}\.){3}\d{1,3}").expect("dotted quad regex is valid")
    })
}

/// First dotted-quad in `body`, if it is a valid IPv4 address
///
/// Only the first match is considered. A match with an octet above 255
/// makes the body unusable.
pub fn extract_ipv4(body: &str) -> Option<Ipv4Addr> {
    dotted_quad_regex().find(body)?.as_str().parse().ok()
}

/// Most frequent address among `answers`
///
/// Ties go to the address that was seen first.
pub fn plurality<I>(answers: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = Ipv4Addr>,
{
    // (address, votes) in first-seen order
    let mut tally: Vec<(Ipv4Addr, usize)> = Vec::new();
    for ip in answers {
        match tally.iter_mut().find(|(seen, _)| *seen == ip) {
            Some((_, votes)) => *votes += 1,
            None => tally.push((ip, 1)),
        }
    }

    let mut winner: Option<(Ipv4Addr, usize)> = None;
    for (ip, votes) in tally {
        if winner.is_none_or(|(_, best)| votes > best) {
            winner = Some((ip, votes));
        }
    }
    winner.map(|(ip, _)| ip)
}
