use super::super::domain::{HealthColor, HealthRule};

/// Pick the winning color from rules that matched, given in profile order.
///
/// Returns the color and the position of the winning rule within `matched`. The most
/// severe color wins. Among rules sharing that color the one listed first in the
/// profile wins, so reordering rules never changes the color, only which rule is
/// reported.
pub fn resolve_priority<'a, I>(matched: I) -> (HealthColor, Option<usize>)
where
    I: IntoIterator<Item = &'a HealthRule>,
{
    let mut winner: Option<(usize, HealthColor)> = None;

    for (index, rule) in matched.into_iter().enumerate() {
        match winner {
            Some((_, current)) if rule.color.severity() <= current.severity() => {}
            _ => winner = Some((index, rule.color)),
        }
    }

    match winner {
        Some((index, color)) => (color, Some(index)),
        None => (HealthColor::Green, None),
    }
}
