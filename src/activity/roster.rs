use std::collections::BTreeSet;

/// Characters Discord names pick up for decoration that don't render
const INVISIBLE: [char; 7] = [
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // byte order mark
    '\u{00AD}', // soft hyphen
    '\u{180E}', // mongolian vowel separator
];

/// Names present on only one side of the comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    /// In the Discord guild, missing from the WOM group
    pub only_in_guild: Vec<String>,
    /// In the WOM group, missing from the Discord guild
    pub only_in_group: Vec<String>,
}

impl RosterDiff {
    pub fn is_empty(&self) -> bool {
        self.only_in_guild.is_empty() && self.only_in_group.is_empty()
    }
}

/// Lower-case, drop invisible characters, trim
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !INVISIBLE.contains(c))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

fn normalized_set<'a>(
    names: impl IntoIterator<Item = &'a str>,
    ignored: &BTreeSet<String>,
) -> BTreeSet<String> {
    names
        .into_iter()
        .map(normalize_name)
        .filter(|n| !n.is_empty() && !ignored.contains(n))
        .collect()
}

/// Compare guild display names against WOM group names
pub fn compute_roster_diff<'a>(
    guild_names: impl IntoIterator<Item = &'a str>,
    group_names: impl IntoIterator<Item = &'a str>,
    ignored: impl IntoIterator<Item = &'a str>,
) -> RosterDiff {
    let ignored: BTreeSet<String> = ignored.into_iter().map(normalize_name).collect();
    let guild = normalized_set(guild_names, &ignored);
    let group = normalized_set(group_names, &ignored);

    RosterDiff {
        only_in_guild: guild.difference(&group).cloned().collect(),
        only_in_group: group.difference(&guild).cloned().collect(),
    }
}
